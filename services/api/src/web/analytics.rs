//! services/api/src/web/analytics.rs
//!
//! Dashboard analytics: completion statistics per trainee, per module and
//! overall, computed by the core progress aggregator.

use axum::{
    extract::{Query, State},
    Extension, Json,
};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use training_hub_core::domain::{Assignment, Module, Role};
use training_hub_core::progress::{
    progress_by_module, progress_by_trainee, progress_overview, ProgressOverview, ProgressStats,
};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

use crate::error::ApiError;
use crate::web::state::{AppState, CurrentUser};

//=========================================================================================
// Request/Response Types
//=========================================================================================

#[derive(Debug, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct AnalyticsQuery {
    /// Restricts the statistics to one instructor's assignments. Admins only;
    /// instructors are always scoped to themselves.
    pub instructor_id: Option<Uuid>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
pub struct ProgressStatsResponse {
    pub total: usize,
    pub completed: usize,
    pub percentage: u8,
}

impl From<ProgressStats> for ProgressStatsResponse {
    fn from(stats: ProgressStats) -> Self {
        Self {
            total: stats.total,
            completed: stats.completed,
            percentage: stats.percentage,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct StatusDistributionResponse {
    pub completed: usize,
    pub not_started: usize,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct OverviewResponse {
    pub overall: ProgressStatsResponse,
    pub distribution: StatusDistributionResponse,
    pub total_trainees: usize,
    pub active_trainees: usize,
    pub total_modules: usize,
    pub average_trainee_percentage: u8,
    pub average_score: Option<f64>,
}

impl From<ProgressOverview> for OverviewResponse {
    fn from(overview: ProgressOverview) -> Self {
        Self {
            overall: overview.overall.into(),
            distribution: StatusDistributionResponse {
                completed: overview.distribution.completed,
                not_started: overview.distribution.not_started,
            },
            total_trainees: overview.total_trainees,
            active_trainees: overview.active_trainees,
            total_modules: overview.total_modules,
            average_trainee_percentage: overview.average_trainee_percentage,
            average_score: overview.average_score,
        }
    }
}

//=========================================================================================
// Scoping
//=========================================================================================

/// Which assignments a caller's statistics are computed over.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnalyticsScope {
    All,
    Instructor(Uuid),
    Trainee(Uuid),
}

impl AnalyticsScope {
    pub fn resolve(current: &CurrentUser, instructor_id: Option<Uuid>) -> Result<Self, ApiError> {
        match (current.role, instructor_id) {
            (Role::Admin, Some(id)) => Ok(AnalyticsScope::Instructor(id)),
            (Role::Admin, None) => Ok(AnalyticsScope::All),
            (Role::Instructor, requested) => {
                if requested.is_some_and(|id| id != current.user_id) {
                    return Err(ApiError::forbidden(
                        "Instructors may only view their own analytics",
                    ));
                }
                Ok(AnalyticsScope::Instructor(current.user_id))
            }
            (Role::Trainee, None) => Ok(AnalyticsScope::Trainee(current.user_id)),
            (Role::Trainee, Some(_)) => Err(ApiError::forbidden(
                "Trainees may only view their own progress",
            )),
        }
    }
}

async fn scoped_assignments(
    state: &AppState,
    scope: AnalyticsScope,
) -> Result<Vec<Assignment>, ApiError> {
    let assignments = match scope {
        AnalyticsScope::All => state.db.list_assignments().await?,
        AnalyticsScope::Instructor(id) => state.db.list_assignments_by_instructor(id).await?,
        AnalyticsScope::Trainee(id) => state.db.list_assignments_for_trainee(id).await?,
    };
    Ok(assignments)
}

async fn scoped_modules(
    state: &AppState,
    scope: AnalyticsScope,
    assignments: &[Assignment],
) -> Result<Vec<Module>, ApiError> {
    let modules = match scope {
        AnalyticsScope::All => state.db.list_modules(None).await?,
        AnalyticsScope::Instructor(id) => state.db.list_modules(Some(id)).await?,
        AnalyticsScope::Trainee(_) => {
            let assigned: BTreeSet<Uuid> = assignments.iter().map(|a| a.module_id).collect();
            state
                .db
                .list_modules(None)
                .await?
                .into_iter()
                .filter(|m| assigned.contains(&m.id))
                .collect()
        }
    };
    Ok(modules)
}

/// Trainee accounts the statistics report on, including those with nothing assigned.
async fn scoped_trainees(state: &AppState, scope: AnalyticsScope) -> Result<Vec<Uuid>, ApiError> {
    match scope {
        AnalyticsScope::All | AnalyticsScope::Instructor(_) => Ok(state
            .db
            .list_users_by_role(Role::Trainee)
            .await?
            .into_iter()
            .map(|user| user.id)
            .collect()),
        AnalyticsScope::Trainee(id) => Ok(vec![id]),
    }
}

fn to_response_map(stats: BTreeMap<Uuid, ProgressStats>) -> BTreeMap<Uuid, ProgressStatsResponse> {
    stats.into_iter().map(|(id, s)| (id, s.into())).collect()
}

//=========================================================================================
// Handlers
//=========================================================================================

/// GET /analytics/trainees - Completion per trainee
#[utoipa::path(
    get,
    path = "/analytics/trainees",
    params(AnalyticsQuery),
    responses(
        (status = 200, description = "Stats keyed by trainee id", body = BTreeMap<Uuid, ProgressStatsResponse>),
        (status = 403, description = "Scope not visible to the caller", body = crate::error::ErrorResponse)
    )
)]
pub async fn trainee_progress_handler(
    State(state): State<Arc<AppState>>,
    Extension(current): Extension<CurrentUser>,
    Query(query): Query<AnalyticsQuery>,
) -> Result<Json<BTreeMap<Uuid, ProgressStatsResponse>>, ApiError> {
    let scope = AnalyticsScope::resolve(&current, query.instructor_id)?;
    let trainee_ids = scoped_trainees(&state, scope).await?;
    let assignments = scoped_assignments(&state, scope).await?;
    Ok(Json(to_response_map(progress_by_trainee(
        &trainee_ids,
        &assignments,
    ))))
}

/// GET /analytics/modules - Completion per module
#[utoipa::path(
    get,
    path = "/analytics/modules",
    params(AnalyticsQuery),
    responses(
        (status = 200, description = "Stats keyed by module id", body = BTreeMap<Uuid, ProgressStatsResponse>),
        (status = 403, description = "Scope not visible to the caller", body = crate::error::ErrorResponse)
    )
)]
pub async fn module_progress_handler(
    State(state): State<Arc<AppState>>,
    Extension(current): Extension<CurrentUser>,
    Query(query): Query<AnalyticsQuery>,
) -> Result<Json<BTreeMap<Uuid, ProgressStatsResponse>>, ApiError> {
    let scope = AnalyticsScope::resolve(&current, query.instructor_id)?;
    let assignments = scoped_assignments(&state, scope).await?;
    let modules = scoped_modules(&state, scope, &assignments).await?;
    Ok(Json(to_response_map(progress_by_module(&modules, &assignments))))
}

/// GET /analytics/overview - Overall completion, status split and averages
#[utoipa::path(
    get,
    path = "/analytics/overview",
    params(AnalyticsQuery),
    responses(
        (status = 200, description = "Dashboard summary", body = OverviewResponse),
        (status = 403, description = "Scope not visible to the caller", body = crate::error::ErrorResponse)
    )
)]
pub async fn overview_handler(
    State(state): State<Arc<AppState>>,
    Extension(current): Extension<CurrentUser>,
    Query(query): Query<AnalyticsQuery>,
) -> Result<Json<OverviewResponse>, ApiError> {
    let scope = AnalyticsScope::resolve(&current, query.instructor_id)?;
    let trainee_ids = scoped_trainees(&state, scope).await?;
    let assignments = scoped_assignments(&state, scope).await?;
    let modules = scoped_modules(&state, scope, &assignments).await?;
    Ok(Json(
        progress_overview(&trainee_ids, &modules, &assignments).into(),
    ))
}
