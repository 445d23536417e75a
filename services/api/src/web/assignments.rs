//! services/api/src/web/assignments.rs
//!
//! Assignment endpoints: listing, reconciling a trainee's assignment set, and
//! marking an assignment completed.

use axum::{
    extract::{Query, State},
    Extension, Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;
use training_hub_core::domain::{Assignment, AssignmentDetails, AssignmentStatus, Role};
use training_hub_core::reconcile::{reconcile_assignments, AssignmentSelection};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

use crate::error::ApiError;
use crate::web::extract::ApiJson;
use crate::web::state::{AppState, CurrentUser};

//=========================================================================================
// Request/Response Types
//=========================================================================================

#[derive(Debug, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct ListAssignmentsQuery {
    pub trainee_id: Option<Uuid>,
    pub instructor_id: Option<Uuid>,
}

/// Module fields attached to trainee-scoped listings.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AssignedModuleSummary {
    pub title: String,
    pub description: String,
    pub estimated_duration: i32,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AssignmentResponse {
    pub id: Uuid,
    pub module_id: Uuid,
    pub trainee_id: Uuid,
    pub instructor_id: Uuid,
    /// `NOT_STARTED` or `COMPLETED`.
    pub status: String,
    pub score: Option<i32>,
    pub attempts: i32,
    pub completed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub module: Option<AssignedModuleSummary>,
}

impl From<Assignment> for AssignmentResponse {
    fn from(a: Assignment) -> Self {
        Self {
            id: a.id,
            module_id: a.module_id,
            trainee_id: a.trainee_id,
            instructor_id: a.instructor_id,
            status: a.status.as_str().to_string(),
            score: a.score,
            attempts: a.attempts,
            completed_at: a.completed_at,
            created_at: a.created_at,
            updated_at: a.updated_at,
            module: None,
        }
    }
}

impl From<AssignmentDetails> for AssignmentResponse {
    fn from(details: AssignmentDetails) -> Self {
        Self {
            module: Some(AssignedModuleSummary {
                title: details.module_title,
                description: details.module_description,
                estimated_duration: details.estimated_duration_minutes,
            }),
            ..Self::from(details.assignment)
        }
    }
}

/// The complete desired module set for one trainee.
#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ReconcileAssignmentsRequest {
    pub module_ids: Option<Vec<Option<String>>>,
    pub trainee_id: Option<String>,
    pub instructor_id: Option<String>,
}

impl ReconcileAssignmentsRequest {
    /// Parses identifiers and applies the reconciler's input rules.
    pub fn into_selection(self) -> Result<AssignmentSelection, ApiError> {
        let trainee_id = parse_optional_id(self.trainee_id.as_deref(), "traineeId")?;
        let instructor_id = parse_optional_id(self.instructor_id.as_deref(), "instructorId")?;

        let module_ids = self
            .module_ids
            .unwrap_or_default()
            .into_iter()
            .map(|entry| match entry.as_deref().map(str::trim) {
                None | Some("") => Err(ApiError::invalid("moduleIds must not contain empty entries")),
                Some(raw) => Uuid::parse_str(raw)
                    .map_err(|_| ApiError::invalid(format!("Invalid module id '{}'", raw))),
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(AssignmentSelection::new(trainee_id, instructor_id, &module_ids)?)
    }
}

/// Blank identifiers count as missing; malformed ones are rejected.
fn parse_optional_id(raw: Option<&str>, field: &str) -> Result<Option<Uuid>, ApiError> {
    match raw.map(str::trim) {
        None | Some("") => Ok(None),
        Some(value) => Uuid::parse_str(value)
            .map(Some)
            .map_err(|_| ApiError::invalid(format!("{} is not a valid id", field))),
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ReconcileAssignmentsResponse {
    pub success: bool,
    pub added: usize,
    pub removed: usize,
    /// The trainee's assignments after reconciliation.
    pub assignments: Vec<AssignmentResponse>,
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateAssignmentStatusRequest {
    pub assignment_id: Option<String>,
    /// Only `COMPLETED` is accepted.
    pub status: Option<String>,
    /// Optional score between 0 and 100.
    pub score: Option<i32>,
}

/// A validated status update.
#[derive(Debug, PartialEq, Eq)]
pub struct StatusUpdate {
    pub assignment_id: Uuid,
    pub score: Option<i32>,
}

impl UpdateAssignmentStatusRequest {
    pub fn validate(self) -> Result<StatusUpdate, ApiError> {
        let assignment_id = parse_optional_id(self.assignment_id.as_deref(), "assignmentId")?
            .ok_or_else(|| ApiError::invalid("assignmentId is required"))?;
        match self.status.as_deref().and_then(AssignmentStatus::parse) {
            Some(AssignmentStatus::Completed) => {}
            _ => return Err(ApiError::invalid("status must be COMPLETED")),
        }
        if let Some(score) = self.score {
            if !(0..=100).contains(&score) {
                return Err(ApiError::invalid("score must be between 0 and 100"));
            }
        }
        Ok(StatusUpdate {
            assignment_id,
            score: self.score,
        })
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct UpdateAssignmentStatusResponse {
    pub success: bool,
    pub assignment: AssignmentResponse,
}

//=========================================================================================
// Handlers
//=========================================================================================

/// GET /assignments - List a trainee's or an instructor's assignments
///
/// Trainee-scoped results include the module's title, description and duration.
#[utoipa::path(
    get,
    path = "/assignments",
    params(ListAssignmentsQuery),
    responses(
        (status = 200, description = "Assignments in scope", body = [AssignmentResponse]),
        (status = 400, description = "Neither filter supplied", body = crate::error::ErrorResponse),
        (status = 403, description = "Scope not visible to the caller", body = crate::error::ErrorResponse)
    )
)]
pub async fn list_assignments_handler(
    State(state): State<Arc<AppState>>,
    Extension(current): Extension<CurrentUser>,
    Query(query): Query<ListAssignmentsQuery>,
) -> Result<Json<Vec<AssignmentResponse>>, ApiError> {
    if let Some(trainee_id) = query.trainee_id {
        if current.role == Role::Trainee && current.user_id != trainee_id {
            return Err(ApiError::forbidden("Trainees may only view their own assignments"));
        }
        let details = state.db.list_assignment_details_for_trainee(trainee_id).await?;
        return Ok(Json(details.into_iter().map(AssignmentResponse::from).collect()));
    }

    if let Some(instructor_id) = query.instructor_id {
        current.require_acting_as(instructor_id)?;
        let assignments = state.db.list_assignments_by_instructor(instructor_id).await?;
        return Ok(Json(assignments.into_iter().map(AssignmentResponse::from).collect()));
    }

    Err(ApiError::invalid("traineeId or instructorId is required"))
}

/// POST /assignments - Make a trainee's assignments match the given modules
#[utoipa::path(
    post,
    path = "/assignments",
    request_body = ReconcileAssignmentsRequest,
    responses(
        (status = 200, description = "Assignments reconciled", body = ReconcileAssignmentsResponse),
        (status = 400, description = "Invalid assignment data", body = crate::error::ErrorResponse),
        (status = 403, description = "Caller may not assign for this instructor", body = crate::error::ErrorResponse),
        (status = 404, description = "Unknown trainee or module", body = crate::error::ErrorResponse)
    )
)]
pub async fn reconcile_assignments_handler(
    State(state): State<Arc<AppState>>,
    Extension(current): Extension<CurrentUser>,
    ApiJson(req): ApiJson<ReconcileAssignmentsRequest>,
) -> Result<Json<ReconcileAssignmentsResponse>, ApiError> {
    let selection = req.into_selection()?;
    current.require_acting_as(selection.instructor_id())?;

    let trainee = state.db.get_user_by_id(selection.trainee_id()).await?;
    if trainee.role != Role::Trainee {
        return Err(ApiError::invalid("traineeId does not belong to a trainee"));
    }

    let outcome = reconcile_assignments(state.db.as_ref(), &selection).await?;
    info!(
        "Instructor {} reconciled trainee {}: +{} -{}",
        selection.instructor_id(),
        trainee.id,
        outcome.added,
        outcome.removed
    );

    let assignments = state.db.list_assignments_for_trainee(trainee.id).await?;
    Ok(Json(ReconcileAssignmentsResponse {
        success: true,
        added: outcome.added,
        removed: outcome.removed,
        assignments: assignments.into_iter().map(AssignmentResponse::from).collect(),
    }))
}

/// PUT /assignments/status - Mark an assignment completed
#[utoipa::path(
    put,
    path = "/assignments/status",
    request_body = UpdateAssignmentStatusRequest,
    responses(
        (status = 200, description = "Assignment updated", body = UpdateAssignmentStatusResponse),
        (status = 400, description = "Invalid status or score", body = crate::error::ErrorResponse),
        (status = 403, description = "Caller is not part of the assignment", body = crate::error::ErrorResponse),
        (status = 404, description = "Assignment not found", body = crate::error::ErrorResponse)
    )
)]
pub async fn update_assignment_status_handler(
    State(state): State<Arc<AppState>>,
    Extension(current): Extension<CurrentUser>,
    ApiJson(req): ApiJson<UpdateAssignmentStatusRequest>,
) -> Result<Json<UpdateAssignmentStatusResponse>, ApiError> {
    let update = req.validate()?;

    let existing = state.db.get_assignment_by_id(update.assignment_id).await?;
    if !existing.is_updatable_by(current.user_id, current.role) {
        return Err(ApiError::forbidden("Only the trainee or assigning instructor may update this assignment"));
    }

    let assignment = state
        .db
        .complete_assignment(existing.id, update.score)
        .await?;
    info!("Assignment {} completed (attempt {})", assignment.id, assignment.attempts);

    Ok(Json(UpdateAssignmentStatusResponse {
        success: true,
        assignment: assignment.into(),
    }))
}
