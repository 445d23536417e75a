//! services/api/src/web/modules.rs
//!
//! CRUD endpoints for training modules. Only the authoring instructor (or an
//! admin) may change or delete a module; deletion cascades to its assignments.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Extension, Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;
use training_hub_core::domain::{Module, ModuleDraft};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

use crate::error::ApiError;
use crate::web::auth::required;
use crate::web::extract::ApiJson;
use crate::web::state::{AppState, CurrentUser};

//=========================================================================================
// Request/Response Types
//=========================================================================================

#[derive(Debug, Default, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ModuleRequest {
    pub title: Option<String>,
    pub description: Option<String>,
    pub content: Option<String>,
    /// Minutes; must be positive.
    pub estimated_duration: Option<i32>,
}

impl ModuleRequest {
    pub fn into_draft(self) -> Result<ModuleDraft, ApiError> {
        let (Some(title), Some(description), Some(content), Some(duration)) = (
            self.title,
            self.description,
            self.content,
            self.estimated_duration,
        ) else {
            return Err(ApiError::invalid("All fields are required"));
        };
        if duration <= 0 {
            return Err(ApiError::invalid("estimatedDuration must be a positive number of minutes"));
        }
        Ok(ModuleDraft {
            title: required(&title, "title")?,
            description: required(&description, "description")?,
            content: required(&content, "content")?,
            estimated_duration_minutes: duration,
        })
    }
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ModuleResponse {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    pub content: String,
    pub instructor_id: Uuid,
    pub estimated_duration: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Module> for ModuleResponse {
    fn from(module: Module) -> Self {
        Self {
            id: module.id,
            title: module.title,
            description: module.description,
            content: module.content,
            instructor_id: module.instructor_id,
            estimated_duration: module.estimated_duration_minutes,
            created_at: module.created_at,
            updated_at: module.updated_at,
        }
    }
}

#[derive(Debug, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct ListModulesQuery {
    pub instructor_id: Option<Uuid>,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DeleteModuleResponse {
    pub success: bool,
    pub removed_assignments: u64,
}

//=========================================================================================
// Helpers
//=========================================================================================

/// Loads a module and checks the caller may edit it.
async fn owned_module(
    state: &AppState,
    current: &CurrentUser,
    module_id: Uuid,
) -> Result<Module, ApiError> {
    current.require_manager()?;
    let module = state.db.get_module_by_id(module_id).await?;
    if !module.is_editable_by(current.user_id, current.role) {
        return Err(ApiError::forbidden("Only the module's instructor may change it"));
    }
    Ok(module)
}

//=========================================================================================
// Handlers
//=========================================================================================

/// GET /modules - List modules, optionally only one instructor's
#[utoipa::path(
    get,
    path = "/modules",
    params(ListModulesQuery),
    responses((status = 200, description = "Modules", body = [ModuleResponse]))
)]
pub async fn list_modules_handler(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ListModulesQuery>,
) -> Result<Json<Vec<ModuleResponse>>, ApiError> {
    let modules = state.db.list_modules(query.instructor_id).await?;
    Ok(Json(modules.into_iter().map(ModuleResponse::from).collect()))
}

/// GET /modules/{id} - Fetch one module
#[utoipa::path(
    get,
    path = "/modules/{id}",
    params(("id" = Uuid, Path, description = "Module id")),
    responses(
        (status = 200, description = "The module", body = ModuleResponse),
        (status = 404, description = "No such module", body = crate::error::ErrorResponse)
    )
)]
pub async fn get_module_handler(
    State(state): State<Arc<AppState>>,
    Path(module_id): Path<Uuid>,
) -> Result<Json<ModuleResponse>, ApiError> {
    let module = state.db.get_module_by_id(module_id).await?;
    Ok(Json(module.into()))
}

/// POST /modules - Author a new module
#[utoipa::path(
    post,
    path = "/modules",
    request_body = ModuleRequest,
    responses(
        (status = 201, description = "Module created", body = ModuleResponse),
        (status = 400, description = "Missing fields", body = crate::error::ErrorResponse),
        (status = 403, description = "Caller is a trainee", body = crate::error::ErrorResponse)
    )
)]
pub async fn create_module_handler(
    State(state): State<Arc<AppState>>,
    Extension(current): Extension<CurrentUser>,
    ApiJson(req): ApiJson<ModuleRequest>,
) -> Result<impl IntoResponse, ApiError> {
    current.require_manager()?;
    let draft = req.into_draft()?;

    let module = state.db.create_module(current.user_id, &draft).await?;
    info!("Instructor {} created module {}", current.user_id, module.id);
    Ok((StatusCode::CREATED, Json(ModuleResponse::from(module))))
}

/// PUT /modules/{id} - Edit a module's content
#[utoipa::path(
    put,
    path = "/modules/{id}",
    params(("id" = Uuid, Path, description = "Module id")),
    request_body = ModuleRequest,
    responses(
        (status = 200, description = "Module updated", body = ModuleResponse),
        (status = 400, description = "Missing fields", body = crate::error::ErrorResponse),
        (status = 403, description = "Caller does not own the module", body = crate::error::ErrorResponse),
        (status = 404, description = "No such module", body = crate::error::ErrorResponse)
    )
)]
pub async fn update_module_handler(
    State(state): State<Arc<AppState>>,
    Extension(current): Extension<CurrentUser>,
    Path(module_id): Path<Uuid>,
    ApiJson(req): ApiJson<ModuleRequest>,
) -> Result<Json<ModuleResponse>, ApiError> {
    let draft = req.into_draft()?;
    owned_module(&state, &current, module_id).await?;

    let module = state.db.update_module(module_id, &draft).await?;
    info!("Module {} updated by {}", module_id, current.user_id);
    Ok(Json(module.into()))
}

/// DELETE /modules/{id} - Delete a module and all of its assignments
#[utoipa::path(
    delete,
    path = "/modules/{id}",
    params(("id" = Uuid, Path, description = "Module id")),
    responses(
        (status = 200, description = "Module deleted", body = DeleteModuleResponse),
        (status = 403, description = "Caller does not own the module", body = crate::error::ErrorResponse),
        (status = 404, description = "No such module", body = crate::error::ErrorResponse)
    )
)]
pub async fn delete_module_handler(
    State(state): State<Arc<AppState>>,
    Extension(current): Extension<CurrentUser>,
    Path(module_id): Path<Uuid>,
) -> Result<Json<DeleteModuleResponse>, ApiError> {
    owned_module(&state, &current, module_id).await?;

    let removed_assignments = state.db.delete_module_cascade(module_id).await?;
    info!(
        "Module {} deleted by {} ({} assignments removed)",
        module_id, current.user_id, removed_assignments
    );
    Ok(Json(DeleteModuleResponse {
        success: true,
        removed_assignments,
    }))
}
