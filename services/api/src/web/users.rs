//! services/api/src/web/users.rs
//!
//! Profile endpoints for the signed-in user and the trainee directory used by
//! instructors when assigning modules.

use axum::{
    extract::{Query, State},
    response::IntoResponse,
    Extension, Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;
use training_hub_core::domain::{Role, User};
use training_hub_core::ports::PortError;
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

use crate::error::ApiError;
use crate::web::auth::{normalize_email, required};
use crate::web::extract::ApiJson;
use crate::web::password::{check_password_strength, hash_password, verify_password};
use crate::web::state::{AppState, CurrentUser};

//=========================================================================================
// Request/Response Types
//=========================================================================================

/// A user profile without credentials.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UserResponse {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub role: String,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<User> for UserResponse {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            name: user.name,
            email: user.email,
            role: user.role.as_str().to_string(),
            is_active: user.is_active,
            created_at: user.created_at,
            updated_at: user.updated_at,
        }
    }
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateProfileRequest {
    pub name: Option<String>,
    pub email: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ChangePasswordRequest {
    pub current_password: Option<String>,
    pub new_password: Option<String>,
}

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ListUsersQuery {
    /// `instructor`, `trainee` or `admin`.
    pub role: Option<String>,
}

#[derive(Serialize, ToSchema)]
pub struct MessageResponse {
    pub success: bool,
    pub message: String,
}

//=========================================================================================
// Handlers
//=========================================================================================

/// GET /users/me - The signed-in user's profile
#[utoipa::path(
    get,
    path = "/users/me",
    responses(
        (status = 200, description = "Current profile", body = UserResponse),
        (status = 401, description = "Not signed in")
    )
)]
pub async fn current_user_handler(
    State(state): State<Arc<AppState>>,
    Extension(current): Extension<CurrentUser>,
) -> Result<Json<UserResponse>, ApiError> {
    let user = state.db.get_user_by_id(current.user_id).await?;
    Ok(Json(user.into()))
}

/// PUT /users/me/profile - Update name and email
#[utoipa::path(
    put,
    path = "/users/me/profile",
    request_body = UpdateProfileRequest,
    responses(
        (status = 200, description = "Profile updated", body = UserResponse),
        (status = 400, description = "Invalid request", body = crate::error::ErrorResponse),
        (status = 409, description = "Email already in use", body = crate::error::ErrorResponse)
    )
)]
pub async fn update_profile_handler(
    State(state): State<Arc<AppState>>,
    Extension(current): Extension<CurrentUser>,
    ApiJson(req): ApiJson<UpdateProfileRequest>,
) -> Result<Json<UserResponse>, ApiError> {
    let name = required(req.name.as_deref().unwrap_or_default(), "name")?;
    let email = normalize_email(req.email.as_deref().unwrap_or_default())?;

    let user = state
        .db
        .update_user_profile(current.user_id, &name, &email)
        .await
        .map_err(|e| match e {
            PortError::Conflict(_) => PortError::Conflict("User already exists".to_string()),
            other => other,
        })?;
    info!("User {} updated their profile", user.id);
    Ok(Json(user.into()))
}

/// PUT /users/me/password - Change password after verifying the current one
#[utoipa::path(
    put,
    path = "/users/me/password",
    request_body = ChangePasswordRequest,
    responses(
        (status = 200, description = "Password changed", body = MessageResponse),
        (status = 400, description = "Weak or missing password", body = crate::error::ErrorResponse),
        (status = 401, description = "Current password is incorrect", body = crate::error::ErrorResponse)
    )
)]
pub async fn change_password_handler(
    State(state): State<Arc<AppState>>,
    Extension(current): Extension<CurrentUser>,
    ApiJson(req): ApiJson<ChangePasswordRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let (Some(current_password), Some(new_password)) = (req.current_password, req.new_password)
    else {
        return Err(ApiError::invalid("currentPassword and newPassword are required"));
    };

    let creds = state.db.get_user_credentials_by_id(current.user_id).await?;
    if !verify_password(&current_password, &creds.hashed_password)? {
        return Err(PortError::Unauthorized.into());
    }
    check_password_strength(&new_password)?;

    let hashed = hash_password(&new_password)?;
    state.db.update_password_hash(current.user_id, &hashed).await?;
    info!("User {} changed their password", current.user_id);

    Ok(Json(MessageResponse {
        success: true,
        message: "Password changed successfully".to_string(),
    }))
}

/// GET /users?role= - List users with a given role (instructors and admins)
#[utoipa::path(
    get,
    path = "/users",
    params(ListUsersQuery),
    responses(
        (status = 200, description = "Users with the role", body = [UserResponse]),
        (status = 400, description = "Missing or unknown role", body = crate::error::ErrorResponse),
        (status = 403, description = "Caller is a trainee", body = crate::error::ErrorResponse)
    )
)]
pub async fn list_users_handler(
    State(state): State<Arc<AppState>>,
    Extension(current): Extension<CurrentUser>,
    Query(query): Query<ListUsersQuery>,
) -> Result<Json<Vec<UserResponse>>, ApiError> {
    current.require_manager()?;
    let role = query
        .role
        .as_deref()
        .and_then(Role::parse)
        .ok_or_else(|| ApiError::invalid("role must be instructor, trainee or admin"))?;

    let users = state.db.list_users_by_role(role).await?;
    Ok(Json(users.into_iter().map(UserResponse::from).collect()))
}
