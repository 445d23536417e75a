//! services/api/src/web/auth.rs
//!
//! Authentication endpoints for user signup, login, and logout.

use axum::{
    extract::State,
    http::{header, HeaderMap, StatusCode},
    response::IntoResponse,
    Json,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, warn};
use training_hub_core::domain::{NewUser, Role, User};
use training_hub_core::ports::PortError;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::error::ApiError;
use crate::web::extract::ApiJson;
use crate::web::middleware::{cleared_session_cookie, session_cookie, session_id_from_headers};
use crate::web::password::{check_password_strength, hash_password, verify_password};
use crate::web::state::AppState;
use crate::web::users::UserResponse;

//=========================================================================================
// Request/Response Types
//=========================================================================================

#[derive(Debug, Deserialize, ToSchema)]
pub struct SignupRequest {
    pub name: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
    /// `instructor` or `trainee`.
    pub role: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct LoginRequest {
    pub email: Option<String>,
    pub password: Option<String>,
}

#[derive(Serialize, ToSchema)]
pub struct AuthResponse {
    pub user: UserResponse,
}

/// A validated signup, password not yet hashed.
#[derive(Debug, PartialEq, Eq)]
pub struct Signup {
    pub name: String,
    pub email: String,
    pub password: String,
    pub role: Role,
}

impl SignupRequest {
    pub fn validate(self) -> Result<Signup, ApiError> {
        let (Some(name), Some(email), Some(password), Some(role)) =
            (self.name, self.email, self.password, self.role)
        else {
            return Err(ApiError::invalid("All fields are required"));
        };
        let name = required(&name, "name")?;
        let email = normalize_email(&email)?;
        let role = match Role::parse(&role) {
            Some(role @ (Role::Instructor | Role::Trainee)) => role,
            _ => return Err(ApiError::invalid("role must be instructor or trainee")),
        };
        check_password_strength(&password)?;
        Ok(Signup {
            name,
            email,
            password,
            role,
        })
    }
}

/// Trims a required text field, rejecting blanks.
pub fn required(value: &str, field: &str) -> Result<String, ApiError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ApiError::invalid(format!("{} is required", field)));
    }
    Ok(trimmed.to_string())
}

/// Lowercases and trims an email address, rejecting obviously malformed ones.
pub fn normalize_email(value: &str) -> Result<String, ApiError> {
    let email = value.trim().to_lowercase();
    match email.split_once('@') {
        Some((local, domain)) if !local.is_empty() && domain.contains('.') => Ok(email),
        _ => Err(ApiError::invalid("email is not a valid address")),
    }
}

//=========================================================================================
// Helpers
//=========================================================================================

/// Opens a server-side session for `user` and returns its `Set-Cookie` value.
async fn open_session(state: &AppState, user_id: Uuid) -> Result<String, ApiError> {
    // 1. Generate an opaque auth session ID
    let auth_session_id = Uuid::new_v4().to_string();

    // 2. Set expiration
    let ttl = state.config.session_ttl();
    let expires_at = Utc::now() + ttl;

    // 3. Create auth session in database
    state
        .db
        .create_auth_session(&auth_session_id, user_id, expires_at)
        .await?;

    Ok(session_cookie(&auth_session_id, ttl, state.config.cookie_secure))
}

fn auth_response(user: User) -> AuthResponse {
    AuthResponse {
        user: UserResponse::from(user),
    }
}

//=========================================================================================
// Handlers
//=========================================================================================

/// POST /auth/signup - Create a new user account
#[utoipa::path(
    post,
    path = "/auth/signup",
    request_body = SignupRequest,
    responses(
        (status = 201, description = "User created successfully", body = AuthResponse),
        (status = 400, description = "Invalid request or weak password", body = crate::error::ErrorResponse),
        (status = 409, description = "Email already registered", body = crate::error::ErrorResponse),
        (status = 500, description = "Internal server error")
    )
)]
pub async fn signup_handler(
    State(state): State<Arc<AppState>>,
    ApiJson(req): ApiJson<SignupRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let signup = req.validate()?;
    let hashed_password = hash_password(&signup.password)?;

    let user = state
        .db
        .create_user(&NewUser {
            name: signup.name,
            email: signup.email,
            hashed_password,
            role: signup.role,
        })
        .await
        .map_err(|e| match e {
            PortError::Conflict(_) => PortError::Conflict("User already exists".to_string()),
            other => other,
        })?;
    info!("Registered {} {}", user.role.as_str(), user.id);

    let cookie = open_session(&state, user.id).await?;
    Ok((
        StatusCode::CREATED,
        [(header::SET_COOKIE, cookie)],
        Json(auth_response(user)),
    ))
}

/// POST /auth/login - Login with existing account
#[utoipa::path(
    post,
    path = "/auth/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Login successful", body = AuthResponse),
        (status = 400, description = "Missing email or password", body = crate::error::ErrorResponse),
        (status = 401, description = "Invalid credentials", body = crate::error::ErrorResponse),
        (status = 403, description = "Account disabled", body = crate::error::ErrorResponse)
    )
)]
pub async fn login_handler(
    State(state): State<Arc<AppState>>,
    ApiJson(req): ApiJson<LoginRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let (Some(email), Some(password)) = (req.email, req.password) else {
        return Err(ApiError::invalid("Email and password are required"));
    };
    let email = email.trim().to_lowercase();

    // 1. Get user by email
    let creds = state
        .db
        .get_user_credentials_by_email(&email)
        .await
        .map_err(|e| match e {
            PortError::NotFound(_) => {
                warn!("Login attempt for unknown email");
                PortError::Unauthorized
            }
            other => other,
        })?;

    // 2. Verify password
    if !verify_password(&password, &creds.hashed_password)? {
        warn!("Failed login for user {}", creds.user_id);
        return Err(PortError::Unauthorized.into());
    }
    if !creds.is_active {
        return Err(ApiError::forbidden("Account is disabled"));
    }

    // 3. Open the session and return the profile
    let user = state.db.get_user_by_id(creds.user_id).await?;
    let cookie = open_session(&state, user.id).await?;
    info!("User {} logged in", user.id);

    Ok((
        StatusCode::OK,
        [(header::SET_COOKIE, cookie)],
        Json(auth_response(user)),
    ))
}

/// POST /auth/logout - Logout and invalidate session
#[utoipa::path(
    post,
    path = "/auth/logout",
    responses(
        (status = 200, description = "Logout successful"),
        (status = 401, description = "No active session")
    )
)]
pub async fn logout_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, ApiError> {
    // 1. Extract session cookie
    let auth_session_id = session_id_from_headers(&headers).ok_or(PortError::Unauthorized)?;

    // 2. Delete auth session from database
    state.db.delete_auth_session(auth_session_id).await?;

    // 3. Clear cookie
    let cookie = cleared_session_cookie(state.config.cookie_secure);
    Ok((StatusCode::OK, [(header::SET_COOKIE, cookie)]))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn signup(role: &str, password: &str) -> SignupRequest {
        SignupRequest {
            name: Some("  Jane Trainee ".to_string()),
            email: Some(" Jane@Example.com ".to_string()),
            password: Some(password.to_string()),
            role: Some(role.to_string()),
        }
    }

    #[test]
    fn signup_is_normalized() {
        let valid = signup("trainee", "Str0ng!Pass").validate().unwrap();
        assert_eq!(
            valid,
            Signup {
                name: "Jane Trainee".to_string(),
                email: "jane@example.com".to_string(),
                password: "Str0ng!Pass".to_string(),
                role: Role::Trainee,
            }
        );
    }

    #[test]
    fn signup_rejects_missing_fields_admin_role_and_weak_passwords() {
        let missing = SignupRequest {
            name: None,
            ..signup("trainee", "Str0ng!Pass")
        };
        assert_eq!(missing.validate().unwrap_err().status_code(), StatusCode::BAD_REQUEST);
        assert!(signup("admin", "Str0ng!Pass").validate().is_err());
        assert!(signup("trainee", "weak").validate().is_err());
    }

    #[test]
    fn email_must_look_like_an_address() {
        assert!(normalize_email("no-at-sign").is_err());
        assert!(normalize_email("@example.com").is_err());
        assert_eq!(normalize_email("A@B.io").unwrap(), "a@b.io");
    }
}
