//! services/api/src/error.rs
//!
//! Defines the primary error type for the entire API service and its mapping
//! onto HTTP responses.

use crate::config::ConfigError;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use tracing::error;
use training_hub_core::ports::PortError;
use utoipa::ToSchema;

/// The primary error type for the `api` service.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// Represents an error that occurred during configuration loading.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Represents an error that propagated up from one of the core service ports.
    #[error("Service Port Error: {0}")]
    Port(#[from] PortError),

    /// Represents an error from the underlying database library.
    #[error("Database Error: {0}")]
    Database(#[from] sqlx::Error),

    /// Represents an error from running the embedded migrations.
    #[error("Migration Error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// Represents a standard Input/Output error (e.g., binding to a network socket).
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// A catch-all for any other unexpected errors.
    #[error("An unexpected internal error occurred: {0}")]
    Internal(String),
}

impl ApiError {
    /// Shorthand for a client-side validation failure.
    pub fn invalid(message: impl Into<String>) -> Self {
        ApiError::Port(PortError::InvalidInput(message.into()))
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        ApiError::Port(PortError::Forbidden(message.into()))
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::Port(port) => match port {
                PortError::NotFound(_) => StatusCode::NOT_FOUND,
                PortError::InvalidInput(_) => StatusCode::BAD_REQUEST,
                PortError::Conflict(_) => StatusCode::CONFLICT,
                PortError::Unauthorized => StatusCode::UNAUTHORIZED,
                PortError::Forbidden(_) => StatusCode::FORBIDDEN,
                PortError::Unexpected(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// The message shown to clients. Server-side failures are redacted.
    fn public_message(&self) -> String {
        match self {
            ApiError::Port(PortError::NotFound(msg))
            | ApiError::Port(PortError::InvalidInput(msg))
            | ApiError::Port(PortError::Conflict(msg))
            | ApiError::Port(PortError::Forbidden(msg)) => msg.clone(),
            ApiError::Port(PortError::Unauthorized) => "Unauthorized".to_string(),
            _ => "Internal server error".to_string(),
        }
    }
}

/// The JSON body of every error response.
#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorResponse {
    pub error: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            error!("Request failed: {}", self);
        }
        let body = ErrorResponse {
            error: self.public_message(),
        };
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(PortError::NotFound("module".into()), StatusCode::NOT_FOUND)]
    #[case(PortError::InvalidInput("moduleIds".into()), StatusCode::BAD_REQUEST)]
    #[case(PortError::Conflict("email".into()), StatusCode::CONFLICT)]
    #[case(PortError::Unauthorized, StatusCode::UNAUTHORIZED)]
    #[case(PortError::Forbidden("owner only".into()), StatusCode::FORBIDDEN)]
    #[case(PortError::Unexpected("pool timed out".into()), StatusCode::INTERNAL_SERVER_ERROR)]
    fn port_errors_map_to_status(#[case] error: PortError, #[case] expected: StatusCode) {
        let response = ApiError::from(error).into_response();
        assert_eq!(response.status(), expected);
    }

    #[test]
    fn internal_details_are_redacted() {
        let error = ApiError::from(PortError::Unexpected("password=hunter2".into()));
        assert_eq!(error.public_message(), "Internal server error");

        let error = ApiError::Internal("boom".into());
        assert_eq!(error.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(error.public_message(), "Internal server error");
    }

    #[test]
    fn client_errors_keep_their_message() {
        let error = ApiError::invalid("moduleIds must contain at least one module");
        assert_eq!(
            error.public_message(),
            "moduleIds must contain at least one module"
        );
    }
}
