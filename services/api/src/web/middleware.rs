//! services/api/src/web/middleware.rs
//!
//! Authentication middleware for protecting routes, plus the session cookie
//! helpers shared with the auth handlers.

use axum::{
    extract::{Request, State},
    http::{header, HeaderMap},
    middleware::Next,
    response::Response,
};
use chrono::Duration;
use std::sync::Arc;
use tracing::warn;
use training_hub_core::ports::PortError;

use crate::error::ApiError;
use crate::web::state::{AppState, CurrentUser};

pub const SESSION_COOKIE: &str = "session";

/// Extracts the auth session id from the `Cookie` header.
pub fn session_id_from_headers(headers: &HeaderMap) -> Option<&str> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .find_map(|c| {
            let (name, value) = c.trim().split_once('=')?;
            (name == SESSION_COOKIE && !value.is_empty()).then_some(value)
        })
}

/// The `Set-Cookie` value that stores a session id in the browser.
pub fn session_cookie(session_id: &str, ttl: Duration, secure: bool) -> String {
    format!(
        "{}={}; HttpOnly;{} SameSite=Lax; Path=/; Max-Age={}",
        SESSION_COOKIE,
        session_id,
        if secure { " Secure;" } else { "" },
        ttl.num_seconds()
    )
}

/// The `Set-Cookie` value that removes the session cookie.
pub fn cleared_session_cookie(secure: bool) -> String {
    session_cookie("", Duration::zero(), secure)
}

/// Resolves the caller behind the session cookie in `headers`.
///
/// Missing, unknown or expired sessions and disabled accounts are 401; storage
/// failures propagate unchanged.
pub async fn authenticate(state: &AppState, headers: &HeaderMap) -> Result<CurrentUser, ApiError> {
    // 1. Parse session ID from cookie
    let auth_session_id = session_id_from_headers(headers).ok_or(PortError::Unauthorized)?;

    // 2. Validate auth session in database, get user_id
    let user_id = state
        .db
        .validate_auth_session(auth_session_id)
        .await
        .map_err(|e| match e {
            PortError::Unauthorized | PortError::NotFound(_) => {
                warn!("Rejected auth session: {:?}", e);
                PortError::Unauthorized
            }
            other => other,
        })?;

    // 3. Load the caller's role
    let user = state.db.get_user_by_id(user_id).await.map_err(|e| match e {
        PortError::NotFound(_) => PortError::Unauthorized,
        other => other,
    })?;
    if !user.is_active {
        warn!("Disabled user {} presented a session", user_id);
        return Err(PortError::Unauthorized.into());
    }

    Ok(CurrentUser {
        user_id: user.id,
        role: user.role,
    })
}

/// Middleware that validates the auth session cookie and resolves the caller.
///
/// If valid, inserts a `CurrentUser` into request extensions for handlers to use.
pub async fn require_auth(
    State(state): State<Arc<AppState>>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let current = authenticate(&state, req.headers()).await?;
    req.extensions_mut().insert(current);
    Ok(next.run(req).await)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{fixture_state, FixtureDatabase};
    use axum::http::{HeaderValue, StatusCode};
    use training_hub_core::domain::Role;

    fn session_headers(session_id: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        let cookie = format!("{}={}", SESSION_COOKIE, session_id);
        headers.insert(header::COOKIE, HeaderValue::from_str(&cookie).unwrap());
        headers
    }

    #[test]
    fn finds_session_among_other_cookies() {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::COOKIE,
            HeaderValue::from_static("theme=dark; session=abc-123; lang=en"),
        );
        assert_eq!(session_id_from_headers(&headers), Some("abc-123"));
    }

    #[test]
    fn ignores_lookalike_and_empty_cookies() {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::COOKIE,
            HeaderValue::from_static("old_session=xyz; session="),
        );
        assert_eq!(session_id_from_headers(&headers), None);
        assert_eq!(session_id_from_headers(&HeaderMap::new()), None);
    }

    #[test]
    fn cookie_carries_expiry_and_secure_flag() {
        let cookie = session_cookie("abc", Duration::days(30), true);
        assert_eq!(
            cookie,
            "session=abc; HttpOnly; Secure; SameSite=Lax; Path=/; Max-Age=2592000"
        );

        let cleared = cleared_session_cookie(false);
        assert_eq!(cleared, "session=; HttpOnly; SameSite=Lax; Path=/; Max-Age=0");
    }

    #[tokio::test]
    async fn a_live_session_resolves_the_caller() {
        let db = FixtureDatabase::default();
        let trainee = db.add_user("Tom Trainee", Role::Trainee);
        let session_id = db.open_session(trainee.id);
        let state = fixture_state(db);

        let current = authenticate(&state, &session_headers(&session_id)).await.unwrap();
        assert_eq!(current, CurrentUser { user_id: trainee.id, role: Role::Trainee });
    }

    #[tokio::test]
    async fn unknown_or_missing_sessions_are_unauthorized() {
        let state = fixture_state(FixtureDatabase::default());

        let unknown = authenticate(&state, &session_headers("no-such-session")).await.unwrap_err();
        assert_eq!(unknown.status_code(), StatusCode::UNAUTHORIZED);

        let missing = authenticate(&state, &HeaderMap::new()).await.unwrap_err();
        assert_eq!(missing.status_code(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn session_store_failures_are_server_errors() {
        let db = FixtureDatabase::default().with_session_store_down();
        let trainee = db.add_user("Tom Trainee", Role::Trainee);
        let session_id = db.open_session(trainee.id);
        let state = fixture_state(db);

        let err = authenticate(&state, &session_headers(&session_id)).await.unwrap_err();
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
