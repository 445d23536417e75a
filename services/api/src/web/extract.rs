//! services/api/src/web/extract.rs
//!
//! A JSON body extractor whose rejections use the service's error body.

use axum::{
    extract::{rejection::JsonRejection, FromRequest, Request},
    Json,
};
use serde::de::DeserializeOwned;

use crate::error::ApiError;

/// Like `axum::Json`, but malformed or mistyped bodies become a 400
/// `{"error": ...}` response instead of axum's plain-text rejection.
#[derive(Debug, Clone, Copy, Default)]
pub struct ApiJson<T>(pub T);

impl<S, T> FromRequest<S> for ApiJson<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state).await?;
        Ok(Self(value))
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::invalid(rejection.body_text())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::web::assignments::ReconcileAssignmentsRequest;
    use axum::{
        body::{to_bytes, Body},
        http::{header, StatusCode},
        response::IntoResponse,
    };

    fn json_request(body: &'static str) -> Request {
        Request::builder()
            .method("POST")
            .uri("/assignments")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body))
            .unwrap()
    }

    async fn error_body(err: ApiError) -> (StatusCode, serde_json::Value) {
        let response = err.into_response();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn mistyped_fields_get_the_json_error_body() {
        let err = ApiJson::<ReconcileAssignmentsRequest>::from_request(
            json_request(r#"{"moduleIds": [123]}"#),
            &(),
        )
        .await
        .unwrap_err();

        let (status, body) = error_body(err).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].is_string());
    }

    #[tokio::test]
    async fn unparseable_json_is_a_bad_request() {
        let err = ApiJson::<ReconcileAssignmentsRequest>::from_request(json_request("{not json"), &())
            .await
            .unwrap_err();

        let (status, body) = error_body(err).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].is_string());
    }

    #[tokio::test]
    async fn well_formed_bodies_pass_through() {
        let ApiJson(req) = ApiJson::<ReconcileAssignmentsRequest>::from_request(
            json_request(r#"{"moduleIds": [], "traineeId": null}"#),
            &(),
        )
        .await
        .unwrap();
        assert_eq!(req.module_ids, Some(vec![]));
    }
}
