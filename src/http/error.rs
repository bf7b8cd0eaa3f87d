//! Dispatch error types and their HTTP mapping.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;
use tower::BoxError;

/// Errors raised while dispatching a single request.
#[derive(Debug, Error)]
pub enum DispatchError {
    /// A guard failed instead of allowing or denying.
    #[error("Guard failed: {0}")]
    Guard(BoxError),

    /// A middleware returned an error.
    #[error("Middleware failed: {0}")]
    Middleware(BoxError),

    /// The route handler returned an error.
    #[error("Handler failed: {0}")]
    Handler(BoxError),

    /// A context-dependent descriptor field could not be resolved.
    #[error("Failed to resolve `{field}`: {source}")]
    Resolve {
        field: &'static str,
        #[source]
        source: BoxError,
    },

    /// A descriptor field resolved to a value of the wrong shape.
    #[error("Invalid `{field}`: {message}")]
    InvalidDescriptor { field: &'static str, message: String },

    #[error("Invalid status code {0}")]
    InvalidStatus(u16),

    #[error("Invalid header `{name}`")]
    InvalidHeader { name: String },

    /// Request failed schema validation.
    #[error("{0}")]
    BadRequest(String),

    /// Request body could not be read or parsed.
    #[error("{0}")]
    Body(String),

    #[error("Serialization failed: {0}")]
    Serialize(#[from] serde_json::Error),
}

impl DispatchError {
    pub fn status(&self) -> StatusCode {
        match self {
            DispatchError::BadRequest(_) | DispatchError::Body(_) => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for DispatchError {
    fn into_response(self) -> Response {
        let status = self.status();
        let error = match status {
            StatusCode::BAD_REQUEST => "Bad Request",
            _ => "Internal Server Error",
        };
        let body = json!({
            "error": error,
            "message": self.to_string(),
        });
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(
            DispatchError::BadRequest("body/name is required".into()).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            DispatchError::Handler("boom".into()).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[tokio::test]
    async fn test_error_body() {
        let response = DispatchError::Handler("boom".into()).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["error"], "Internal Server Error");
        assert_eq!(body["message"], "Handler failed: boom");
    }
}
