//! Error types for the HTTP server.

use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use qrs_render::{RenderError, ValidationError};
use serde_json::json;

/// Server error type.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    /// Body could not be read as JSON.
    #[error(transparent)]
    Rejected(#[from] JsonRejection),

    /// JSON body has the wrong shape.
    #[error("invalid request: {0}")]
    BadRequest(String),

    /// Render pipeline failure.
    #[error(transparent)]
    Render(#[from] RenderError),
}

impl From<ValidationError> for ServerError {
    fn from(err: ValidationError) -> Self {
        Self::Render(err.into())
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let (status, body) = match &self {
            Self::Rejected(rejection) => (rejection.status(), json!({"error": rejection.body_text()})),
            Self::BadRequest(_) => (StatusCode::BAD_REQUEST, json!({"error": self.to_string()})),
            Self::Render(RenderError::Validation(e)) => {
                (StatusCode::BAD_REQUEST, json!({"error": e.to_string()}))
            }
            Self::Render(e) => {
                tracing::error!(error = %e, "Render failed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    json!({"error": e.code(), "details": e.to_string()}),
                )
            }
        };

        (status, axum::Json(body)).into_response()
    }
}
