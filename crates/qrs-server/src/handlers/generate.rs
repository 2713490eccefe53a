//! Single-image endpoint.

use std::sync::Arc;

use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Query, State};
use axum::http::header;
use axum::response::{IntoResponse, Response};
use qrs_config::Transport;
use qrs_render::{GenerationRequest, ImageEnvelope, normalize};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::ServerError;
use crate::handlers::log_fallbacks;
use crate::state::AppState;

/// Query parameters for POST /generate.
#[derive(Debug, Default, Deserialize)]
pub(crate) struct GenerateQuery {
    /// `json` or `binary`; overrides the configured default.
    transport: Option<String>,
}

/// JSON response for POST /generate.
#[derive(Serialize)]
struct GenerateResponse {
    #[serde(flatten)]
    image: ImageEnvelope,
    size: u32,
}

/// Handle POST /generate.
///
/// The request is validated before a render context is acquired, so a
/// missing payload never starts one.
pub(crate) async fn generate(
    State(state): State<Arc<AppState>>,
    Query(query): Query<GenerateQuery>,
    body: Result<Json<Value>, JsonRejection>,
) -> Result<Response, ServerError> {
    let Json(body) = body?;
    let request =
        GenerationRequest::from_json(body).map_err(|e| ServerError::BadRequest(e.to_string()))?;
    let options = normalize(&request)?;
    log_fallbacks(&options);

    let transport = query
        .transport
        .as_deref()
        .and_then(Transport::parse)
        .unwrap_or(state.transport);

    let image = state.renderer.generate(&options).await?;
    tracing::debug!(
        format = %image.format,
        size = options.size,
        bytes = image.bytes.len(),
        "Generated QR code"
    );

    Ok(match transport {
        Transport::Json => Json(GenerateResponse {
            image: image.envelope(),
            size: options.size,
        })
        .into_response(),
        Transport::Binary => ([(header::CONTENT_TYPE, image.mime_type)], image.bytes).into_response(),
    })
}
