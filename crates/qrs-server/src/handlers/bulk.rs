//! Batch endpoint.

use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use qrs_render::{BulkRequest, BulkResponse, normalize_batch};
use serde_json::Value;

use crate::error::ServerError;
use crate::handlers::log_fallbacks;
use crate::state::AppState;

/// Handle POST /generate-bulk.
pub(crate) async fn generate_bulk(
    State(state): State<Arc<AppState>>,
    body: Result<Json<Value>, JsonRejection>,
) -> Result<Json<BulkResponse>, ServerError> {
    let Json(body) = body?;
    let request: BulkRequest =
        serde_json::from_value(body).map_err(|e| ServerError::BadRequest(e.to_string()))?;
    let shared = normalize_batch(&request)?;
    log_fallbacks(&shared);

    let items = request.items.unwrap_or_default();
    let report = state.renderer.generate_batch(&items, &shared).await?;
    tracing::info!(
        total = report.total(),
        failed = report.failed(),
        "Generated QR batch"
    );

    Ok(Json(report.to_response()))
}
