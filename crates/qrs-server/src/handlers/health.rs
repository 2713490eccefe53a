//! Liveness endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use chrono::{SecondsFormat, Utc};
use serde::Serialize;

use crate::state::AppState;

/// Response for GET /health.
#[derive(Serialize)]
pub(crate) struct HealthResponse {
    status: &'static str,
    /// Current time (RFC 3339, UTC).
    timestamp: String,
    version: String,
}

/// Handle GET /.
pub(crate) async fn root() -> &'static str {
    "QR microservice running"
}

/// Handle GET /health.
pub(crate) async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
        version: state.version.clone(),
    })
}
