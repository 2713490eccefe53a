//! Application state.
//!
//! Shared state for all request handlers.

use qrs_config::Transport;
use qrs_render::QrRenderer;

/// Application state shared across all handlers.
#[derive(Debug)]
pub(crate) struct AppState {
    /// Render pipeline; each request acquires its own context from it.
    pub(crate) renderer: QrRenderer,
    /// Default `/generate` transport when the request does not choose one.
    pub(crate) transport: Transport,
    /// Application version reported by `/health`.
    pub(crate) version: String,
}
