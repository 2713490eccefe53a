//! HTTP request handlers.

pub(crate) mod bulk;
pub(crate) mod generate;
pub(crate) mod health;

use qrs_render::RenderOptions;

/// Log request fields that fell back to defaults or were shrunk to fit.
pub(crate) fn log_fallbacks(options: &RenderOptions) {
    for field in &options.fallbacks {
        tracing::warn!(field, "Request field adjusted");
    }
}
