//! Render pipeline error types.

use std::time::Duration;

/// Request validation failure.
///
/// The message is stable and safe to return to clients verbatim.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("data is required")]
    MissingData,
    #[error("items is required")]
    MissingItems,
    #[error("items must not be empty")]
    EmptyBatch,
    #[error("too many items: {count} (maximum {max})")]
    BatchTooLarge { count: usize, max: usize },
}

/// Failure anywhere in the render pipeline.
#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// The rendering context could not be started.
    #[error("failed to launch render context: {0}")]
    ProcessLaunch(String),

    /// The completion signal was not observed before the deadline.
    #[error("render did not complete within {}ms", .0.as_millis())]
    RenderTimeout(Duration),

    /// The page holds no artifact for the requested format.
    #[error("no {format} output could be extracted: {reason}")]
    RenderExtraction {
        format: &'static str,
        reason: String,
    },

    /// The artifact could not be wrapped for delivery.
    #[error("cannot encode output: {0}")]
    Encoding(String),

    /// The styling engine rejected the configuration.
    #[error("styling engine failed: {0}")]
    Engine(String),
}

impl RenderError {
    /// Short, stable identifier for client-facing error bodies.
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::Validation(_) => "invalid request",
            Self::ProcessLaunch(_) => "render context launch failed",
            Self::RenderTimeout(_) => "render timed out",
            Self::RenderExtraction { .. } => "render produced no output",
            Self::Encoding(_) => "encoding failed",
            Self::Engine(_) => "render failed",
        }
    }

    pub(crate) fn extraction(format: &'static str, reason: impl Into<String>) -> Self {
        Self::RenderExtraction {
            format,
            reason: reason.into(),
        }
    }
}
