//! Styling engine abstraction.
//!
//! The bridge drives an engine on a blocking worker and only sees the markup
//! it returns. [`NativeStyler`] is the built-in engine; tests and embedders can
//! substitute their own.

use qrcodegen::QrCode;

use crate::options::RenderOptions;
use crate::svg::{self, Matrix};

/// Error reported by a styling engine.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{0}")]
pub struct EngineError(pub String);

/// Produces styled QR markup from resolved options.
///
/// Implementations run on a blocking thread and may take arbitrarily long;
/// the bridge enforces the deadline.
pub trait StylingEngine: Send + Sync {
    /// Paint the code described by `options` and return SVG markup.
    ///
    /// The markup's root `<svg>` element must be `options.size` pixels square.
    fn paint(&self, options: &RenderOptions) -> Result<String, EngineError>;
}

/// Built-in engine: encodes with `qrcodegen` and draws styled SVG.
#[derive(Debug, Clone, Copy, Default)]
pub struct NativeStyler;

impl StylingEngine for NativeStyler {
    fn paint(&self, options: &RenderOptions) -> Result<String, EngineError> {
        let qr = QrCode::encode_text(&options.data, options.ec_level.to_qrcodegen())
            .map_err(|e| EngineError(format!("cannot encode payload: {e}")))?;
        Ok(svg::draw(&Matrix::from_qr(&qr), options))
    }
}
