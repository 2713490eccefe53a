//! Styled QR code rendering.
//!
//! This crate turns loosely-typed generation requests into encoded images:
//! - Option normalization with lenient per-field fallbacks
//! - Render contexts with guaranteed release and observable live counts
//! - A rendering bridge that drives a [`StylingEngine`] under a deadline
//! - SVG, PNG, JPEG, WebP and PDF output, as data URIs or raw bytes
//! - Batch rendering that shares one context and survives per-item failures
//!
//! # Architecture
//!
//! - [`options`]: Request types and normalization into [`RenderOptions`]
//! - [`context`]: `ContextManager`, `RenderContext` and `RenderPage`
//! - [`engine`]: `StylingEngine` trait and the native `qrcodegen` engine
//! - [`bridge`]: Deadline-bounded rendering and artifact extraction
//! - [`encode`]: MIME mapping and the JSON envelope
//! - [`batch`]: Sequential batch orchestration
//!
//! # Example
//!
//! ```ignore
//! use qrs_render::{GenerationRequest, QrRenderer, normalize};
//!
//! let request = GenerationRequest::from_json(body)?;
//! let options = normalize(&request)?;
//! let image = QrRenderer::default().generate(&options).await?;
//! println!("{}", image.data_uri());
//! ```

pub mod batch;
pub mod bridge;
mod consts;
pub mod context;
pub mod encode;
pub mod engine;
mod error;
pub mod options;
mod raster;
mod renderer;
mod style;
mod svg;

pub use batch::{BatchReport, BulkResponse, generate_batch};
pub use bridge::{RenderedArtifact, RenderingBridge};
pub use consts::{DEFAULT_TIMEOUT, MAX_BATCH_ITEMS, MAX_SIZE};
pub use context::{ContextConfig, ContextManager, RenderContext, RenderPage};
pub use encode::{EncodedImage, ImageEnvelope, encode, mime_type};
pub use engine::{EngineError, NativeStyler, StylingEngine};
pub use error::{RenderError, ValidationError};
pub use options::{
    BatchItem, BulkRequest, GenerationRequest, RenderOptions, normalize, normalize_batch,
};
pub use renderer::QrRenderer;
pub use style::{BodyStyle, Color, EcLevel, EyeBallStyle, EyeFrameStyle, OutputFormat};
