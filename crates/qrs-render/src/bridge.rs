//! Rendering bridge between async callers and the styling engine.
//!
//! One render is:
//!
//! 1. Inject the options into a fresh [`RenderPage`].
//! 2. Run the engine on the blocking pool. For raster formats the markup is
//!    also painted onto a viewport-sized surface there.
//! 3. Wait for the worker's completion signal, bounded by the deadline.
//! 4. Extract the artifact for the requested format from the page.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::oneshot;
use usvg::fontdb::Database;

use crate::consts::DEFAULT_TIMEOUT;
use crate::context::{PageDocument, RenderPage};
use crate::engine::{NativeStyler, StylingEngine};
use crate::error::RenderError;
use crate::options::RenderOptions;
use crate::raster;
use crate::style::OutputFormat;

/// Raw output of one render.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedArtifact {
    pub format: OutputFormat,
    /// SVG markup (UTF-8) or encoded binary image.
    pub bytes: Vec<u8>,
}

impl RenderedArtifact {
    /// Markup text for SVG artifacts.
    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        match self.format {
            OutputFormat::Svg => std::str::from_utf8(&self.bytes).ok(),
            _ => None,
        }
    }
}

/// Drives a [`StylingEngine`] with a deadline.
#[derive(Clone)]
pub struct RenderingBridge {
    engine: Arc<dyn StylingEngine>,
    timeout: Duration,
}

impl Default for RenderingBridge {
    fn default() -> Self {
        Self::new(Arc::new(NativeStyler))
    }
}

impl std::fmt::Debug for RenderingBridge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RenderingBridge")
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

impl RenderingBridge {
    #[must_use]
    pub fn new(engine: Arc<dyn StylingEngine>) -> Self {
        Self {
            engine,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Set the completion deadline.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    #[must_use]
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Render `options` on `page` and extract the artifact.
    ///
    /// # Errors
    ///
    /// - [`RenderError::RenderTimeout`] if the engine does not signal completion
    ///   before the deadline.
    /// - [`RenderError::Engine`] if the engine rejects the options.
    /// - [`RenderError::RenderExtraction`] if the page holds no usable output.
    pub async fn render(
        &self,
        page: &mut RenderPage<'_>,
        options: &RenderOptions,
    ) -> Result<RenderedArtifact, RenderError> {
        page.begin()?;

        let (done, signal) = oneshot::channel();
        let engine = Arc::clone(&self.engine);
        let job = options.clone();
        let viewport = page.viewport();
        let fontdb = page.fontdb();
        let slot = page.slot();
        tokio::task::spawn_blocking(move || {
            let painted = paint(engine.as_ref(), &job, viewport, fontdb);
            // Slot goes back before the signal so a finished render never
            // looks live to the caller
            drop(slot);
            // Receiver is gone after a timeout; nothing left to report to
            let _ = done.send(painted);
        });

        let painted = match tokio::time::timeout(self.timeout, signal).await {
            Ok(Ok(painted)) => painted?,
            Ok(Err(_)) => {
                page.abandon();
                return Err(RenderError::extraction(
                    options.format.as_str(),
                    "engine stopped without signalling completion",
                ));
            }
            Err(_) => {
                page.abandon();
                tracing::warn!(
                    context = %page.context_id(),
                    page = page.index(),
                    timeout_ms = self.timeout.as_millis(),
                    "Render deadline passed"
                );
                return Err(RenderError::RenderTimeout(self.timeout));
            }
        };

        page.commit(painted);
        extract(page, options)
    }
}

/// Worker half of a render: engine call plus optional surface painting.
fn paint(
    engine: &dyn StylingEngine,
    options: &RenderOptions,
    viewport: u32,
    fontdb: Arc<Database>,
) -> Result<PageDocument, RenderError> {
    let markup = engine
        .paint(options)
        .map_err(|e| RenderError::Engine(e.to_string()))?;

    let (surface, surface_error) = if options.format.is_raster() && svg_element(&markup).is_some() {
        match raster::paint_surface(&markup, viewport, fontdb) {
            Ok(surface) => (Some(surface), None),
            Err(e) => (None, Some(e.to_string())),
        }
    } else {
        (None, None)
    };

    Ok(PageDocument {
        markup,
        surface,
        surface_error,
    })
}

/// The root `<svg>` element within `markup`, if any.
fn svg_element(markup: &str) -> Option<&str> {
    let start = markup.find("<svg")?;
    let end = markup.rfind("</svg>")? + "</svg>".len();
    (end > start).then(|| &markup[start..end])
}

/// Read the artifact for `options.format` off a painted page.
fn extract(page: &RenderPage<'_>, options: &RenderOptions) -> Result<RenderedArtifact, RenderError> {
    let format = options.format;
    let name = format.as_str();
    let document = page
        .document()
        .ok_or_else(|| RenderError::extraction(name, "page holds no document"))?;

    let bytes = match format {
        OutputFormat::Svg => svg_element(&document.markup)
            .ok_or_else(|| RenderError::extraction(name, "no <svg> element on page"))?
            .as_bytes()
            .to_vec(),
        OutputFormat::Pdf => {
            let element = svg_element(&document.markup)
                .ok_or_else(|| RenderError::extraction(name, "no <svg> element on page"))?;
            raster::svg_to_pdf(element).map_err(|e| RenderError::extraction(name, e.to_string()))?
        }
        OutputFormat::Png | OutputFormat::Jpeg | OutputFormat::Webp => {
            let surface = document.surface.as_ref().ok_or_else(|| {
                let reason = document
                    .surface_error
                    .clone()
                    .unwrap_or_else(|| "no painted surface on page".to_owned());
                RenderError::extraction(name, reason)
            })?;
            let element = raster::crop(surface, options.size)
                .map_err(|e| RenderError::extraction(name, e.to_string()))?;
            let encoded = match format {
                OutputFormat::Png => raster::encode_png(&element),
                OutputFormat::Jpeg => raster::encode_jpeg(&element),
                _ => raster::encode_webp(&element),
            };
            encoded.map_err(|e| RenderError::extraction(name, e.to_string()))?
        }
    };

    Ok(RenderedArtifact { format, bytes })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::ContextManager;
    use crate::engine::EngineError;

    struct Blank;

    impl StylingEngine for Blank {
        fn paint(&self, _: &RenderOptions) -> Result<String, EngineError> {
            Ok(String::new())
        }
    }

    struct Slow(Duration);

    impl StylingEngine for Slow {
        fn paint(&self, options: &RenderOptions) -> Result<String, EngineError> {
            std::thread::sleep(self.0);
            NativeStyler.paint(options)
        }
    }

    struct Rejecting;

    impl StylingEngine for Rejecting {
        fn paint(&self, _: &RenderOptions) -> Result<String, EngineError> {
            Err(EngineError("unsupported".to_owned()))
        }
    }

    struct Panicking;

    impl StylingEngine for Panicking {
        fn paint(&self, _: &RenderOptions) -> Result<String, EngineError> {
            panic!("engine crashed")
        }
    }

    fn options(format: OutputFormat) -> RenderOptions {
        RenderOptions {
            size: 120,
            viewport: 220,
            format,
            ..RenderOptions::default().with_data("bridge test")
        }
    }

    async fn render_with(
        bridge: &RenderingBridge,
        options: &RenderOptions,
    ) -> Result<RenderedArtifact, RenderError> {
        let manager = ContextManager::default();
        let mut context = manager.acquire().await.unwrap();
        let mut page = context.new_page(options.viewport).unwrap();
        let result = bridge.render(&mut page, options).await;
        page.close();
        result
    }

    #[tokio::test]
    async fn test_svg_artifact() {
        let artifact = render_with(&RenderingBridge::default(), &options(OutputFormat::Svg))
            .await
            .unwrap();

        assert_eq!(artifact.format, OutputFormat::Svg);
        let text = artifact.as_text().unwrap();
        assert!(text.starts_with("<svg"));
        assert!(text.contains(r#"width="120""#));
    }

    #[tokio::test]
    async fn test_png_is_cropped_to_size() {
        let artifact = render_with(&RenderingBridge::default(), &options(OutputFormat::Png))
            .await
            .unwrap();

        let decoded = image::load_from_memory(&artifact.bytes).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (120, 120));
        assert!(artifact.as_text().is_none());
    }

    #[tokio::test]
    async fn test_raster_formats() {
        let bridge = RenderingBridge::default();

        let jpeg = render_with(&bridge, &options(OutputFormat::Jpeg)).await.unwrap();
        assert_eq!(&jpeg.bytes[..2], &[0xFF, 0xD8]);

        let webp = render_with(&bridge, &options(OutputFormat::Webp)).await.unwrap();
        assert_eq!(&webp.bytes[8..12], b"WEBP");

        let pdf = render_with(&bridge, &options(OutputFormat::Pdf)).await.unwrap();
        assert!(pdf.bytes.starts_with(b"%PDF-"));
    }

    #[tokio::test]
    async fn test_timeout() {
        let bridge = RenderingBridge::new(Arc::new(Slow(Duration::from_millis(500))))
            .with_timeout(Duration::from_millis(50));

        let err = render_with(&bridge, &options(OutputFormat::Svg))
            .await
            .unwrap_err();
        assert!(matches!(err, RenderError::RenderTimeout(d) if d == Duration::from_millis(50)));
    }

    #[tokio::test]
    async fn test_missing_output_is_extraction_error() {
        let bridge = RenderingBridge::new(Arc::new(Blank));

        for format in [OutputFormat::Svg, OutputFormat::Png, OutputFormat::Pdf] {
            let err = render_with(&bridge, &options(format)).await.unwrap_err();
            assert!(
                matches!(err, RenderError::RenderExtraction { .. }),
                "{format:?}: {err}"
            );
        }
    }

    #[tokio::test]
    async fn test_engine_rejection() {
        let bridge = RenderingBridge::new(Arc::new(Rejecting));
        let err = render_with(&bridge, &options(OutputFormat::Png))
            .await
            .unwrap_err();
        assert!(matches!(err, RenderError::Engine(ref m) if m == "unsupported"));
    }

    #[tokio::test]
    async fn test_engine_crash_is_reported() {
        let bridge = RenderingBridge::new(Arc::new(Panicking));
        let err = render_with(&bridge, &options(OutputFormat::Svg))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("without signalling completion"));
    }

    #[tokio::test]
    async fn test_page_is_single_use() {
        let bridge = RenderingBridge::default();
        let opts = options(OutputFormat::Svg);
        let manager = ContextManager::default();
        let mut context = manager.acquire().await.unwrap();
        let mut page = context.new_page(opts.viewport).unwrap();

        bridge.render(&mut page, &opts).await.unwrap();
        assert!(bridge.render(&mut page, &opts).await.is_err());
    }

    #[test]
    fn test_svg_element_bounds() {
        assert_eq!(
            svg_element("<div><svg a=\"1\"></svg></div>"),
            Some("<svg a=\"1\"></svg>")
        );
        assert_eq!(svg_element("<div></div>"), None);
        assert_eq!(svg_element("</svg><svg"), None);
    }
}
