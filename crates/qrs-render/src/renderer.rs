//! Single-image render pipeline.

use crate::batch::{self, BatchReport};
use crate::bridge::RenderingBridge;
use crate::context::{ContextManager, RenderContext};
use crate::encode::{EncodedImage, encode};
use crate::error::RenderError;
use crate::options::{BatchItem, RenderOptions};

/// Context manager and bridge wired into one pipeline.
///
/// Share behind an `Arc`; every call acquires and releases its own context.
#[derive(Debug, Default)]
pub struct QrRenderer {
    contexts: ContextManager,
    bridge: RenderingBridge,
}

impl QrRenderer {
    #[must_use]
    pub fn new(contexts: ContextManager, bridge: RenderingBridge) -> Self {
        Self { contexts, bridge }
    }

    #[must_use]
    pub fn contexts(&self) -> &ContextManager {
        &self.contexts
    }

    #[must_use]
    pub fn bridge(&self) -> &RenderingBridge {
        &self.bridge
    }

    /// Render one image in a dedicated context.
    ///
    /// The context is released whether or not the render succeeds.
    pub async fn generate(&self, options: &RenderOptions) -> Result<EncodedImage, RenderError> {
        let mut context = self.contexts.acquire().await?;
        let result = render_on(&mut context, &self.bridge, options).await;
        self.contexts.release(context);
        result
    }

    /// Render a batch in one shared context.
    pub async fn generate_batch(
        &self,
        items: &[BatchItem],
        shared: &RenderOptions,
    ) -> Result<BatchReport, RenderError> {
        batch::generate_batch(&self.contexts, &self.bridge, items, shared).await
    }
}

/// Render `options` on a fresh page of `context` and encode the result.
pub(crate) async fn render_on(
    context: &mut RenderContext,
    bridge: &RenderingBridge,
    options: &RenderOptions,
) -> Result<EncodedImage, RenderError> {
    let mut page = context.new_page(options.viewport)?;
    let artifact = bridge.render(&mut page, options).await;
    page.close();
    encode(artifact?, options.format.as_str())
}
