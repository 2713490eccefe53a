//! Render context lifecycle.
//!
//! A [`RenderContext`] is one running rendering environment: it owns the font
//! database the rasterizer resolves text against and a slot in the manager's
//! live-context count. Each item is painted on its own [`RenderPage`], which
//! mutably borrows the context, so a context never hosts two renders at once.
//!
//! Contexts are released exactly once: explicitly through
//! [`ContextManager::release`] / [`RenderContext::release`], or by `Drop` on
//! any early-return path. A blocking paint worker holds a share of the
//! context's slot, so a context whose render timed out keeps counting against
//! the limit until its worker actually stops.

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

use tiny_skia::Pixmap;
use usvg::fontdb::Database;
use uuid::Uuid;

use crate::error::RenderError;

/// Settings applied to every context the manager launches.
#[derive(Debug, Clone)]
pub struct ContextConfig {
    /// Directory of engine resources (fonts) loaded into each context.
    pub resources_dir: Option<PathBuf>,
    /// Load system fonts into each context.
    pub system_fonts: bool,
    /// Maximum number of simultaneously live contexts.
    pub max_live_contexts: usize,
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            resources_dir: None,
            system_fonts: false,
            max_live_contexts: 32,
        }
    }
}

/// Launches and tracks render contexts.
///
/// Cheap to share behind an `Arc`; holds no per-request state.
#[derive(Debug, Default)]
pub struct ContextManager {
    config: ContextConfig,
    live: Arc<AtomicUsize>,
    launched: AtomicU64,
}

impl ContextManager {
    #[must_use]
    pub fn new(config: ContextConfig) -> Self {
        Self {
            config,
            live: Arc::new(AtomicUsize::new(0)),
            launched: AtomicU64::new(0),
        }
    }

    /// Start a new rendering context.
    ///
    /// # Errors
    ///
    /// Returns [`RenderError::ProcessLaunch`] when the live-context limit is
    /// reached or the configured resources cannot be loaded. The reserved slot
    /// is already returned when the error is surfaced.
    pub async fn acquire(&self) -> Result<RenderContext, RenderError> {
        let slot = LiveSlot::reserve(&self.live);
        if slot.previous >= self.config.max_live_contexts {
            return Err(RenderError::ProcessLaunch(format!(
                "live context limit reached ({})",
                self.config.max_live_contexts
            )));
        }

        let resources_dir = self.config.resources_dir.clone();
        let system_fonts = self.config.system_fonts;
        let fontdb = tokio::task::spawn_blocking(move || {
            load_font_database(resources_dir.as_ref(), system_fonts)
        })
        .await
        .map_err(|e| RenderError::ProcessLaunch(e.to_string()))??;

        self.launched.fetch_add(1, Ordering::Relaxed);
        let id = Uuid::new_v4();
        tracing::debug!(context = %id, fonts = fontdb.len(), "Render context launched");

        Ok(RenderContext {
            id,
            fontdb: Arc::new(fontdb),
            slot: Some(Arc::new(slot)),
            pages_opened: 0,
        })
    }

    /// Tear down a context. Safe on contexts that were already released.
    pub fn release(&self, mut context: RenderContext) {
        context.release();
    }

    /// Number of contexts currently alive.
    #[must_use]
    pub fn live_contexts(&self) -> usize {
        self.live.load(Ordering::SeqCst)
    }

    /// Number of contexts successfully launched since startup.
    #[must_use]
    pub fn launched_total(&self) -> u64 {
        self.launched.load(Ordering::Relaxed)
    }
}

/// Build the font database for one context.
fn load_font_database(
    resources_dir: Option<&PathBuf>,
    system_fonts: bool,
) -> Result<Database, RenderError> {
    let mut db = Database::new();

    if let Some(dir) = resources_dir {
        if !dir.is_dir() {
            return Err(RenderError::ProcessLaunch(format!(
                "render resources directory not found: {}",
                dir.display()
            )));
        }
        db.load_fonts_dir(dir);
    }
    if system_fonts {
        db.load_system_fonts();
    }

    Ok(db)
}

/// A counted slot in the live-context total. Returned on drop.
#[derive(Debug)]
pub(crate) struct LiveSlot {
    live: Arc<AtomicUsize>,
    previous: usize,
}

impl LiveSlot {
    fn reserve(live: &Arc<AtomicUsize>) -> Self {
        let previous = live.fetch_add(1, Ordering::SeqCst);
        Self {
            live: Arc::clone(live),
            previous,
        }
    }
}

impl Drop for LiveSlot {
    fn drop(&mut self) {
        self.live.fetch_sub(1, Ordering::SeqCst);
    }
}

/// One running rendering environment.
#[derive(Debug)]
pub struct RenderContext {
    id: Uuid,
    fontdb: Arc<Database>,
    slot: Option<Arc<LiveSlot>>,
    pages_opened: usize,
}

impl RenderContext {
    #[must_use]
    pub fn id(&self) -> Uuid {
        self.id
    }

    #[must_use]
    pub fn is_released(&self) -> bool {
        self.slot.is_none()
    }

    /// Number of pages opened on this context so far.
    #[must_use]
    pub fn pages_opened(&self) -> usize {
        self.pages_opened
    }

    /// Open a fresh page with a square viewport of `viewport` pixels.
    ///
    /// # Errors
    ///
    /// Returns [`RenderError::ProcessLaunch`] if the context was released.
    pub fn new_page(&mut self, viewport: u32) -> Result<RenderPage<'_>, RenderError> {
        if self.is_released() {
            return Err(RenderError::ProcessLaunch(format!(
                "render context {} already released",
                self.id
            )));
        }
        self.pages_opened += 1;
        let index = self.pages_opened;
        tracing::debug!(context = %self.id, page = index, viewport, "Page opened");

        Ok(RenderPage {
            context: self,
            index,
            viewport,
            state: PageState::Blank,
        })
    }

    /// Tear down this context. Subsequent calls are no-ops.
    pub fn release(&mut self) {
        if let Some(slot) = self.slot.take() {
            tracing::debug!(
                context = %self.id,
                pages = self.pages_opened,
                "Render context released"
            );
            drop(slot);
        }
    }
}

impl Drop for RenderContext {
    fn drop(&mut self) {
        self.release();
    }
}

/// What the page currently holds.
#[derive(Debug)]
pub(crate) enum PageState {
    /// Nothing injected yet.
    Blank,
    /// Configuration injected, waiting for the engine.
    Loading,
    /// The engine finished painting.
    Painted(PageDocument),
    /// The render was abandoned (deadline passed).
    Abandoned,
}

/// Output left on a page by the styling engine.
#[derive(Debug)]
pub(crate) struct PageDocument {
    /// Vector markup produced by the engine.
    pub(crate) markup: String,
    /// Raster surface of the full viewport, when one was painted.
    pub(crate) surface: Option<Pixmap>,
    /// Why no surface is present, if painting was attempted.
    pub(crate) surface_error: Option<String>,
}

/// Per-item isolation unit inside a [`RenderContext`].
#[derive(Debug)]
pub struct RenderPage<'ctx> {
    context: &'ctx mut RenderContext,
    index: usize,
    viewport: u32,
    state: PageState,
}

impl RenderPage<'_> {
    #[must_use]
    pub fn viewport(&self) -> u32 {
        self.viewport
    }

    /// One-based index of this page within its context.
    #[must_use]
    pub fn index(&self) -> usize {
        self.index
    }

    pub(crate) fn fontdb(&self) -> Arc<Database> {
        Arc::clone(&self.context.fontdb)
    }

    /// Share of the context's live slot for a worker painting this page.
    pub(crate) fn slot(&self) -> Option<Arc<LiveSlot>> {
        self.context.slot.as_ref().map(Arc::clone)
    }

    pub(crate) fn context_id(&self) -> Uuid {
        self.context.id
    }

    /// Mark the configuration as injected.
    ///
    /// Pages are single-use: a page that already rendered is rejected.
    pub(crate) fn begin(&mut self) -> Result<(), RenderError> {
        match self.state {
            PageState::Blank => {
                self.state = PageState::Loading;
                Ok(())
            }
            _ => Err(RenderError::Engine(format!(
                "page {} of context {} was already used",
                self.index, self.context.id
            ))),
        }
    }

    pub(crate) fn commit(&mut self, document: PageDocument) {
        self.state = PageState::Painted(document);
    }

    pub(crate) fn abandon(&mut self) {
        self.state = PageState::Abandoned;
    }

    pub(crate) fn document(&self) -> Option<&PageDocument> {
        match &self.state {
            PageState::Painted(document) => Some(document),
            _ => None,
        }
    }

    /// Close the page, discarding anything painted on it.
    pub fn close(self) {
        tracing::debug!(context = %self.context.id, page = self.index, "Page closed");
    }
}
