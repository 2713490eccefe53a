//! Batch orchestration.
//!
//! A batch shares one render context. Items run sequentially, in request
//! order, each on its own page. A failing item becomes an error entry and the
//! batch moves on; only failing to acquire the context fails the batch.

use serde::Serialize;

use crate::bridge::RenderingBridge;
use crate::consts::MAX_BATCH_ITEMS;
use crate::context::{ContextManager, RenderContext};
use crate::encode::EncodedImage;
use crate::error::{RenderError, ValidationError};
use crate::options::{BatchItem, RenderOptions, require_data};
use crate::renderer::render_on;

/// Outcome of one batch item.
#[derive(Debug)]
pub struct BatchEntry {
    pub name: String,
    /// Payload as received (empty when missing).
    pub data: String,
    pub outcome: Result<EncodedImage, RenderError>,
}

/// Per-item outcomes in request order.
#[derive(Debug, Default)]
pub struct BatchReport {
    pub entries: Vec<BatchEntry>,
}

impl BatchReport {
    #[must_use]
    pub fn total(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn succeeded(&self) -> usize {
        self.entries.iter().filter(|e| e.outcome.is_ok()).count()
    }

    #[must_use]
    pub fn failed(&self) -> usize {
        self.total() - self.succeeded()
    }

    /// JSON response body.
    #[must_use]
    pub fn to_response(&self) -> BulkResponse {
        let qr_codes = self
            .entries
            .iter()
            .map(|entry| match &entry.outcome {
                Ok(image) => BulkEntry::Rendered {
                    data: entry.data.clone(),
                    name: entry.name.clone(),
                    qr_code: image.data_uri(),
                    mime_type: image.mime_type,
                },
                Err(err) => BulkEntry::Failed {
                    data: entry.data.clone(),
                    name: entry.name.clone(),
                    error: err.code(),
                    details: err.to_string(),
                },
            })
            .collect();

        BulkResponse {
            success: true,
            total: self.total(),
            succeeded: self.succeeded(),
            failed: self.failed(),
            qr_codes,
        }
    }
}

/// Structured batch response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BulkResponse {
    pub success: bool,
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub qr_codes: Vec<BulkEntry>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum BulkEntry {
    Rendered {
        data: String,
        name: String,
        qr_code: String,
        mime_type: &'static str,
    },
    Failed {
        data: String,
        name: String,
        error: &'static str,
        details: String,
    },
}

/// Render every item with the shared style.
///
/// # Errors
///
/// Returns an error only when the batch cannot start: too many items, or the
/// render context fails to launch.
pub async fn generate_batch(
    contexts: &ContextManager,
    bridge: &RenderingBridge,
    items: &[BatchItem],
    shared: &RenderOptions,
) -> Result<BatchReport, RenderError> {
    if items.len() > MAX_BATCH_ITEMS {
        return Err(ValidationError::BatchTooLarge {
            count: items.len(),
            max: MAX_BATCH_ITEMS,
        }
        .into());
    }

    let mut context = contexts.acquire().await?;
    tracing::info!(context = %context.id(), items = items.len(), "Batch started");

    let mut report = BatchReport {
        entries: Vec::with_capacity(items.len()),
    };
    for (index, item) in items.iter().enumerate() {
        let name = item
            .name
            .clone()
            .filter(|n| !n.is_empty())
            .unwrap_or_else(|| format!("qr-{}", index + 1));
        let data = item
            .data
            .as_ref()
            .map(|d| d.as_text().into_owned())
            .unwrap_or_default();

        let outcome = render_item(&mut context, bridge, item, shared).await;
        if let Err(err) = &outcome {
            tracing::warn!(item = %name, error = %err, "Batch item failed");
        }
        report.entries.push(BatchEntry {
            name,
            data,
            outcome,
        });
    }

    tracing::info!(
        context = %context.id(),
        succeeded = report.succeeded(),
        failed = report.failed(),
        "Batch finished"
    );
    contexts.release(context);
    Ok(report)
}

async fn render_item(
    context: &mut RenderContext,
    bridge: &RenderingBridge,
    item: &BatchItem,
    shared: &RenderOptions,
) -> Result<EncodedImage, RenderError> {
    let data = require_data(item.data.as_ref())?;
    render_on(context, bridge, &shared.with_data(data)).await
}
