//! Internal constants for QR rendering.

use std::time::Duration;

/// Default rendered image edge in pixels.
pub const DEFAULT_SIZE: u32 = 300;

/// Largest accepted image edge in pixels.
pub const MAX_SIZE: u32 = 4096;

/// Extra viewport space around the rendered code (pixels).
///
/// The page surface is `size + VIEWPORT_MARGIN` on each axis; the produced
/// image itself is cropped back to `size`.
pub const VIEWPORT_MARGIN: u32 = 100;

/// Default render deadline (10 seconds).
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Maximum number of items accepted in a single batch.
pub const MAX_BATCH_ITEMS: usize = 50;

/// Default logo edge as a fraction of the image size.
pub const DEFAULT_LOGO_SIZE: f32 = 0.4;

/// Part of the error correction capacity a logo may spend on hidden modules.
///
/// A logo hides at most `LOGO_RECOVERY_SHARE * recovery * count²` modules,
/// where `recovery` is the level's restorable share and `count` the modules
/// per side.
pub const LOGO_RECOVERY_SHARE: f64 = 0.4;

/// JPEG encoder quality.
pub const JPEG_QUALITY: u8 = 90;

/// Foreground color used when the request color is missing or invalid.
pub const DEFAULT_COLOR: &str = "#000000";

/// Background color used when the request color is missing or invalid.
pub const DEFAULT_BG_COLOR: &str = "#ffffff";
