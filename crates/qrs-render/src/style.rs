//! Resolved style vocabulary for QR rendering.
//!
//! Public requests carry loose string tags (`"dots"`, `"extra-rounded"`,
//! `"jpg"`, ...). Each axis has one enum here; `parse` maps the public tag and
//! its aliases to a variant and returns `None` for anything else, leaving the
//! fallback decision to the normalizer.

use std::fmt;

/// Shape used for data modules.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BodyStyle {
    #[default]
    Square,
    Dots,
    Rounded,
    ExtraRounded,
    Classy,
    ClassyRounded,
}

impl BodyStyle {
    /// Parse a public body style tag.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match normalize_tag(s).as_str() {
            "square" | "squares" => Some(Self::Square),
            "dots" | "dot" | "circle" | "circles" => Some(Self::Dots),
            "rounded" | "round" => Some(Self::Rounded),
            "extra-rounded" => Some(Self::ExtraRounded),
            "classy" => Some(Self::Classy),
            "classy-rounded" => Some(Self::ClassyRounded),
            _ => None,
        }
    }

    /// Engine tag for this style.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Square => "square",
            Self::Dots => "dots",
            Self::Rounded => "rounded",
            Self::ExtraRounded => "extra-rounded",
            Self::Classy => "classy",
            Self::ClassyRounded => "classy-rounded",
        }
    }
}

/// Shape of the outer ring of each finder pattern.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EyeFrameStyle {
    #[default]
    Square,
    Dot,
    ExtraRounded,
}

impl EyeFrameStyle {
    /// Parse a public eye frame style tag.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match normalize_tag(s).as_str() {
            "square" => Some(Self::Square),
            "dot" | "dots" | "circle" => Some(Self::Dot),
            "extra-rounded" | "rounded" | "round" => Some(Self::ExtraRounded),
            _ => None,
        }
    }

    /// Engine tag for this style.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Square => "square",
            Self::Dot => "dot",
            Self::ExtraRounded => "extra-rounded",
        }
    }
}

/// Shape of the inner 3x3 block of each finder pattern.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EyeBallStyle {
    #[default]
    Square,
    Dot,
}

impl EyeBallStyle {
    /// Parse a public eye ball style tag.
    ///
    /// `rounded` has no dedicated shape and resolves to [`EyeBallStyle::Dot`].
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match normalize_tag(s).as_str() {
            "square" => Some(Self::Square),
            "dot" | "dots" | "circle" | "rounded" | "round" => Some(Self::Dot),
            _ => None,
        }
    }

    /// Engine tag for this style.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Square => "square",
            Self::Dot => "dot",
        }
    }
}

/// Output image format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    #[default]
    Svg,
    Png,
    Jpeg,
    Webp,
    Pdf,
}

impl OutputFormat {
    /// Parse a public format tag (`jpg` is accepted for JPEG).
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match normalize_tag(s).as_str() {
            "svg" => Some(Self::Svg),
            "png" => Some(Self::Png),
            "jpeg" | "jpg" => Some(Self::Jpeg),
            "webp" => Some(Self::Webp),
            "pdf" => Some(Self::Pdf),
            _ => None,
        }
    }

    /// Canonical tag for this format.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Svg => "svg",
            Self::Png => "png",
            Self::Jpeg => "jpeg",
            Self::Webp => "webp",
            Self::Pdf => "pdf",
        }
    }

    /// Whether the artifact is read from the painted raster surface.
    #[must_use]
    pub fn is_raster(self) -> bool {
        matches!(self, Self::Png | Self::Jpeg | Self::Webp)
    }
}

/// QR error-correction level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EcLevel {
    L,
    #[default]
    M,
    Q,
    H,
}

impl EcLevel {
    /// Parse a level letter (case-insensitive).
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "L" => Some(Self::L),
            "M" => Some(Self::M),
            "Q" => Some(Self::Q),
            "H" => Some(Self::H),
            _ => None,
        }
    }

    /// Level letter.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::L => "L",
            Self::M => "M",
            Self::Q => "Q",
            Self::H => "H",
        }
    }

    /// Share of codewords this level can restore.
    #[must_use]
    pub fn recovery(self) -> f64 {
        match self {
            Self::L => 0.07,
            Self::M => 0.15,
            Self::Q => 0.25,
            Self::H => 0.30,
        }
    }

    pub(crate) fn to_qrcodegen(self) -> qrcodegen::QrCodeEcc {
        match self {
            Self::L => qrcodegen::QrCodeEcc::Low,
            Self::M => qrcodegen::QrCodeEcc::Medium,
            Self::Q => qrcodegen::QrCodeEcc::Quartile,
            Self::H => qrcodegen::QrCodeEcc::High,
        }
    }
}

/// Resolved RGBA color.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Color {
    pub const BLACK: Self = Self::rgb(0, 0, 0);
    pub const WHITE: Self = Self::rgb(255, 255, 255);

    #[must_use]
    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b, a: 255 }
    }

    /// Parse a CSS-style color: `#rgb`, `#rgba`, `#rrggbb`, `#rrggbbaa`,
    /// or one of a small set of names.
    #[must_use]
    pub fn parse(text: &str) -> Option<Self> {
        let s = text.trim().to_ascii_lowercase();
        match s.as_str() {
            "transparent" => return Some(Self { a: 0, ..Self::BLACK }),
            "black" => return Some(Self::BLACK),
            "white" => return Some(Self::WHITE),
            "red" => return Some(Self::rgb(255, 0, 0)),
            "green" => return Some(Self::rgb(0, 128, 0)),
            "blue" => return Some(Self::rgb(0, 0, 255)),
            "gray" | "grey" => return Some(Self::rgb(128, 128, 128)),
            _ => {}
        }

        let hex = s.strip_prefix('#')?;
        if !hex.bytes().all(|b| b.is_ascii_hexdigit()) {
            return None;
        }
        let nibble = |i: usize| u8::from_str_radix(&hex[i..=i], 16).ok();
        let byte = |i: usize| u8::from_str_radix(&hex[i..i + 2], 16).ok();

        match hex.len() {
            3 | 4 => {
                let r = nibble(0)? * 17;
                let g = nibble(1)? * 17;
                let b = nibble(2)? * 17;
                let a = if hex.len() == 4 { nibble(3)? * 17 } else { 255 };
                Some(Self { r, g, b, a })
            }
            6 | 8 => {
                let a = if hex.len() == 8 { byte(6)? } else { 255 };
                Some(Self {
                    r: byte(0)?,
                    g: byte(2)?,
                    b: byte(4)?,
                    a,
                })
            }
            _ => None,
        }
    }

    /// `#rrggbb` form, alpha excluded.
    #[must_use]
    pub fn hex(self) -> String {
        format!("#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
    }

    /// Alpha as an opacity in `0.0..=1.0`.
    #[must_use]
    pub fn opacity(self) -> f32 {
        f32::from(self.a) / 255.0
    }

    #[must_use]
    pub fn is_opaque(self) -> bool {
        self.a == 255
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_opaque() {
            f.write_str(&self.hex())
        } else {
            write!(f, "{}{:02x}", self.hex(), self.a)
        }
    }
}

/// Lowercase, trim, and fold `_`/space separators into `-`.
fn normalize_tag(s: &str) -> String {
    s.trim()
        .to_ascii_lowercase()
        .replace(['_', ' '], "-")
}
