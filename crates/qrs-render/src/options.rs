//! Request normalization.
//!
//! Turns a loosely-typed [`GenerationRequest`] into a fully resolved
//! [`RenderOptions`]. Only a missing payload is an error; every other field
//! falls back to its default when absent or unrecognized, and the field name
//! is recorded in [`RenderOptions::fallbacks`] so callers can log it. A logo
//! that would hide more modules than the error correction level can restore
//! is shrunk once the payload is known, and recorded the same way.

use std::borrow::Cow;

use qrcodegen::QrCode;
use serde::Deserialize;
use serde_json::Value;

use crate::consts::{
    DEFAULT_BG_COLOR, DEFAULT_COLOR, DEFAULT_LOGO_SIZE, DEFAULT_SIZE, MAX_BATCH_ITEMS, MAX_SIZE,
    VIEWPORT_MARGIN,
};
use crate::error::ValidationError;
use crate::svg::{self, Matrix};
use crate::style::{BodyStyle, Color, EcLevel, EyeBallStyle, EyeFrameStyle, OutputFormat};

/// A JSON scalar accepted where a string or number is expected.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum Loose {
    Bool(bool),
    Number(f64),
    Text(String),
}

impl Loose {
    /// Textual form; whole numbers print without a fraction.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn as_text(&self) -> Cow<'_, str> {
        match self {
            Self::Text(s) => Cow::Borrowed(s),
            Self::Bool(b) => Cow::Owned(b.to_string()),
            Self::Number(n) if n.fract() == 0.0 && n.abs() < 1e15 => {
                Cow::Owned((*n as i64).to_string())
            }
            Self::Number(n) => Cow::Owned(n.to_string()),
        }
    }

    /// Numeric form, parsing numeric strings.
    #[must_use]
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Number(n) => Some(*n),
            Self::Text(s) => s.trim().parse().ok(),
            Self::Bool(_) => None,
        }
    }
}

impl From<&str> for Loose {
    fn from(s: &str) -> Self {
        Self::Text(s.to_owned())
    }
}

impl From<u32> for Loose {
    fn from(n: u32) -> Self {
        Self::Number(f64::from(n))
    }
}

/// Style fields shared by single and batch requests.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct StyleFields {
    pub size: Option<Loose>,
    pub color: Option<Loose>,
    pub bg_color: Option<Loose>,
    pub body_style: Option<Loose>,
    pub eye_frame_style: Option<Loose>,
    pub eye_ball_style: Option<Loose>,
    pub format: Option<Loose>,
    /// Alternate spelling of `format`.
    #[serde(rename = "type")]
    pub kind: Option<Loose>,
    pub error_correction_level: Option<Loose>,
    /// Quiet zone inside the image, in pixels.
    pub margin: Option<Loose>,
    /// Logo as a `data:image/...` URI.
    pub logo: Option<Loose>,
    /// Logo edge as a fraction of the image size.
    pub logo_size: Option<Loose>,
}

/// Public single-image request.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct GenerationRequest {
    pub data: Option<Loose>,
    #[serde(flatten)]
    pub style: StyleFields,
}

impl GenerationRequest {
    /// Build a request from a JSON body.
    ///
    /// Accepts both the flat shape and `{"options": {...}}`.
    pub fn from_json(mut body: Value) -> Result<Self, serde_json::Error> {
        if let Some(inner) = body.get_mut("options").filter(|o| o.is_object()) {
            let inner = inner.take();
            body = inner;
        }
        serde_json::from_value(body)
    }
}

/// One entry of a batch request.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct BatchItem {
    pub data: Option<Loose>,
    pub name: Option<String>,
}

impl BatchItem {
    #[must_use]
    pub fn new(data: &str) -> Self {
        Self {
            data: Some(Loose::from(data)),
            name: None,
        }
    }
}

/// Public batch request.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct BulkRequest {
    pub items: Option<Vec<BatchItem>>,
    #[serde(flatten)]
    pub style: StyleFields,
}

/// Logo overlay descriptor.
#[derive(Debug, Clone, PartialEq)]
pub struct Logo {
    /// `data:` URI of the image.
    pub href: String,
    /// Edge as a fraction of the image size, in `(0, 1]`.
    pub size: f32,
}

/// Fully resolved rendering configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderOptions {
    /// Encoded payload.
    pub data: String,
    /// Image edge in pixels.
    pub size: u32,
    /// Page surface edge in pixels (`size` plus the fixed viewport margin).
    pub viewport: u32,
    /// Quiet zone inside the image, in pixels.
    pub margin: u32,
    pub color: Color,
    pub bg_color: Color,
    pub body_style: BodyStyle,
    pub eye_frame_style: EyeFrameStyle,
    pub eye_ball_style: EyeBallStyle,
    pub format: OutputFormat,
    pub ec_level: EcLevel,
    pub logo: Option<Logo>,
    /// Request fields that fell back to defaults or were shrunk to fit.
    pub fallbacks: Vec<&'static str>,
}

impl RenderOptions {
    /// Copy of these options for a different payload.
    ///
    /// A logo too large for the payload's code is shrunk until the modules it
    /// hides are recoverable, or dropped when none fits. Either case is
    /// recorded in `fallbacks`.
    #[must_use]
    pub fn with_data(&self, data: impl Into<String>) -> Self {
        let mut options = Self {
            data: data.into(),
            ..self.clone()
        };
        options.fit_logo();
        options
    }

    fn fit_logo(&mut self) {
        let Some(requested) = self.logo.as_ref().map(|logo| logo.size) else {
            return;
        };
        // Unencodable payloads fail later in the engine
        let Ok(qr) = QrCode::encode_text(&self.data, self.ec_level.to_qrcodegen()) else {
            return;
        };
        match svg::fitted_logo_size(&Matrix::from_qr(&qr), self) {
            Some(fitted) if requested - fitted > 1e-6 => {
                if let Some(logo) = self.logo.as_mut() {
                    logo.size = fitted;
                }
                self.fallbacks.push("logoSize");
            }
            Some(_) => {}
            None => {
                self.logo = None;
                self.fallbacks.push("logo");
            }
        }
    }
}

impl Default for RenderOptions {
    fn default() -> Self {
        normalize_style(&StyleFields::default())
    }
}

/// Normalize a single-image request.
///
/// # Errors
///
/// Returns [`ValidationError::MissingData`] when `data` is absent or empty.
pub fn normalize(request: &GenerationRequest) -> Result<RenderOptions, ValidationError> {
    let data = require_data(request.data.as_ref())?;
    Ok(normalize_style(&request.style).with_data(data))
}

/// Validate a batch request and resolve its shared style.
///
/// Item payloads are not checked here: an empty item becomes an error entry
/// in the batch result rather than rejecting the whole batch.
///
/// # Errors
///
/// Returns a [`ValidationError`] when `items` is missing, empty, or longer
/// than [`MAX_BATCH_ITEMS`].
pub fn normalize_batch(request: &BulkRequest) -> Result<RenderOptions, ValidationError> {
    let items = request
        .items
        .as_ref()
        .ok_or(ValidationError::MissingItems)?;
    if items.is_empty() {
        return Err(ValidationError::EmptyBatch);
    }
    if items.len() > MAX_BATCH_ITEMS {
        return Err(ValidationError::BatchTooLarge {
            count: items.len(),
            max: MAX_BATCH_ITEMS,
        });
    }
    Ok(normalize_style(&request.style))
}

/// Extract a non-empty payload.
pub(crate) fn require_data(data: Option<&Loose>) -> Result<String, ValidationError> {
    match data.map(Loose::as_text) {
        Some(text) if !text.is_empty() => Ok(text.into_owned()),
        _ => Err(ValidationError::MissingData),
    }
}

/// Resolve every style field, leaving `data` empty.
#[must_use]
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn normalize_style(style: &StyleFields) -> RenderOptions {
    let mut fallbacks = Vec::new();

    let size = resolve(&mut fallbacks, "size", style.size.as_ref(), DEFAULT_SIZE, |v| {
        let n = v.as_f64()?;
        (n.is_finite() && n >= 1.0).then(|| n.round().min(f64::from(MAX_SIZE)) as u32)
    });

    let margin = resolve(&mut fallbacks, "margin", style.margin.as_ref(), 0, |v| {
        let n = v.as_f64()?;
        let px = (n.is_finite() && n >= 0.0).then(|| n.round() as u32)?;
        (px.saturating_mul(2) < size).then_some(px)
    });

    let default_color = Color::parse(DEFAULT_COLOR).unwrap_or(Color::BLACK);
    let default_bg = Color::parse(DEFAULT_BG_COLOR).unwrap_or(Color::WHITE);
    let color = resolve(&mut fallbacks, "color", style.color.as_ref(), default_color, |v| {
        Color::parse(&v.as_text())
    });
    let bg_color = resolve(&mut fallbacks, "bgColor", style.bg_color.as_ref(), default_bg, |v| {
        Color::parse(&v.as_text())
    });

    let body_style = resolve(
        &mut fallbacks,
        "bodyStyle",
        style.body_style.as_ref(),
        BodyStyle::default(),
        |v| BodyStyle::parse(&v.as_text()),
    );
    let eye_frame_style = resolve(
        &mut fallbacks,
        "eyeFrameStyle",
        style.eye_frame_style.as_ref(),
        EyeFrameStyle::default(),
        |v| EyeFrameStyle::parse(&v.as_text()),
    );
    let eye_ball_style = resolve(
        &mut fallbacks,
        "eyeBallStyle",
        style.eye_ball_style.as_ref(),
        EyeBallStyle::default(),
        |v| EyeBallStyle::parse(&v.as_text()),
    );

    let format = resolve(
        &mut fallbacks,
        "format",
        style.format.as_ref().or(style.kind.as_ref()),
        OutputFormat::default(),
        |v| OutputFormat::parse(&v.as_text()),
    );
    let ec_level = resolve(
        &mut fallbacks,
        "errorCorrectionLevel",
        style.error_correction_level.as_ref(),
        EcLevel::default(),
        |v| EcLevel::parse(&v.as_text()),
    );

    let logo_size = resolve(
        &mut fallbacks,
        "logoSize",
        style.logo_size.as_ref(),
        DEFAULT_LOGO_SIZE,
        |v| {
            let n = v.as_f64()? as f32;
            (n > 0.0 && n <= 1.0).then_some(n)
        },
    );
    let logo = resolve(&mut fallbacks, "logo", style.logo.as_ref(), None, |v| {
        let href = v.as_text();
        href.starts_with("data:image/").then(|| {
            Some(Logo {
                href: href.into_owned(),
                size: logo_size,
            })
        })
    });

    RenderOptions {
        data: String::new(),
        size,
        viewport: size + VIEWPORT_MARGIN,
        margin,
        color,
        bg_color,
        body_style,
        eye_frame_style,
        eye_ball_style,
        format,
        ec_level,
        logo,
        fallbacks,
    }
}

/// Resolve one optional field. Absent fields take `default` silently;
/// present but unparsable fields take `default` and are recorded.
fn resolve<T>(
    fallbacks: &mut Vec<&'static str>,
    field: &'static str,
    value: Option<&Loose>,
    default: T,
    parse: impl FnOnce(&Loose) -> Option<T>,
) -> T {
    let Some(value) = value else {
        return default;
    };
    parse(value).unwrap_or_else(|| {
        fallbacks.push(field);
        default
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn request(body: Value) -> GenerationRequest {
        GenerationRequest::from_json(body).unwrap()
    }

    #[test]
    fn test_defaults() {
        let options = normalize(&request(json!({"data": "hello"}))).unwrap();

        assert_eq!(options.data, "hello");
        assert_eq!(options.size, 300);
        assert_eq!(options.viewport, 400);
        assert_eq!(options.margin, 0);
        assert_eq!(options.color, Color::BLACK);
        assert_eq!(options.bg_color, Color::WHITE);
        assert_eq!(options.body_style, BodyStyle::Square);
        assert_eq!(options.eye_frame_style, EyeFrameStyle::Square);
        assert_eq!(options.eye_ball_style, EyeBallStyle::Square);
        assert_eq!(options.format, OutputFormat::Svg);
        assert_eq!(options.ec_level, EcLevel::M);
        assert!(options.logo.is_none());
        assert!(options.fallbacks.is_empty());
    }

    #[test]
    fn test_missing_data() {
        assert_eq!(
            normalize(&request(json!({"size": 300}))).unwrap_err(),
            ValidationError::MissingData
        );
        assert_eq!(
            normalize(&request(json!({"data": ""}))).unwrap_err(),
            ValidationError::MissingData
        );
        assert_eq!(
            normalize(&request(json!({"data": null}))).unwrap_err(),
            ValidationError::MissingData
        );
    }

    #[test]
    fn test_numeric_data_is_stringified() {
        let options = normalize(&request(json!({"data": 12345}))).unwrap();
        assert_eq!(options.data, "12345");
    }

    #[test]
    fn test_full_request() {
        let options = normalize(&request(json!({
            "data": "https://example.com",
            "size": "256",
            "color": "#ff0000",
            "bgColor": "#00ff00",
            "bodyStyle": "dots",
            "eyeFrameStyle": "extra-rounded",
            "eyeBallStyle": "dot",
            "format": "PNG",
            "errorCorrectionLevel": "h",
            "margin": 8,
            "logo": "data:image/png;base64,AAAA",
            "logoSize": 0.25
        })))
        .unwrap();

        assert_eq!(options.size, 256);
        assert_eq!(options.viewport, 356);
        assert_eq!(options.margin, 8);
        assert_eq!(options.color, Color::rgb(255, 0, 0));
        assert_eq!(options.bg_color, Color::rgb(0, 255, 0));
        assert_eq!(options.body_style, BodyStyle::Dots);
        assert_eq!(options.eye_frame_style, EyeFrameStyle::ExtraRounded);
        assert_eq!(options.eye_ball_style, EyeBallStyle::Dot);
        assert_eq!(options.format, OutputFormat::Png);
        assert_eq!(options.ec_level, EcLevel::H);
        assert_eq!(
            options.logo,
            Some(Logo {
                href: "data:image/png;base64,AAAA".to_owned(),
                size: 0.25
            })
        );
        assert!(options.fallbacks.is_empty());
    }

    #[test]
    fn test_unknown_tags_fall_back() {
        let options = normalize(&request(json!({
            "data": "x",
            "bodyStyle": "hexagon",
            "eyeFrameStyle": 7,
            "eyeBallStyle": "star",
            "errorCorrectionLevel": "Z",
            "format": "gif",
            "color": "not-a-color"
        })))
        .unwrap();

        assert_eq!(options.body_style, BodyStyle::Square);
        assert_eq!(options.eye_frame_style, EyeFrameStyle::Square);
        assert_eq!(options.eye_ball_style, EyeBallStyle::Square);
        assert_eq!(options.ec_level, EcLevel::M);
        assert_eq!(options.format, OutputFormat::Svg);
        assert_eq!(options.color, Color::BLACK);
        assert_eq!(
            options.fallbacks,
            vec![
                "color",
                "bodyStyle",
                "eyeFrameStyle",
                "eyeBallStyle",
                "format",
                "errorCorrectionLevel"
            ]
        );
    }

    #[test]
    fn test_normalization_is_deterministic() {
        let body = json!({"data": "same", "bodyStyle": "classy", "size": 512, "format": "webp"});
        let first = normalize(&request(body.clone())).unwrap();
        let second = normalize(&request(body)).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_invalid_sizes_fall_back() {
        for size in [json!(0), json!(-10), json!("big"), json!(true)] {
            let options = normalize(&request(json!({"data": "x", "size": size}))).unwrap();
            assert_eq!(options.size, DEFAULT_SIZE, "size {size}");
            assert_eq!(options.fallbacks, vec!["size"]);
        }
    }

    #[test]
    fn test_size_is_clamped() {
        let options = normalize(&request(json!({"data": "x", "size": 100_000}))).unwrap();
        assert_eq!(options.size, MAX_SIZE);
    }

    #[test]
    fn test_margin_must_leave_room() {
        let options = normalize(&request(json!({"data": "x", "size": 100, "margin": 50}))).unwrap();
        assert_eq!(options.margin, 0);
        assert_eq!(options.fallbacks, vec!["margin"]);
    }

    #[test]
    fn test_type_alias_for_format() {
        let options = normalize(&request(json!({"data": "x", "type": "jpg"}))).unwrap();
        assert_eq!(options.format, OutputFormat::Jpeg);

        // `format` wins when both are present
        let options =
            normalize(&request(json!({"data": "x", "type": "jpg", "format": "pdf"}))).unwrap();
        assert_eq!(options.format, OutputFormat::Pdf);
    }

    #[test]
    fn test_nested_options_shape() {
        let options =
            normalize(&request(json!({"options": {"data": "nested", "format": "png"}}))).unwrap();
        assert_eq!(options.data, "nested");
        assert_eq!(options.format, OutputFormat::Png);
    }

    #[test]
    fn test_remote_logo_is_ignored() {
        let options = normalize(&request(json!({
            "data": "x",
            "logo": "https://example.com/logo.png",
            "logoSize": 3
        })))
        .unwrap();
        assert!(options.logo.is_none());
        assert_eq!(options.fallbacks, vec!["logoSize", "logo"]);
    }

    #[test]
    fn test_batch_validation() {
        let missing = BulkRequest::default();
        assert_eq!(
            normalize_batch(&missing).unwrap_err(),
            ValidationError::MissingItems
        );

        let empty = BulkRequest {
            items: Some(Vec::new()),
            ..Default::default()
        };
        assert_eq!(
            normalize_batch(&empty).unwrap_err(),
            ValidationError::EmptyBatch
        );

        let too_many = BulkRequest {
            items: Some(vec![BatchItem::new("x"); MAX_BATCH_ITEMS + 1]),
            ..Default::default()
        };
        assert_eq!(
            normalize_batch(&too_many).unwrap_err(),
            ValidationError::BatchTooLarge {
                count: 51,
                max: 50
            }
        );

        let exact = BulkRequest {
            items: Some(vec![BatchItem::new("x"); MAX_BATCH_ITEMS]),
            ..Default::default()
        };
        assert!(normalize_batch(&exact).is_ok());
    }

    #[test]
    fn test_bulk_request_shared_style() {
        let bulk: BulkRequest = serde_json::from_value(json!({
            "items": [{"data": "a"}, {"data": "b", "name": "second"}],
            "size": 200,
            "eyeBallStyle": "dot"
        }))
        .unwrap();

        let shared = normalize_batch(&bulk).unwrap();
        assert_eq!(shared.size, 200);
        assert_eq!(shared.eye_ball_style, EyeBallStyle::Dot);
        assert!(shared.data.is_empty());

        let items = bulk.items.unwrap();
        assert_eq!(items[1].name.as_deref(), Some("second"));
    }

    #[test]
    fn test_loose_text() {
        assert_eq!(Loose::Number(300.0).as_text(), "300");
        assert_eq!(Loose::Number(0.5).as_text(), "0.5");
        assert_eq!(Loose::Bool(true).as_text(), "true");
        assert_eq!(Loose::from("x").as_f64(), None);
        assert_eq!(Loose::from(" 42 ").as_f64(), Some(42.0));
    }
}
