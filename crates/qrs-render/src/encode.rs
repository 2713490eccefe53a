//! Output encoding: MIME mapping, base64 data URIs, and the JSON envelope.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::Serialize;

use crate::bridge::RenderedArtifact;
use crate::error::RenderError;
use crate::style::OutputFormat;

/// MIME type for a format tag.
///
/// Both `jpeg` and `jpg` map to `image/jpeg`.
#[must_use]
pub fn mime_type(format: &str) -> Option<&'static str> {
    match format.to_ascii_lowercase().as_str() {
        "svg" => Some("image/svg+xml"),
        "png" => Some("image/png"),
        "jpeg" | "jpg" => Some("image/jpeg"),
        "webp" => Some("image/webp"),
        "pdf" => Some("application/pdf"),
        _ => None,
    }
}

/// An artifact paired with its declared format and MIME type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedImage {
    pub format: String,
    pub mime_type: &'static str,
    pub bytes: Vec<u8>,
}

impl EncodedImage {
    /// `data:<mime>;base64,<payload>`.
    #[must_use]
    pub fn data_uri(&self) -> String {
        format!("data:{};base64,{}", self.mime_type, STANDARD.encode(&self.bytes))
    }

    /// JSON response body for a single image.
    #[must_use]
    pub fn envelope(&self) -> ImageEnvelope {
        ImageEnvelope {
            success: true,
            qr_code: self.data_uri(),
            mime_type: self.mime_type,
            format: self.format.clone(),
        }
    }
}

/// Structured single-image response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ImageEnvelope {
    pub success: bool,
    pub qr_code: String,
    pub mime_type: &'static str,
    pub format: String,
}

/// Attach MIME information to `artifact` for the declared `format`.
///
/// Text artifacts are carried as their UTF-8 bytes, binary ones unchanged.
///
/// # Errors
///
/// Returns [`RenderError::Encoding`] if `format` has no MIME mapping or names
/// a different format than the artifact holds.
pub fn encode(artifact: RenderedArtifact, format: &str) -> Result<EncodedImage, RenderError> {
    let mime_type = mime_type(format)
        .ok_or_else(|| RenderError::Encoding(format!("no MIME type for format '{format}'")))?;
    if OutputFormat::parse(format) != Some(artifact.format) {
        return Err(RenderError::Encoding(format!(
            "requested {format} but the render produced {}",
            artifact.format.as_str()
        )));
    }
    Ok(EncodedImage {
        format: format.to_ascii_lowercase(),
        mime_type,
        bytes: artifact.bytes,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn artifact(format: OutputFormat, bytes: &[u8]) -> RenderedArtifact {
        RenderedArtifact {
            format,
            bytes: bytes.to_vec(),
        }
    }

    #[test]
    fn test_mime_table() {
        assert_eq!(mime_type("svg"), Some("image/svg+xml"));
        assert_eq!(mime_type("png"), Some("image/png"));
        assert_eq!(mime_type("jpeg"), Some("image/jpeg"));
        assert_eq!(mime_type("jpg"), Some("image/jpeg"));
        assert_eq!(mime_type("WEBP"), Some("image/webp"));
        assert_eq!(mime_type("pdf"), Some("application/pdf"));
        assert_eq!(mime_type("gif"), None);
    }

    #[test]
    fn test_svg_data_uri() {
        let encoded = encode(artifact(OutputFormat::Svg, b"<svg/>"), "svg").unwrap();
        assert_eq!(encoded.data_uri(), "data:image/svg+xml;base64,PHN2Zy8+");
    }

    #[test]
    fn test_binary_round_trip() {
        let bytes = [0x89, b'P', b'N', b'G', 0, 255];
        let encoded = encode(artifact(OutputFormat::Png, &bytes), "png").unwrap();

        let uri = encoded.data_uri();
        let payload = uri.strip_prefix("data:image/png;base64,").unwrap();
        assert_eq!(STANDARD.decode(payload).unwrap(), bytes);
    }

    #[test]
    fn test_envelope() {
        let encoded = encode(artifact(OutputFormat::Jpeg, b"abc"), "jpg").unwrap();
        let value = serde_json::to_value(encoded.envelope()).unwrap();

        assert_eq!(
            value,
            serde_json::json!({
                "success": true,
                "qr_code": "data:image/jpeg;base64,YWJj",
                "mime_type": "image/jpeg",
                "format": "jpg"
            })
        );
    }

    #[test]
    fn test_unknown_format() {
        let err = encode(artifact(OutputFormat::Svg, b""), "bmp").unwrap_err();
        assert!(matches!(err, RenderError::Encoding(ref msg) if msg.contains("'bmp'")));
    }

    #[test]
    fn test_format_mismatch() {
        let err = encode(artifact(OutputFormat::Svg, b"<svg/>"), "png").unwrap_err();

        assert!(matches!(err, RenderError::Encoding(_)));
        assert_eq!(
            err.to_string(),
            "cannot encode output: requested png but the render produced svg"
        );
        assert_eq!(err.code(), "encoding failed");
    }
}
