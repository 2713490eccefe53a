//! Raster and PDF conversion of painted markup.

use std::sync::Arc;

use tiny_skia::{IntRect, Pixmap, Transform};
use usvg::fontdb::Database;

use crate::consts::JPEG_QUALITY;

#[derive(Debug, thiserror::Error)]
pub enum RasterError {
    #[error("failed to parse SVG: {0}")]
    SvgParse(String),
    #[error("failed to allocate {0}x{0} pixmap")]
    PixmapAlloc(u32),
    #[error("element box {0}x{0} exceeds the page surface")]
    Crop(u32),
    #[error("failed to encode PNG")]
    PngEncode,
    #[error("failed to encode JPEG: {0}")]
    JpegEncode(String),
    #[error("failed to encode WebP: {0}")]
    WebpEncode(String),
    #[error("failed to convert SVG to PDF: {0}")]
    PdfConvert(String),
}

pub type Result<T> = std::result::Result<T, RasterError>;

/// Paint `svg` onto a transparent square surface of `viewport` pixels.
///
/// The document keeps its own size; it is drawn at the top-left corner and
/// the remainder of the surface stays transparent.
pub(crate) fn paint_surface(svg: &str, viewport: u32, fontdb: Arc<Database>) -> Result<Pixmap> {
    let opt = usvg::Options {
        fontdb,
        ..usvg::Options::default()
    };
    let tree = usvg::Tree::from_str(svg, &opt).map_err(|e| RasterError::SvgParse(e.to_string()))?;

    let mut pixmap = Pixmap::new(viewport, viewport).ok_or(RasterError::PixmapAlloc(viewport))?;
    resvg::render(&tree, Transform::identity(), &mut pixmap.as_mut());
    Ok(pixmap)
}

/// Copy the `edge`x`edge` element box from the top-left of `surface`.
pub(crate) fn crop(surface: &Pixmap, edge: u32) -> Result<Pixmap> {
    IntRect::from_xywh(0, 0, edge, edge)
        .and_then(|rect| surface.clone_rect(rect))
        .filter(|cropped| cropped.width() == edge && cropped.height() == edge)
        .ok_or(RasterError::Crop(edge))
}

pub(crate) fn encode_png(pixmap: &Pixmap) -> Result<Vec<u8>> {
    pixmap.encode_png().map_err(|_| RasterError::PngEncode)
}

/// Encode as baseline JPEG, compositing translucent pixels over white.
pub(crate) fn encode_jpeg(pixmap: &Pixmap) -> Result<Vec<u8>> {
    let (w, h) = (pixmap.width(), pixmap.height());

    // Pixels are premultiplied, so "over white" is `c + (255 - a)`
    let mut rgb = vec![0u8; (w as usize) * (h as usize) * 3];
    for (src, dst) in pixmap.data().chunks_exact(4).zip(rgb.chunks_exact_mut(3)) {
        let under = 255 - src[3];
        dst[0] = src[0].saturating_add(under);
        dst[1] = src[1].saturating_add(under);
        dst[2] = src[2].saturating_add(under);
    }

    let mut out = Vec::new();
    let mut enc = image::codecs::jpeg::JpegEncoder::new_with_quality(&mut out, JPEG_QUALITY);
    enc.encode(&rgb, w, h, image::ExtendedColorType::Rgb8)
        .map_err(|e| RasterError::JpegEncode(e.to_string()))?;
    Ok(out)
}

/// Encode as lossless WebP with alpha.
pub(crate) fn encode_webp(pixmap: &Pixmap) -> Result<Vec<u8>> {
    let (w, h) = (pixmap.width(), pixmap.height());

    let mut rgba = Vec::with_capacity(pixmap.data().len());
    for pixel in pixmap.pixels() {
        let c = pixel.demultiply();
        rgba.extend_from_slice(&[c.red(), c.green(), c.blue(), c.alpha()]);
    }

    let mut out = Vec::new();
    image::codecs::webp::WebPEncoder::new_lossless(&mut out)
        .encode(&rgba, w, h, image::ExtendedColorType::Rgba8)
        .map_err(|e| RasterError::WebpEncode(e.to_string()))?;
    Ok(out)
}

/// Convert the vector markup to a single-page PDF.
pub(crate) fn svg_to_pdf(svg: &str) -> Result<Vec<u8>> {
    let opt = svg2pdf::usvg::Options::default();
    let tree =
        svg2pdf::usvg::Tree::from_str(svg, &opt).map_err(|e| RasterError::SvgParse(e.to_string()))?;

    svg2pdf::to_pdf(
        &tree,
        svg2pdf::ConversionOptions::default(),
        svg2pdf::PageOptions::default(),
    )
    .map_err(|e| RasterError::PdfConvert(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    const RED_SQUARE: &str = r##"<svg xmlns="http://www.w3.org/2000/svg" width="10" height="10" viewBox="0 0 10 10"><rect width="10" height="10" fill="#ff0000"/></svg>"##;

    fn surface(viewport: u32) -> Pixmap {
        paint_surface(RED_SQUARE, viewport, Arc::new(Database::new())).unwrap()
    }

    #[test]
    fn test_paint_surface_leaves_margin_transparent() {
        let pixmap = surface(20);

        assert_eq!(pixmap.width(), 20);
        let inside = pixmap.pixel(5, 5).unwrap();
        assert_eq!((inside.red(), inside.alpha()), (255, 255));
        let outside = pixmap.pixel(15, 15).unwrap();
        assert_eq!(outside.alpha(), 0);
    }

    #[test]
    fn test_crop_to_element_box() {
        let cropped = crop(&surface(20), 10).unwrap();
        assert_eq!((cropped.width(), cropped.height()), (10, 10));
        assert!(cropped.pixels().iter().all(|p| p.alpha() == 255));

        assert!(matches!(crop(&surface(20), 30), Err(RasterError::Crop(30))));
    }

    #[test]
    fn test_invalid_markup() {
        let err = paint_surface("<svg", 10, Arc::new(Database::new())).unwrap_err();
        assert!(matches!(err, RasterError::SvgParse(_)));
    }

    #[test]
    fn test_png_signature() {
        let png = encode_png(&crop(&surface(20), 10).unwrap()).unwrap();
        assert_eq!(&png[..8], b"\x89PNG\r\n\x1a\n");
    }

    #[test]
    fn test_jpeg_composites_over_white() {
        // Fully transparent surface becomes white
        let blank = Pixmap::new(8, 8).unwrap();
        let jpeg = encode_jpeg(&blank).unwrap();
        assert_eq!(&jpeg[..2], &[0xFF, 0xD8]);

        let decoded = image::load_from_memory(&jpeg).unwrap().to_rgb8();
        assert!(decoded.pixels().all(|p| p.0.iter().all(|c| *c > 245)));
    }

    #[test]
    fn test_webp_signature() {
        let webp = encode_webp(&surface(10)).unwrap();
        assert_eq!(&webp[..4], b"RIFF");
        assert_eq!(&webp[8..12], b"WEBP");
    }

    #[test]
    fn test_pdf_signature() {
        let pdf = svg_to_pdf(RED_SQUARE).unwrap();
        assert!(pdf.starts_with(b"%PDF-"));
    }
}
