//! Styled SVG output for a QR module matrix.
//!
//! Coordinates are in image pixels. The code is centred in the image with
//! `margin` pixels of quiet zone on each side; module edges are floored to
//! whole pixels when the content is large enough so raster output stays crisp.

use std::fmt::{self, Write};

use qrcodegen::QrCode;

use crate::consts::LOGO_RECOVERY_SHARE;
use crate::options::{Logo, RenderOptions};
use crate::style::{BodyStyle, Color, EcLevel, EyeBallStyle, EyeFrameStyle};

/// Finder pattern edge in modules.
const FINDER: usize = 7;

/// Square grid of dark/light modules.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Matrix {
    size: usize,
    modules: Vec<bool>,
}

impl Matrix {
    pub(crate) fn from_qr(qr: &QrCode) -> Self {
        let size = usize::try_from(qr.size()).unwrap_or(0);
        let mut modules = Vec::with_capacity(size * size);
        for y in 0..qr.size() {
            for x in 0..qr.size() {
                modules.push(qr.get_module(x, y));
            }
        }
        Self { size, modules }
    }

    #[cfg(test)]
    pub(crate) fn from_rows(rows: &[&str]) -> Self {
        let size = rows.len();
        let modules = rows
            .iter()
            .flat_map(|row| row.chars().map(|c| c == '#'))
            .collect();
        Self { size, modules }
    }

    pub(crate) fn size(&self) -> usize {
        self.size
    }

    fn is_dark(&self, x: usize, y: usize) -> bool {
        x < self.size && y < self.size && self.modules[y * self.size + x]
    }
}

/// Pixel placement of the module grid.
#[derive(Debug, Clone, Copy)]
struct Grid {
    origin: f64,
    module: f64,
}

impl Grid {
    #[allow(clippy::cast_precision_loss)]
    fn new(size: u32, margin: u32, count: usize) -> Self {
        let count = count.max(1);
        let content = f64::from(size.saturating_sub(margin * 2).max(1));
        let exact = content / count as f64;
        let module = if exact >= 1.0 { exact.floor() } else { exact };
        let origin = (f64::from(size) - module * count as f64) / 2.0;
        Self { origin, module }
    }

    #[allow(clippy::cast_precision_loss)]
    fn at(&self, index: usize) -> f64 {
        self.origin + index as f64 * self.module
    }
}

/// Module block hidden behind the logo, centred on the code.
///
/// The block is an odd number of modules per side so it sits exactly on the
/// centre module. It shrinks until the modules it hides fit within the error
/// correction budget; the image is drawn inside it.
#[derive(Debug, Clone, Copy)]
struct LogoBox {
    start: usize,
    span: usize,
    offset: f64,
    edge: f64,
}

impl LogoBox {
    #[allow(
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss,
        clippy::cast_precision_loss
    )]
    fn fit(logo: &Logo, options: &RenderOptions, grid: &Grid, count: usize) -> Option<Self> {
        let image = f64::from(options.size);
        let requested = image * f64::from(logo.size);
        let wanted = odd_ceil((requested / grid.module).ceil() as usize);
        let span = wanted.min(max_logo_span(count, options.ec_level));
        if span == 0 {
            return None;
        }
        let edge = requested.min(span as f64 * grid.module);
        Some(Self {
            start: (count - span) / 2,
            span,
            offset: (image - edge) / 2.0,
            edge,
        })
    }

    /// Whether module `(x, y)` is hidden.
    fn covers(&self, x: usize, y: usize) -> bool {
        let hidden = self.start..self.start + self.span;
        hidden.contains(&x) && hidden.contains(&y)
    }
}

fn odd_ceil(n: usize) -> usize {
    if n % 2 == 0 { n + 1 } else { n }
}

/// Largest odd block edge, in modules, a logo may hide on a `count` module code.
#[allow(
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::cast_precision_loss
)]
fn max_logo_span(count: usize, ec_level: EcLevel) -> usize {
    let budget = (LOGO_RECOVERY_SHARE * ec_level.recovery() * (count * count) as f64) as usize;
    // Never reach into the finder patterns
    let span = budget.isqrt().min(count.saturating_sub(2 * FINDER));
    if span % 2 == 0 { span.saturating_sub(1) } else { span }
}

/// Logo edge, as a fraction of the image, that fits the code for `options`.
///
/// `None` when no logo can be placed at all.
#[allow(clippy::cast_possible_truncation)]
pub(crate) fn fitted_logo_size(matrix: &Matrix, options: &RenderOptions) -> Option<f32> {
    let logo = options.logo.as_ref()?;
    let grid = Grid::new(options.size, options.margin, matrix.size());
    LogoBox::fit(logo, options, &grid, matrix.size())
        .map(|area| (area.edge / f64::from(options.size)) as f32)
}

fn in_finder(x: usize, y: usize, count: usize) -> bool {
    let near = |i: usize| i < FINDER;
    let far = |i: usize| i + FINDER >= count;
    (near(x) && near(y)) || (far(x) && near(y)) || (near(x) && far(y))
}

/// Paint `matrix` with the style in `options`.
pub(crate) fn draw(matrix: &Matrix, options: &RenderOptions) -> String {
    let count = matrix.size();
    let grid = Grid::new(options.size, options.margin, count);
    let hole = options
        .logo
        .as_ref()
        .and_then(|logo| LogoBox::fit(logo, options, &grid, count));

    let drawn = |x: usize, y: usize| {
        matrix.is_dark(x, y) && !in_finder(x, y, count) && !hole.is_some_and(|h| h.covers(x, y))
    };

    let mut body = PathData::default();
    for y in 0..count {
        for x in 0..count {
            if drawn(x, y) {
                let neighbors = Neighbors {
                    top: y > 0 && drawn(x, y - 1),
                    right: drawn(x + 1, y),
                    bottom: drawn(x, y + 1),
                    left: x > 0 && drawn(x - 1, y),
                };
                body_module(&mut body, options.body_style, &grid, x, y, neighbors);
            }
        }
    }

    let mut frames = PathData::default();
    let mut balls = PathData::default();
    if count >= FINDER {
        let far = count - FINDER;
        for (fx, fy) in [(0, 0), (far, 0), (0, far)] {
            eye_frame(&mut frames, options.eye_frame_style, &grid, fx, fy);
            eye_ball(&mut balls, options.eye_ball_style, &grid, fx + 2, fy + 2);
        }
    }

    let size = options.size;
    let mut svg = String::with_capacity(body.0.len() + 1024);
    let _ = write!(
        svg,
        r#"<svg xmlns="http://www.w3.org/2000/svg" xmlns:xlink="http://www.w3.org/1999/xlink" version="1.1" width="{size}" height="{size}" viewBox="0 0 {size} {size}">"#
    );
    if options.bg_color.a > 0 {
        let _ = write!(
            svg,
            r#"<rect x="0" y="0" width="{size}" height="{size}"{}/>"#,
            Fill(options.bg_color)
        );
    }
    if !body.is_empty() {
        let _ = write!(svg, r#"<path{} d="{}"/>"#, Fill(options.color), body.0);
    }
    if !frames.is_empty() {
        let _ = write!(
            svg,
            r#"<path{} fill-rule="evenodd" d="{}"/>"#,
            Fill(options.color),
            frames.0
        );
    }
    if !balls.is_empty() {
        let _ = write!(svg, r#"<path{} d="{}"/>"#, Fill(options.color), balls.0);
    }
    if let (Some(logo), Some(area)) = (&options.logo, hole) {
        let (offset, edge) = (area.offset, area.edge);
        let _ = write!(
            svg,
            r#"<image x="{}" y="{}" width="{}" height="{}" preserveAspectRatio="xMidYMid meet" xlink:href="{}"/>"#,
            Num(offset),
            Num(offset),
            Num(edge),
            Num(edge),
            escape_attr(&logo.href)
        );
    }
    svg.push_str("</svg>");
    svg
}

#[derive(Debug, Clone, Copy, Default)]
struct Neighbors {
    top: bool,
    right: bool,
    bottom: bool,
    left: bool,
}

/// Corner radii (`[tl, tr, br, bl]`) as fractions of the module edge.
fn body_radii(style: BodyStyle, n: Neighbors) -> [f64; 4] {
    let free = [
        !n.top && !n.left,
        !n.top && !n.right,
        !n.bottom && !n.right,
        !n.bottom && !n.left,
    ];
    let pick = |r: [f64; 4]| {
        let mut out = [0.0; 4];
        for (i, radius) in r.into_iter().enumerate() {
            if free[i] {
                out[i] = radius;
            }
        }
        out
    };
    match style {
        BodyStyle::Square | BodyStyle::Dots => [0.0; 4],
        BodyStyle::Rounded => pick([0.3; 4]),
        BodyStyle::ExtraRounded => pick([0.5; 4]),
        BodyStyle::Classy => pick([0.5, 0.0, 0.5, 0.0]),
        BodyStyle::ClassyRounded => pick([0.5, 0.2, 0.5, 0.2]),
    }
}

fn body_module(
    path: &mut PathData,
    style: BodyStyle,
    grid: &Grid,
    x: usize,
    y: usize,
    neighbors: Neighbors,
) {
    let m = grid.module;
    let (px, py) = (grid.at(x), grid.at(y));
    match style {
        BodyStyle::Square => path.rect(px, py, m, m),
        BodyStyle::Dots => path.circle(px + m / 2.0, py + m / 2.0, m / 2.0),
        _ => {
            let radii = body_radii(style, neighbors).map(|r| r * m);
            path.rounded_rect(px, py, m, m, radii);
        }
    }
}

fn eye_frame(path: &mut PathData, style: EyeFrameStyle, grid: &Grid, fx: usize, fy: usize) {
    let m = grid.module;
    let (x, y) = (grid.at(fx), grid.at(fy));
    let outer = m * 7.0;
    let inner = m * 5.0;
    match style {
        EyeFrameStyle::Square => {
            path.rect(x, y, outer, outer);
            path.rect(x + m, y + m, inner, inner);
        }
        EyeFrameStyle::Dot => {
            let (cx, cy) = (x + outer / 2.0, y + outer / 2.0);
            path.circle(cx, cy, outer / 2.0);
            path.circle(cx, cy, inner / 2.0);
        }
        EyeFrameStyle::ExtraRounded => {
            path.rounded_rect(x, y, outer, outer, [m * 2.5; 4]);
            path.rounded_rect(x + m, y + m, inner, inner, [m * 1.5; 4]);
        }
    }
}

fn eye_ball(path: &mut PathData, style: EyeBallStyle, grid: &Grid, bx: usize, by: usize) {
    let m = grid.module;
    let (x, y) = (grid.at(bx), grid.at(by));
    let edge = m * 3.0;
    match style {
        EyeBallStyle::Square => path.rect(x, y, edge, edge),
        EyeBallStyle::Dot => path.circle(x + edge / 2.0, y + edge / 2.0, edge / 2.0),
    }
}

/// Accumulated SVG path data.
#[derive(Debug, Default)]
struct PathData(String);

impl PathData {
    fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    fn rect(&mut self, x: f64, y: f64, w: f64, h: f64) {
        let _ = write!(
            self.0,
            "M{} {}h{}v{}h{}z",
            Num(x),
            Num(y),
            Num(w),
            Num(h),
            Num(-w)
        );
    }

    fn circle(&mut self, cx: f64, cy: f64, r: f64) {
        let _ = write!(
            self.0,
            "M{} {}a{r} {r} 0 1 0 {d} 0a{r} {r} 0 1 0 {nd} 0z",
            Num(cx - r),
            Num(cy),
            r = Num(r),
            d = Num(r * 2.0),
            nd = Num(-r * 2.0),
        );
    }

    fn rounded_rect(&mut self, x: f64, y: f64, w: f64, h: f64, radii: [f64; 4]) {
        if radii.iter().all(|r| *r <= 0.0) {
            self.rect(x, y, w, h);
            return;
        }
        let [tl, tr, br, bl] = radii;
        let _ = write!(self.0, "M{} {}H{}", Num(x + tl), Num(y), Num(x + w - tr));
        if tr > 0.0 {
            let _ = write!(self.0, "A{r} {r} 0 0 1 {} {}", Num(x + w), Num(y + tr), r = Num(tr));
        }
        let _ = write!(self.0, "V{}", Num(y + h - br));
        if br > 0.0 {
            let _ = write!(
                self.0,
                "A{r} {r} 0 0 1 {} {}",
                Num(x + w - br),
                Num(y + h),
                r = Num(br)
            );
        }
        let _ = write!(self.0, "H{}", Num(x + bl));
        if bl > 0.0 {
            let _ = write!(self.0, "A{r} {r} 0 0 1 {} {}", Num(x), Num(y + h - bl), r = Num(bl));
        }
        let _ = write!(self.0, "V{}", Num(y + tl));
        if tl > 0.0 {
            let _ = write!(self.0, "A{r} {r} 0 0 1 {} {}", Num(x + tl), Num(y), r = Num(tl));
        }
        self.0.push('z');
    }
}

/// Coordinate printed with at most three decimals and no trailing zeros.
struct Num(f64);

impl fmt::Display for Num {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = format!("{:.3}", self.0);
        let text = text.trim_end_matches('0').trim_end_matches('.');
        f.write_str(if text == "-0" { "0" } else { text })
    }
}

/// ` fill="..."` plus `fill-opacity` for translucent colors.
struct Fill(Color);

impl fmt::Display for Fill {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, r#" fill="{}""#, self.0.hex())?;
        if !self.0.is_opaque() {
            write!(f, r#" fill-opacity="{}""#, Num(f64::from(self.0.opacity())))?;
        }
        Ok(())
    }
}

fn escape_attr(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '"' => out.push_str("&quot;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            _ => out.push(c),
        }
    }
    out
}
