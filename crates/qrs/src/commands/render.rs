//! `qrs render` command implementation.

use std::path::{Path, PathBuf};

use clap::Args;
use qrs_config::{CliSettings, Config};
use qrs_render::options::{Loose, StyleFields};
use qrs_render::{
    ContextConfig, ContextManager, GenerationRequest, QrRenderer, RenderingBridge, normalize,
};

use crate::error::CliError;
use crate::output::Output;

/// Arguments for the render command.
#[derive(Args)]
pub(crate) struct RenderArgs {
    /// Content to encode.
    #[arg(short, long)]
    data: String,

    /// Output file. The format defaults to the file extension.
    #[arg(short, long)]
    output: PathBuf,

    /// Output format: svg, png, jpeg, webp or pdf.
    #[arg(short, long)]
    format: Option<String>,

    /// Image edge in pixels.
    #[arg(short, long)]
    size: Option<u32>,

    /// Foreground color.
    #[arg(long)]
    color: Option<String>,

    /// Background color.
    #[arg(long)]
    bg_color: Option<String>,

    /// Module shape: square, dots, rounded, extra-rounded, classy, classy-rounded.
    #[arg(long)]
    body_style: Option<String>,

    /// Finder frame shape: square, dot, extra-rounded.
    #[arg(long)]
    eye_frame_style: Option<String>,

    /// Finder center shape: square, dot.
    #[arg(long)]
    eye_ball_style: Option<String>,

    /// Error correction level: L, M, Q or H.
    #[arg(long)]
    ecl: Option<String>,

    /// Quiet zone in pixels.
    #[arg(long)]
    margin: Option<u32>,

    /// Logo as a data:image URI.
    #[arg(long)]
    logo: Option<String>,

    /// Logo edge as a fraction of the image size.
    #[arg(long)]
    logo_size: Option<f64>,

    /// Path to configuration file (default: auto-discover qrs.toml).
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Directory of render resources such as fonts (overrides config).
    #[arg(long, env = "QRS_RENDER_RESOURCES")]
    resources_dir: Option<PathBuf>,

    /// Render deadline in milliseconds (overrides config).
    #[arg(long)]
    timeout_ms: Option<u64>,

    /// Enable verbose output.
    #[arg(short, long)]
    pub verbose: bool,
}

impl RenderArgs {
    /// Execute the render command.
    ///
    /// # Errors
    ///
    /// Returns an error if the options are invalid, rendering fails, or the
    /// output file cannot be written.
    pub(crate) async fn execute(self) -> Result<(), CliError> {
        let output = Output::new();

        let cli_settings = CliSettings {
            resources_dir: self.resources_dir.clone(),
            timeout_ms: self.timeout_ms,
            ..CliSettings::default()
        };
        let config = Config::load(self.config.as_deref(), Some(&cli_settings))?;

        let options = normalize(&self.request())?;
        for field in &options.fallbacks {
            output.warning(&format!("Adjusted {field}: unusable value or too large to stay readable"));
        }

        let render = &config.render_resolved;
        let renderer = QrRenderer::new(
            ContextManager::new(ContextConfig {
                resources_dir: render.resources_dir.clone(),
                system_fonts: render.system_fonts,
                max_live_contexts: render.max_live_contexts,
            }),
            RenderingBridge::default().with_timeout(render.timeout),
        );

        let image = renderer.generate(&options).await?;
        std::fs::write(&self.output, &image.bytes)?;
        tracing::info!(path = %self.output.display(), format = %image.format, "Wrote QR code");

        output.success(&format!(
            "Wrote {} ({}, {} bytes)",
            self.output.display(),
            image.mime_type,
            image.bytes.len()
        ));
        Ok(())
    }

    fn request(&self) -> GenerationRequest {
        let text = |value: &Option<String>| value.as_deref().map(Loose::from);
        let format = self
            .format
            .clone()
            .or_else(|| format_from_extension(&self.output));

        GenerationRequest {
            data: Some(Loose::from(self.data.as_str())),
            style: StyleFields {
                size: self.size.map(Loose::from),
                color: text(&self.color),
                bg_color: text(&self.bg_color),
                body_style: text(&self.body_style),
                eye_frame_style: text(&self.eye_frame_style),
                eye_ball_style: text(&self.eye_ball_style),
                format: text(&format),
                kind: None,
                error_correction_level: text(&self.ecl),
                margin: self.margin.map(Loose::from),
                logo: text(&self.logo),
                logo_size: self.logo_size.map(Loose::Number),
            },
        }
    }
}

fn format_from_extension(path: &Path) -> Option<String> {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_ascii_lowercase)
}
