//! `qrs serve` command implementation.

use std::path::PathBuf;

use clap::Args;
use qrs_config::{CliSettings, Config, Transport};
use qrs_server::{run_server, server_config_from_qrs_config};

use crate::error::CliError;
use crate::output::Output;

/// Arguments for the serve command.
#[derive(Args)]
pub(crate) struct ServeArgs {
    /// Path to configuration file (default: auto-discover qrs.toml).
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Host to bind to (overrides config).
    #[arg(long)]
    host: Option<String>,

    /// Port to bind to (overrides config).
    #[arg(short, long, env = "PORT")]
    port: Option<u16>,

    /// Fail at startup when no port is configured.
    #[arg(long)]
    strict_port: bool,

    /// Default response transport for /generate: json or binary.
    #[arg(long, value_parser = parse_transport)]
    transport: Option<Transport>,

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

impl ServeArgs {
    /// Execute the serve command.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration fails or the server fails to start.
    pub(crate) async fn execute(self, version: &str) -> Result<(), CliError> {
        let output = Output::new();

        let cli_settings = CliSettings {
            host: self.host,
            port: self.port,
            require_port: self.strict_port.then_some(true),
            transport: self.transport,
            resources_dir: self.resources_dir,
            timeout_ms: self.timeout_ms,
        };

        let config = Config::load(self.config.as_deref(), Some(&cli_settings))?;
        config.require_listen_port()?;

        output.info(&format!(
            "Starting server on {}:{}",
            config.server.host,
            config.server.resolved_port()
        ));
        output.info(&format!(
            "Render timeout: {}ms",
            config.render_resolved.timeout.as_millis()
        ));
        match &config.render_resolved.resources_dir {
            Some(dir) => output.info(&format!("Render resources: {}", dir.display())),
            None if config.render_resolved.system_fonts => output.info("Render resources: system fonts"),
            None => output.info("Render resources: none"),
        }
        if config.server.port.is_none() {
            output.warning(&format!(
                "No port configured, using default {}",
                qrs_config::DEFAULT_PORT
            ));
        }

        let server_config = server_config_from_qrs_config(&config, version.to_owned());
        run_server(server_config)
            .await
            .map_err(|e| CliError::Server(e.to_string()))?;

        Ok(())
    }
}

fn parse_transport(value: &str) -> Result<Transport, String> {
    Transport::parse(value).ok_or_else(|| format!("unknown transport '{value}' (json, binary)"))
}
