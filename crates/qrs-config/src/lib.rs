//! Configuration management for qrs.
//!
//! Parses `qrs.toml` configuration files with serde and provides
//! auto-discovery of config files in parent directories.
//!
//! CLI settings (including the `PORT` environment variable, which the binary
//! reads through clap) can be applied during load via [`CliSettings`].
//!
//! ## Environment Variable Expansion
//!
//! String configuration values support environment variable expansion:
//!
//! - `${VAR}` - expands to the value of VAR, errors if unset
//! - `${VAR:-default}` - expands to VAR if set, otherwise uses default
//!
//! Expanded fields:
//! - `server.host`
//! - `render.resources_dir`
//!
//! ## Strict port mode
//!
//! Container platforms inject the listen port through `PORT` and expect the
//! process to fail fast when it is absent. Setting `server.require_port = true`
//! (or passing `--strict-port`) turns a missing port into a validation error
//! instead of falling back to [`DEFAULT_PORT`].

mod expand;

use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// CLI settings that override configuration file values.
///
/// All fields are optional. Only non-None values override the loaded config.
#[derive(Debug, Default)]
pub struct CliSettings {
    /// Override server host.
    pub host: Option<String>,
    /// Override server port.
    pub port: Option<u16>,
    /// Override strict port mode.
    pub require_port: Option<bool>,
    /// Override response transport.
    pub transport: Option<Transport>,
    /// Override render resources directory.
    pub resources_dir: Option<PathBuf>,
    /// Override render deadline in milliseconds.
    pub timeout_ms: Option<u64>,
}

/// Configuration filename to search for.
const CONFIG_FILENAME: &str = "qrs.toml";

/// Port used when none is configured and strict mode is off.
pub const DEFAULT_PORT: u16 = 3000;

/// Default request body limit (10 MiB, enough for embedded logos).
pub const DEFAULT_BODY_LIMIT: usize = 10 * 1024 * 1024;

/// Default render deadline in milliseconds.
pub const DEFAULT_TIMEOUT_MS: u64 = 10_000;

/// Default cap on simultaneously live render contexts.
pub const DEFAULT_MAX_LIVE_CONTEXTS: usize = 32;

/// Application configuration.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Server configuration.
    pub server: ServerConfig,
    /// Render configuration (paths are relative strings from TOML).
    render: RenderConfigRaw,

    /// Resolved render configuration (set after loading).
    #[serde(skip)]
    pub render_resolved: RenderConfig,
    /// Path to the config file (set after loading).
    #[serde(skip)]
    pub config_path: Option<PathBuf>,
}

/// Response transport for `/generate`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Transport {
    /// JSON envelope with a base64 data URI.
    #[default]
    Json,
    /// Raw image bytes with the resolved `Content-Type`.
    Binary,
}

impl Transport {
    /// Parse transport from a query or CLI value.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "json" => Some(Self::Json),
            "binary" | "raw" => Some(Self::Binary),
            _ => None,
        }
    }
}

/// Server configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Server host address.
    pub host: String,
    /// Server port (`None` means "not configured").
    pub port: Option<u16>,
    /// Fail at startup when no port is configured.
    pub require_port: bool,
    /// Maximum accepted request body size in bytes.
    pub body_limit_bytes: usize,
    /// Default response transport for `/generate`.
    pub transport: Transport,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_owned(),
            port: None,
            require_port: false,
            body_limit_bytes: DEFAULT_BODY_LIMIT,
            transport: Transport::Json,
        }
    }
}

impl ServerConfig {
    /// Port to bind, falling back to [`DEFAULT_PORT`].
    #[must_use]
    pub fn resolved_port(&self) -> u16 {
        self.port.unwrap_or(DEFAULT_PORT)
    }
}

/// Raw render configuration as parsed from TOML.
#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct RenderConfigRaw {
    timeout_ms: Option<u64>,
    resources_dir: Option<String>,
    system_fonts: Option<bool>,
    max_live_contexts: Option<usize>,
}

/// Resolved render configuration.
#[derive(Debug, Clone)]
pub struct RenderConfig {
    /// Deadline for a single render.
    pub timeout: Duration,
    /// Directory of engine resources (fonts) loaded into each context.
    pub resources_dir: Option<PathBuf>,
    /// Load system fonts into each context.
    pub system_fonts: bool,
    /// Maximum number of simultaneously live contexts.
    pub max_live_contexts: usize,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_millis(DEFAULT_TIMEOUT_MS),
            resources_dir: None,
            system_fonts: false,
            max_live_contexts: DEFAULT_MAX_LIVE_CONTEXTS,
        }
    }
}

/// Configuration error.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// File not found.
    #[error("Configuration file not found: {}", .0.display())]
    NotFound(PathBuf),
    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    /// TOML parsing error.
    #[error("TOML parse error: {0}")]
    Parse(#[from] toml::de::Error),
    /// Validation error.
    #[error("Configuration error: {0}")]
    Validation(String),
    /// Environment variable error during expansion.
    #[error("Environment variable error in {field}: {message}")]
    EnvVar {
        /// Config field path (e.g., "`server.host`").
        field: String,
        /// Error message (e.g., "${`QRS_HOST`} not set").
        message: String,
    },
}

/// Require a string field to be non-empty.
fn require_non_empty(value: &str, field: &str) -> Result<(), ConfigError> {
    if value.is_empty() {
        return Err(ConfigError::Validation(format!("{field} cannot be empty")));
    }
    Ok(())
}

impl Config {
    /// Load configuration from file with optional CLI settings.
    ///
    /// If `config_path` is provided, loads from that file.
    /// Otherwise, searches for `qrs.toml` in current directory and parents.
    ///
    /// CLI settings are applied after loading and path resolution, allowing CLI
    /// arguments to take precedence over config file values. Validation runs
    /// last. Strict port mode is not checked here; listeners call
    /// [`Config::require_listen_port`].
    ///
    /// # Errors
    ///
    /// Returns error if explicit `config_path` doesn't exist, parsing fails,
    /// or the merged configuration is invalid.
    pub fn load(
        config_path: Option<&Path>,
        cli_settings: Option<&CliSettings>,
    ) -> Result<Self, ConfigError> {
        let mut config = if let Some(path) = config_path {
            if !path.exists() {
                return Err(ConfigError::NotFound(path.to_path_buf()));
            }
            Self::load_from_file(path)?
        } else if let Some(discovered) = Self::discover_config() {
            Self::load_from_file(&discovered)?
        } else {
            Self::default()
        };

        if let Some(settings) = cli_settings {
            config.apply_cli_settings(settings);
        }

        config.validate()?;

        Ok(config)
    }

    /// Apply CLI settings to the configuration.
    fn apply_cli_settings(&mut self, settings: &CliSettings) {
        if let Some(host) = &settings.host {
            self.server.host.clone_from(host);
        }
        if let Some(port) = settings.port {
            self.server.port = Some(port);
        }
        if let Some(require_port) = settings.require_port {
            self.server.require_port = require_port;
        }
        if let Some(transport) = settings.transport {
            self.server.transport = transport;
        }
        if let Some(resources_dir) = &settings.resources_dir {
            self.render_resolved.resources_dir = Some(resources_dir.clone());
        }
        if let Some(timeout_ms) = settings.timeout_ms {
            self.render_resolved.timeout = Duration::from_millis(timeout_ms);
        }
    }

    /// Search for config file in current directory and parents.
    fn discover_config() -> Option<PathBuf> {
        let mut current = std::env::current_dir().ok()?;
        loop {
            let candidate = current.join(CONFIG_FILENAME);
            if candidate.exists() {
                return Some(candidate);
            }
            if !current.pop() {
                return None;
            }
        }
    }

    /// Load configuration from a specific file.
    fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let mut config: Self = toml::from_str(&content)?;

        // Expand environment variables before path resolution
        config.expand_env_vars()?;

        let config_dir = path.parent().unwrap_or(Path::new("."));
        config.resolve_paths(config_dir);
        config.config_path = Some(path.to_path_buf());

        Ok(config)
    }

    /// Validate configuration values.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Validation` if any validation fails.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.validate_server()?;
        self.validate_render()?;
        Ok(())
    }

    /// Validate server configuration.
    fn validate_server(&self) -> Result<(), ConfigError> {
        require_non_empty(&self.server.host, "server.host")?;

        if self.server.port == Some(0) {
            return Err(ConfigError::Validation(
                "server.port cannot be 0".to_owned(),
            ));
        }

        if self.server.body_limit_bytes == 0 {
            return Err(ConfigError::Validation(
                "server.body_limit_bytes must be greater than 0".to_owned(),
            ));
        }

        Ok(())
    }

    /// Check strict port mode before binding a listener.
    ///
    /// One-shot commands that never listen skip this check, so a config with
    /// `require_port = true` still works for them.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Validation` if `server.require_port` is set and no
    /// port was configured.
    pub fn require_listen_port(&self) -> Result<(), ConfigError> {
        if self.server.require_port && self.server.port.is_none() {
            return Err(ConfigError::Validation(
                "server.port is required (set PORT or --port)".to_owned(),
            ));
        }
        Ok(())
    }

    /// Validate render configuration.
    fn validate_render(&self) -> Result<(), ConfigError> {
        const MAX_TIMEOUT: Duration = Duration::from_secs(120);

        let render = &self.render_resolved;
        if render.timeout.is_zero() {
            return Err(ConfigError::Validation(
                "render.timeout_ms must be greater than 0".to_owned(),
            ));
        }
        if render.timeout > MAX_TIMEOUT {
            return Err(ConfigError::Validation(format!(
                "render.timeout_ms cannot exceed {}",
                MAX_TIMEOUT.as_millis()
            )));
        }
        if render.max_live_contexts == 0 {
            return Err(ConfigError::Validation(
                "render.max_live_contexts must be greater than 0".to_owned(),
            ));
        }

        Ok(())
    }

    /// Expand environment variable references in configuration strings.
    fn expand_env_vars(&mut self) -> Result<(), ConfigError> {
        self.server.host = expand::expand_env(&self.server.host, "server.host")?;

        if let Some(ref dir) = self.render.resources_dir {
            self.render.resources_dir = Some(expand::expand_env(dir, "render.resources_dir")?);
        }

        Ok(())
    }

    /// Resolve the raw render section, making paths absolute against the
    /// config directory.
    fn resolve_paths(&mut self, config_dir: &Path) {
        let raw = &self.render;
        let defaults = RenderConfig::default();

        self.render_resolved = RenderConfig {
            timeout: raw
                .timeout_ms
                .map_or(defaults.timeout, Duration::from_millis),
            resources_dir: raw.resources_dir.as_deref().map(|d| config_dir.join(d)),
            system_fonts: raw.system_fonts.unwrap_or(defaults.system_fonts),
            max_live_contexts: raw.max_live_contexts.unwrap_or(defaults.max_live_contexts),
        };
    }
}
