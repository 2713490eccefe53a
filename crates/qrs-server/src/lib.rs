//! HTTP server for the QR rendering service.
//!
//! This crate provides an axum HTTP server exposing:
//! - `GET /` liveness text
//! - `GET /health` status and timestamp
//! - `POST /generate` single image (JSON envelope or raw bytes)
//! - `POST /generate-bulk` batch of up to 50 images in one render context
//!
//! # Quick Start
//!
//! ```ignore
//! use qrs_server::{ServerConfig, run_server};
//!
//! #[tokio::main]
//! async fn main() {
//!     let config = ServerConfig {
//!         port: 8080,
//!         ..ServerConfig::default()
//!     };
//!
//!     run_server(config).await.unwrap();
//! }
//! ```
//!
//! # Architecture
//!
//! ```text
//! Client ──HTTP──► axum router (qrs-server)
//!                       │
//!                       ├─► normalize (qrs-render::options)
//!                       │
//!                       └─► QrRenderer
//!                               ├─► ContextManager  acquire / release
//!                               ├─► RenderingBridge  engine on blocking pool + deadline
//!                               └─► encode          MIME + base64 data URI
//! ```

mod app;
mod error;
mod handlers;
mod middleware;
mod state;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use qrs_config::Transport;
use qrs_render::{ContextConfig, ContextManager, QrRenderer, RenderingBridge};
use state::AppState;

pub use error::ServerError;

/// Server configuration.
#[derive(Clone, Debug)]
pub struct ServerConfig {
    /// Host address to bind to.
    pub host: String,
    /// Port to listen on.
    pub port: u16,
    /// Maximum request body in bytes.
    pub body_limit_bytes: usize,
    /// Default `/generate` response transport.
    pub transport: Transport,
    /// Deadline for one render.
    pub render_timeout: Duration,
    /// Engine resources loaded into every render context.
    pub resources_dir: Option<PathBuf>,
    /// Load system fonts into every render context.
    pub system_fonts: bool,
    /// Maximum simultaneously live render contexts.
    pub max_live_contexts: usize,
    /// Application version reported by `/health`.
    pub version: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_owned(),
            port: qrs_config::DEFAULT_PORT,
            body_limit_bytes: qrs_config::DEFAULT_BODY_LIMIT,
            transport: Transport::Json,
            render_timeout: qrs_render::DEFAULT_TIMEOUT,
            resources_dir: None,
            system_fonts: false,
            max_live_contexts: qrs_config::DEFAULT_MAX_LIVE_CONTEXTS,
            version: String::new(),
        }
    }
}

/// Run the server.
///
/// # Arguments
///
/// * `config` - Server configuration
///
/// # Errors
///
/// Returns an error if the server fails to start.
pub async fn run_server(config: ServerConfig) -> Result<(), Box<dyn std::error::Error>> {
    let contexts = ContextManager::new(ContextConfig {
        resources_dir: config.resources_dir.clone(),
        system_fonts: config.system_fonts,
        max_live_contexts: config.max_live_contexts,
    });
    let bridge = RenderingBridge::default().with_timeout(config.render_timeout);

    let state = Arc::new(AppState {
        renderer: QrRenderer::new(contexts, bridge),
        transport: config.transport,
        version: config.version.clone(),
    });

    let app = app::create_router(state, config.body_limit_bytes);

    let listener = tokio::net::TcpListener::bind((config.host.as_str(), config.port)).await?;
    tracing::info!(address = %listener.local_addr()?, "Starting server");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

/// Wait for shutdown signal (Ctrl-C).
async fn shutdown_signal() {
    tokio::signal::ctrl_c()
        .await
        .expect("Failed to install Ctrl+C handler");
    tracing::info!("Shutdown signal received, stopping server...");
}

/// Create server configuration from QRS config.
///
/// # Arguments
///
/// * `config` - Loaded and validated configuration
/// * `version` - Application version
#[must_use]
pub fn server_config_from_qrs_config(config: &qrs_config::Config, version: String) -> ServerConfig {
    let render = &config.render_resolved;
    ServerConfig {
        host: config.server.host.clone(),
        port: config.server.resolved_port(),
        body_limit_bytes: config.server.body_limit_bytes,
        transport: config.server.transport,
        render_timeout: render.timeout,
        resources_dir: render.resources_dir.clone(),
        system_fonts: render.system_fonts,
        max_live_contexts: render.max_live_contexts,
        version,
    }
}
