//! healthgate
//!
//! Serves a health check endpoint in front of a small demo application.
//!
//! # Architecture Overview
//!
//! ```text
//!     Client Request
//!     ──────────────▶ TraceLayer ─▶ Timeout ─▶ RequestId ─┬─▶ /healthcheck ─▶ HealthEngine
//!                                                          │                   │
//!                                                          │                   ▼
//!                                                          │           backends, in order
//!                                                          │      (disable_by_file, ldap_bind, ...)
//!                                                          │
//!                                                          └─▶ anything else ─▶ demo application
//! ```

use std::path::PathBuf;

use axum::{routing::get, Router};
use clap::Parser;
use tokio::net::TcpListener;
use tokio::sync::mpsc;

use healthgate::config::{load_config, watcher::ConfigWatcher, AppConfig};
use healthgate::lifecycle::{signals, Shutdown};
use healthgate::observability::{logging, metrics};
use healthgate::HttpServer;

#[derive(Parser)]
#[command(name = "healthgate")]
#[command(about = "Runs a basic HTTP server to show healthcheck functionality", long_about = None)]
struct Cli {
    /// TOML configuration file. Defaults apply when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Port to listen on, overriding listener.bind_address.
    #[arg(short, long)]
    port: Option<u16>,

    /// Reload health checks when the configuration file changes.
    #[arg(long, requires = "config")]
    watch: bool,
}

/// Command line values win over the file, on startup and on every reload.
fn override_port(config: &mut AppConfig, port: Option<u16>) {
    if let Some(port) = port {
        config.listener.bind_address = format!("0.0.0.0:{}", port);
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => load_config(path)?,
        None => AppConfig::default(),
    };
    override_port(&mut config, cli.port);

    logging::init_logging(&config.observability)?;
    tracing::info!("healthgate v{} starting", env!("CARGO_PKG_VERSION"));
    tracing::debug!(config = ?config, "Configuration loaded");

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr)?,
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    tracing::info!(address = %listener.local_addr()?, "Serving");

    // The watcher handle must outlive the server.
    let (updates, config_updates) = mpsc::unbounded_channel();
    let _watcher = match (&cli.config, cli.watch) {
        (Some(path), true) => {
            let (watcher, mut reloaded) = ConfigWatcher::new(path);
            let handle = watcher.start()?;
            let port = cli.port;
            tokio::spawn(async move {
                while let Some(mut config) = reloaded.recv().await {
                    override_port(&mut config, port);
                    if updates.send(config).is_err() {
                        break;
                    }
                }
            });
            Some(handle)
        }
        _ => None,
    };

    let shutdown = Shutdown::new();
    signals::spawn_signal_listener(shutdown.clone());

    HttpServer::new(config)
        .with_application(demo_application())
        .run(listener, config_updates, shutdown.subscribe())
        .await?;

    tracing::info!("Shutdown complete");
    Ok(())
}

fn demo_application() -> Router {
    Router::new().route("/", get(|| async { "healthgate demo application\n" }))
}
