//! formcheck-ai - Video form analysis service
//!
//! Serves the job, analysis and overlay API on port 5760 by default and talks
//! to the remote AI analyzer configured by `--analyzer-url`.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use formcheck_common::config::{load_toml_config, resolve_config_path, TomlConfig};
use formcheck_common::events::EventBus;
use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use formcheck_ai::config::{CliOverrides, ServiceConfig, ENV_LOG_LEVEL};
use formcheck_ai::services::HttpAnalyzerClient;
use formcheck_ai::AppState;

const SERVICE_NAME: &str = "formcheck-ai";

/// Command-line arguments for formcheck-ai
#[derive(Parser, Debug)]
#[command(name = "formcheck-ai")]
#[command(about = "Video form analysis service")]
#[command(version)]
struct Args {
    /// Port to listen on
    #[arg(short, long)]
    port: Option<u16>,

    /// Base URL of the remote AI analyzer
    #[arg(short, long)]
    analyzer_url: Option<String>,

    /// Config file (TOML)
    #[arg(short, long, env = "FORMCHECK_CONFIG")]
    config: Option<PathBuf>,

    /// Log filter, e.g. "debug" or "formcheck_ai=trace"
    #[arg(long)]
    log_level: Option<String>,

    /// Payloads up to this many bytes are submitted inline in auto mode
    #[arg(long)]
    inline_max_bytes: Option<u64>,

    /// Hide the analytics panel next to the caption
    #[arg(long)]
    no_analytics_panel: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config_path = resolve_config_path(args.config.as_deref(), SERVICE_NAME);
    let (toml_config, config_error) = match config_path.as_deref() {
        Some(path) => match load_toml_config(path) {
            Ok(config) => (config, None),
            Err(e) => (TomlConfig::default(), Some(format!("{}: {}", path.display(), e))),
        },
        None => (TomlConfig::default(), None),
    };

    let log_level = args
        .log_level
        .clone()
        .or_else(|| std::env::var(ENV_LOG_LEVEL).ok())
        .or_else(|| toml_config.logging.level.clone())
        .unwrap_or_else(|| "info".to_string());

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .or_else(|_| tracing_subscriber::EnvFilter::try_new(&log_level))
                .unwrap_or_else(|_| "formcheck_ai=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting formcheck-ai (Video Form Analysis)");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));
    match (&config_path, &config_error) {
        (_, Some(e)) => warn!("Ignoring config file {}", e),
        (Some(path), None) => info!("Config: {}", path.display()),
        (None, None) => info!("Config: compiled defaults"),
    }

    let cli = CliOverrides {
        port: args.port,
        analyzer_url: args.analyzer_url.clone(),
        log_level: Some(log_level),
        inline_max_bytes: args.inline_max_bytes,
        include_analytics_panel: args.no_analytics_panel.then_some(false),
    };
    let config = ServiceConfig::resolve(&cli, &toml_config).context("Invalid configuration")?;

    let client = HttpAnalyzerClient::new(config.analyzer_url.clone())
        .context("Failed to build analyzer client")?;
    info!("Analyzer: {}", client.base_url());

    let event_bus = EventBus::new(256);
    let state = AppState::new(
        Arc::new(client),
        config.orchestrator.clone(),
        config.overlay.clone(),
        event_bus,
    );

    let app = formcheck_ai::build_router(state.clone());

    let addr = SocketAddr::from(([127, 0, 0, 1], config.port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;
    info!("Listening on http://{}", addr);
    info!("Health check: http://{}/health", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    state.shutdown().await;
    info!("Server shutdown complete");
    Ok(())
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C, shutting down"),
        _ = terminate => info!("Received terminate signal, shutting down"),
    }
}
