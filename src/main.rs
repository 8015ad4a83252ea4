//! rendershot server
//!
//! Serves WebGL-aware screenshots over HTTP.

use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use rendershot::handlers::{self, AppState};
use rendershot::shutdown::shutdown_signal;
use rendershot::{Args, BrowserManager, CaptureService};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let config = args.into_config()?;

    // Initialize tracing
    let filter = if config.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    let subscriber = tracing_subscriber::fmt().with_env_filter(filter);
    if config.log_json {
        subscriber.json().init();
    } else {
        subscriber.init();
    }

    tracing::info!(
        "rendershot {} starting on {} ({:?} mode)",
        rendershot::VERSION,
        config.addr,
        config.launch.mode
    );

    let manager = Arc::new(BrowserManager::new(config.launch.clone()));
    manager.start();

    let service = Arc::new(CaptureService::new(manager.clone(), config.settings.clone()));
    let app = handlers::router(AppState::new(service.clone()));

    let listener = tokio::net::TcpListener::bind(config.addr)
        .await
        .with_context(|| format!("failed to bind {}", config.addr))?;
    tracing::info!("Listening on {}", config.addr);

    let draining = service.clone();
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            shutdown_signal().await;
            draining.begin_shutdown();
        })
        .await
        .context("HTTP server exited unexpectedly")?;

    manager.shutdown().await;
    tracing::info!("rendershot stopped");
    Ok(())
}
