//! Allsky Live Viewer - Server Entry Point
//!
//! Watches the live image, pushes updates over `/ws` and serves the image,
//! video and keogram assets.

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use allsky_live::api::websocket::spawn_notifier;
use allsky_live::{create_router, AppState, Config, FileWatcher};

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::parse();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| config.default_log_filter().into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let resource = config.watched_resource();
    let cwd = std::env::current_dir().unwrap_or_default();
    tracing::info!(
        mode = config.mode.as_str(),
        cwd = %cwd.display(),
        image_dir = %config.image_dir().display(),
        watched = %resource.path.display(),
        "starting server"
    );

    let state = Arc::new(AppState::new(config.asset_config()));
    let notifier = spawn_notifier(FileWatcher::new(resource).watch(), state.registry.clone());

    let listener = tokio::net::TcpListener::bind(config.listen_addr())
        .await
        .with_context(|| format!("failed to bind {}:{}", config.host, config.port))?;
    tracing::info!(
        addr = %listener.local_addr()?,
        "server ready on http://localhost:{}",
        config.port
    );

    axum::serve(listener, create_router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    notifier.abort();
    tracing::info!("server stopped");
    Ok(())
}

/// Resolves on Ctrl-C, or SIGTERM on unix
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut term) => {
                term.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    tracing::info!("shutdown signal received");
}
