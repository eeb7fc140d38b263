//! Allsky Live Viewer - Follower Entry Point
//!
//! Headless viewer: follows `imageUpdate` pushes and re-downloads the image
//! each time. Send `SIGUSR1` to simulate the viewer becoming visible again.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::Result;
use clap::Parser;
use tokio::sync::mpsc;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use allsky_live::client::{Activation, Follower, FollowerConfig, ReconnectPolicy};

#[derive(Parser, Debug)]
#[command(name = "allsky-follow")]
#[command(about = "Follow live image updates from an allsky server")]
#[command(version)]
struct Args {
    /// Server base URL
    #[arg(long, env = "ALLSKY_SERVER", default_value = "http://localhost:3000")]
    server: String,

    /// Store each fetched image here
    #[arg(short, long, env = "ALLSKY_FOLLOW_OUTPUT")]
    output: Option<PathBuf>,

    /// Reconnect attempts before giving up until re-activation
    #[arg(long, default_value_t = 5)]
    max_retries: u32,

    /// Keep-alive ping interval in seconds
    #[arg(long, default_value_t = 30)]
    keep_alive_secs: u64,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "allsky_live=info,allsky_follow=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let follower = Follower::new(FollowerConfig {
        server: args.server,
        output: args.output,
        policy: ReconnectPolicy {
            max_retries: args.max_retries,
            keep_alive: Duration::from_secs(args.keep_alive_secs),
            ..ReconnectPolicy::default()
        },
    })?;
    tracing::info!(url = follower.ws_url(), "following");

    let (tx, rx) = mpsc::channel(8);
    spawn_signal_forwarders(tx);

    follower.run(rx).await;
    Ok(())
}

fn spawn_signal_forwarders(tx: mpsc::Sender<Activation>) {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::user_defined1()) {
            Ok(mut usr1) => {
                let tx = tx.clone();
                tokio::spawn(async move {
                    while usr1.recv().await.is_some() {
                        if tx.send(Activation::Visible).await.is_err() {
                            break;
                        }
                    }
                });
            }
            Err(e) => tracing::warn!(error = %e, "SIGUSR1 re-activation unavailable"),
        }
    }

    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
        let _ = tx.send(Activation::Shutdown).await;
    });
}
