//! Allsky Live Viewer
//!
//! Serves the newest frame from an all-sky camera and tells connected
//! viewers the moment a new one has been fully written.
//!
//! # Features
//!
//! - **Stabilized file watching**: a write burst yields one change, after the
//!   file has stopped growing
//! - **WebSocket push**: every open viewer gets an `imageUpdate` message
//! - **Asset serving**: conditional requests for the live image with an
//!   offline fallback, byte ranges and directory indexes for videos and
//!   keograms
//! - **Follower client**: reconnecting headless viewer with backoff
//!
//! # Modules
//!
//! - `types`: Wire messages, watched resources and asset descriptors
//! - `watcher`: Filesystem subscription and write stabilization
//! - `api`: HTTP router, asset handlers and the push channel
//! - `client`: Connection state machine and follower driver
//! - `config`: Command-line and environment configuration
//! - `error`: Error types
//! - `utils`: Time helpers
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use allsky_live::api::websocket::spawn_notifier;
//! use allsky_live::{create_router, AppState, FileWatcher, WatchedResource};
//! use allsky_live::api::assets::AssetConfig;
//!
//! # async fn run(assets: AssetConfig) -> std::io::Result<()> {
//! let state = Arc::new(AppState::new(assets));
//! let watcher = FileWatcher::new(WatchedResource::file("public/latest.jpg"));
//! spawn_notifier(watcher.watch(), state.registry.clone());
//!
//! let listener = tokio::net::TcpListener::bind("0.0.0.0:3000").await?;
//! axum::serve(listener, create_router(state)).await
//! # }
//! ```

pub mod api;
pub mod client;
pub mod config;
pub mod error;
pub mod types;
pub mod utils;
pub mod watcher;

// Re-export commonly used items at crate root
pub use api::{create_router, AppState};
pub use client::{ConnectionManager, Follower, FollowerConfig, ReconnectPolicy};
pub use config::{Config, RuntimeMode};
pub use error::{AssetError, ClientError, WatchError};
pub use types::{ServerMessage, UpdateEvent, WatchedResource};
pub use watcher::{FileWatcher, StabilizedChange};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name
pub const NAME: &str = env!("CARGO_PKG_NAME");
