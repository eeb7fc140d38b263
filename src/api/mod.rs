//! API module for HTTP and WebSocket endpoints
//!
//! This module provides the asset server and the WebSocket push channel for
//! the live viewer.

pub mod assets;
pub mod http;
pub mod state;
pub mod websocket;

pub use http::create_router;
pub use state::AppState;
