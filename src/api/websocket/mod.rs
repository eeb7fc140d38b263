//! WebSocket push channel for live image updates
//!
//! Provides the `/ws` endpoint. Every stabilized change of the watched image
//! is broadcast as `{"type":"imageUpdate","timestamp":...}` to all open
//! connections.
//!
//! ## Features
//! - Explicitly owned client registry with snapshot broadcasts
//! - Per-connection outbound queue, so a slow socket never stalls the fan-out
//! - `ping` → `pong` keep-alive replies

pub mod broadcaster;
pub mod handler;
pub mod registry;

// Re-export commonly used items
pub use broadcaster::{notify_clients, run_notifier, spawn_notifier};
pub use registry::{ClientConnection, ClientId, ClientRegistry, ReadyState};
