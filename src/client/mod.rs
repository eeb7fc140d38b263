//! Follower client
//!
//! [`ConnectionManager`] decides what should happen on each connection event;
//! [`Follower`] runs it against a real socket and HTTP client.

mod follower;
mod manager;

pub use follower::{push_channel_url, Activation, Follower, FollowerConfig};
pub use manager::{
    ConnectionManager, ConnectionState, Effect, ReconnectPolicy, DEFAULT_BASE_DELAY,
    DEFAULT_KEEP_ALIVE, DEFAULT_MAX_DELAY, DEFAULT_MAX_RETRIES,
};
