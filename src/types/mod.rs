//! Data types for the live-update subsystem
//!
//! This module contains the wire messages, watched resources and asset
//! descriptors shared by the server and the follower client.

mod asset;
mod event;
mod resource;

pub use asset::{content_type_for, AssetDescriptor};
pub use event::{ClientMessage, ServerMessage, UpdateEvent};
pub use resource::{
    StabilityWindow, WatchTarget, WatchedResource, DEFAULT_POLL_INTERVAL,
    DEFAULT_RETRY_INTERVAL, DEFAULT_STABILITY_THRESHOLD,
};
