//! Push-channel wire messages
//!
//! Server → client: `{"type":"imageUpdate","timestamp":<epoch ms>}` and
//! `{"type":"pong"}`. Client → server: `{"type":"ping"}`.

use serde::{Deserialize, Serialize};

use crate::utils::time::epoch_millis;

/// One stabilized change of the watched image, immutable once built
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UpdateEvent {
    /// Epoch milliseconds at which the change was announced
    pub timestamp: i64,
}

impl UpdateEvent {
    /// Stamp a new event with the current wall-clock time
    pub fn now() -> Self {
        Self {
            timestamp: epoch_millis(),
        }
    }

    pub fn to_message(self) -> ServerMessage {
        ServerMessage::ImageUpdate {
            timestamp: self.timestamp,
        }
    }
}

/// Messages the server sends over the push channel
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ServerMessage {
    /// The latest image changed; clients should re-fetch it
    ImageUpdate { timestamp: i64 },

    /// Reply to a client keep-alive
    Pong,
}

/// Messages a client may send over the push channel
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ClientMessage {
    /// Keep-alive heartbeat
    Ping,
}
