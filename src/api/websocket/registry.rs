//! Registry of connected push channels
//!
//! One [`ClientConnection`] per accepted WebSocket. The registry is owned
//! explicitly (shared through `AppState`), never held as ambient state.
//! Broadcasts iterate a snapshot taken under a short read lock, so
//! concurrent register/unregister calls cannot disturb an ongoing fan-out.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, AtomicU8, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;
use tokio::sync::mpsc;

use crate::types::ServerMessage;

/// Unique id of a connection, allocated in connect order
pub type ClientId = u64;

/// Readiness of a push channel
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ReadyState {
    Connecting = 0,
    Open = 1,
    Closing = 2,
    Closed = 3,
}

impl ReadyState {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => ReadyState::Connecting,
            1 => ReadyState::Open,
            2 => ReadyState::Closing,
            _ => ReadyState::Closed,
        }
    }
}

/// Outbound half of a push channel
#[derive(Debug)]
pub struct ClientConnection {
    id: ClientId,
    state: AtomicU8,
    outbound: mpsc::UnboundedSender<Arc<str>>,
}

impl ClientConnection {
    pub fn new(id: ClientId, outbound: mpsc::UnboundedSender<Arc<str>>) -> Self {
        Self {
            id,
            state: AtomicU8::new(ReadyState::Connecting as u8),
            outbound,
        }
    }

    pub fn id(&self) -> ClientId {
        self.id
    }

    pub fn state(&self) -> ReadyState {
        ReadyState::from_u8(self.state.load(Ordering::Acquire))
    }

    pub fn set_state(&self, state: ReadyState) {
        self.state.store(state as u8, Ordering::Release);
    }

    pub fn is_open(&self) -> bool {
        self.state() == ReadyState::Open
    }

    /// Queue a serialized message; false when the writer side is gone
    pub fn send(&self, text: Arc<str>) -> bool {
        self.outbound.send(text).is_ok()
    }
}

/// In-memory set of connected clients
#[derive(Debug, Default)]
pub struct ClientRegistry {
    next_id: AtomicU64,
    clients: RwLock<BTreeMap<ClientId, Arc<ClientConnection>>>,
}

impl ClientRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate a new connection in the `Connecting` state, together with
    /// the receiving end of its outbound queue. It is not registered yet.
    pub fn connect(&self) -> (Arc<ClientConnection>, mpsc::UnboundedReceiver<Arc<str>>) {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = mpsc::unbounded_channel();
        (Arc::new(ClientConnection::new(id, tx)), rx)
    }

    /// Add a connection; called when its channel opens
    pub fn register(&self, connection: Arc<ClientConnection>) {
        self.clients.write().insert(connection.id(), connection);
    }

    /// Remove a connection; called on close or error. Safe to repeat.
    pub fn unregister(&self, id: ClientId) -> bool {
        self.clients.write().remove(&id).is_some()
    }

    pub fn contains(&self, id: ClientId) -> bool {
        self.clients.read().contains_key(&id)
    }

    /// Copy of the current membership, in registration order
    pub fn snapshot(&self) -> Vec<Arc<ClientConnection>> {
        self.clients.read().values().cloned().collect()
    }

    /// Send `message` to every open connection.
    ///
    /// Connections that are not open are skipped; they remove themselves
    /// through their own close handling. Returns how many connections the
    /// message was queued for.
    pub fn broadcast(&self, message: &ServerMessage) -> usize {
        let text: Arc<str> = match serde_json::to_string(message) {
            Ok(json) => json.into(),
            Err(e) => {
                tracing::error!(error = %e, "failed to serialize broadcast message");
                return 0;
            }
        };

        let mut delivered = 0;
        for client in self.snapshot() {
            if !client.is_open() {
                continue;
            }
            if client.send(text.clone()) {
                delivered += 1;
            } else {
                tracing::debug!(client = client.id(), "skipping client with closed queue");
            }
        }
        delivered
    }

    pub fn len(&self) -> usize {
        self.clients.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.clients.read().is_empty()
    }
}
