//! Client-side connection state machine
//!
//! Pure: every input returns the [`Effect`]s the caller must carry out
//! (open a socket, arm a timer, refetch the image...). This keeps the
//! reconnect policy testable without sockets or clocks.

use std::time::Duration;

use crate::types::ServerMessage;

pub const DEFAULT_MAX_RETRIES: u32 = 5;
pub const DEFAULT_BASE_DELAY: Duration = Duration::from_millis(1000);
pub const DEFAULT_MAX_DELAY: Duration = Duration::from_millis(30_000);
pub const DEFAULT_KEEP_ALIVE: Duration = Duration::from_secs(30);

/// Reconnect and heartbeat tuning
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconnectPolicy {
    pub max_retries: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
    pub keep_alive: Duration,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
            base_delay: DEFAULT_BASE_DELAY,
            max_delay: DEFAULT_MAX_DELAY,
            keep_alive: DEFAULT_KEEP_ALIVE,
        }
    }
}

impl ReconnectPolicy {
    /// `min(base * 2^attempt, max)`
    pub fn backoff(&self, attempt: u32) -> Duration {
        let factor = 1u32.checked_shl(attempt).unwrap_or(u32::MAX);
        self.base_delay.saturating_mul(factor).min(self.max_delay)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Open,
    /// Retries exhausted or torn down; only re-activation reconnects
    ClosedPermanently,
}

/// Side effects requested by the state machine
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    Connect,
    ScheduleReconnect(Duration),
    CancelReconnect,
    StartKeepAlive(Duration),
    StopKeepAlive,
    /// Re-fetch the image through its cache-busted URL
    RefreshImage,
    Close,
    /// Retry budget used up; nothing happens until re-activation
    RetriesExhausted,
}

#[derive(Debug)]
pub struct ConnectionManager {
    policy: ReconnectPolicy,
    state: ConnectionState,
    retries: u32,
    last_update: Option<i64>,
    listening: bool,
    torn_down: bool,
}

impl ConnectionManager {
    pub fn new(policy: ReconnectPolicy) -> Self {
        Self {
            policy,
            state: ConnectionState::Disconnected,
            retries: 0,
            last_update: None,
            listening: false,
            torn_down: false,
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn retries(&self) -> u32 {
        self.retries
    }

    pub fn last_update(&self) -> Option<i64> {
        self.last_update
    }

    /// Whether re-activation events are being listened for
    pub fn is_listening(&self) -> bool {
        self.listening
    }

    pub fn is_torn_down(&self) -> bool {
        self.torn_down
    }

    /// Initial connect, and start listening for re-activation
    pub fn mount(&mut self) -> Vec<Effect> {
        if self.torn_down {
            return Vec::new();
        }
        self.listening = true;
        self.state = ConnectionState::Connecting;
        vec![Effect::Connect]
    }

    /// Handshake succeeded
    pub fn opened(&mut self) -> Vec<Effect> {
        if self.state != ConnectionState::Connecting {
            return Vec::new();
        }
        self.state = ConnectionState::Open;
        self.retries = 0;
        vec![Effect::StartKeepAlive(self.policy.keep_alive)]
    }

    /// The channel closed or errored, or a connect attempt failed
    pub fn closed(&mut self) -> Vec<Effect> {
        if !matches!(
            self.state,
            ConnectionState::Connecting | ConnectionState::Open
        ) {
            return Vec::new();
        }

        let mut effects = vec![Effect::StopKeepAlive];
        if self.retries < self.policy.max_retries {
            let delay = self.policy.backoff(self.retries);
            self.retries += 1;
            self.state = ConnectionState::Disconnected;
            effects.push(Effect::ScheduleReconnect(delay));
        } else {
            self.state = ConnectionState::ClosedPermanently;
            effects.push(Effect::RetriesExhausted);
        }
        effects
    }

    /// A scheduled reconnect timer fired
    pub fn reconnect_due(&mut self) -> Vec<Effect> {
        if self.state != ConnectionState::Disconnected {
            return Vec::new();
        }
        self.state = ConnectionState::Connecting;
        vec![Effect::Connect]
    }

    /// The view became visible again: the image may be stale, and a dead
    /// connection is retried immediately with a fresh retry budget
    pub fn visible(&mut self) -> Vec<Effect> {
        if self.torn_down {
            return Vec::new();
        }
        let mut effects = vec![Effect::RefreshImage];
        if matches!(
            self.state,
            ConnectionState::Disconnected | ConnectionState::ClosedPermanently
        ) {
            self.retries = 0;
            self.state = ConnectionState::Connecting;
            effects.push(Effect::CancelReconnect);
            effects.push(Effect::Connect);
        }
        effects
    }

    /// A text frame arrived from the server
    pub fn message(&mut self, text: &str) -> Vec<Effect> {
        match serde_json::from_str::<ServerMessage>(text) {
            Ok(ServerMessage::ImageUpdate { timestamp }) => {
                self.last_update = Some(timestamp);
                vec![Effect::RefreshImage]
            }
            Ok(ServerMessage::Pong) => Vec::new(),
            Err(_) => {
                tracing::debug!("ignoring unrecognized server message");
                Vec::new()
            }
        }
    }

    /// Release everything, whatever the current state
    pub fn teardown(&mut self) -> Vec<Effect> {
        self.torn_down = true;
        self.listening = false;
        self.state = ConnectionState::ClosedPermanently;
        vec![Effect::Close, Effect::CancelReconnect, Effect::StopKeepAlive]
    }

    /// Image URL with the last update timestamp appended to defeat caches
    pub fn image_url(&self, base: &str) -> String {
        let base = base.trim_end_matches('/');
        match self.last_update {
            Some(ts) => format!("{base}/images/latest.jpg?t={ts}"),
            None => format!("{base}/images/latest.jpg"),
        }
    }
}

impl Default for ConnectionManager {
    fn default() -> Self {
        Self::new(ReconnectPolicy::default())
    }
}
