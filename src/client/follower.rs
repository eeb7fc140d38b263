//! Async driver for [`ConnectionManager`]
//!
//! A single `select!` loop owns the socket, the reconnect timer, the
//! keep-alive interval and the activation channel, and carries out the
//! effects the state machine asks for.

use std::collections::VecDeque;
use std::future::{pending, Future};
use std::path::PathBuf;
use std::pin::Pin;
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::time::{Instant, Interval, Sleep};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

use super::manager::{ConnectionManager, Effect, ReconnectPolicy};
use crate::error::ClientError;
use crate::types::ClientMessage;
use crate::utils::atomic_write;

type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Upper bound on the WebSocket handshake
pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Upper bound on one image download
pub const DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(30);

/// Upper bound on the closing handshake during teardown
const CLOSE_TIMEOUT: Duration = Duration::from_secs(2);

/// External lifecycle signals
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Activation {
    /// The viewer became visible again
    Visible,
    /// Tear everything down and stop
    Shutdown,
}

#[derive(Debug, Clone)]
pub struct FollowerConfig {
    /// HTTP base URL of the server, e.g. `http://localhost:3000`
    pub server: String,
    /// Where to store each fetched image, if anywhere
    pub output: Option<PathBuf>,
    pub policy: ReconnectPolicy,
}

enum Input {
    Frame(Option<Result<Message, tokio_tungstenite::tungstenite::Error>>),
    ReconnectDue,
    KeepAlive,
    Signal(Option<Activation>),
}

/// Headless client that follows image updates
#[derive(Debug)]
pub struct Follower {
    config: FollowerConfig,
    ws_url: String,
    manager: ConnectionManager,
    http: reqwest::Client,
}

impl Follower {
    pub fn new(config: FollowerConfig) -> Result<Self, ClientError> {
        let ws_url = push_channel_url(&config.server)?;
        Ok(Self {
            manager: ConnectionManager::new(config.policy),
            config,
            ws_url,
            http: reqwest::Client::builder().timeout(DOWNLOAD_TIMEOUT).build()?,
        })
    }

    pub fn ws_url(&self) -> &str {
        &self.ws_url
    }

    /// Run until an [`Activation::Shutdown`] arrives or the signal channel
    /// closes.
    ///
    /// A shutdown also interrupts a connect attempt or download in flight.
    pub async fn run(mut self, mut signals: mpsc::Receiver<Activation>) {
        let mut socket: Option<Socket> = None;
        let mut reconnect: Option<Pin<Box<Sleep>>> = None;
        let mut keep_alive: Option<Interval> = None;
        let mut held: VecDeque<Activation> = VecDeque::new();
        let mut effects: VecDeque<Effect> = self.manager.mount().into();

        loop {
            while let Some(effect) = effects.pop_front() {
                match effect {
                    Effect::Connect => {
                        close_socket(&mut socket).await;
                        tracing::info!(url = %self.ws_url, "connecting");
                        let connect = tokio::time::timeout(
                            CONNECT_TIMEOUT,
                            tokio_tungstenite::connect_async(self.ws_url.as_str()),
                        );
                        match until_shutdown(connect, &mut signals, &mut held).await {
                            None => {
                                effects.clear();
                                effects.extend(self.manager.teardown());
                            }
                            Some(Ok(Ok((ws, _)))) => {
                                tracing::info!(url = %self.ws_url, "push channel open");
                                socket = Some(ws);
                                effects.extend(self.manager.opened());
                            }
                            Some(Ok(Err(e))) => {
                                tracing::warn!(url = %self.ws_url, error = %e, "connect failed");
                                effects.extend(self.manager.closed());
                            }
                            Some(Err(_)) => {
                                tracing::warn!(
                                    url = %self.ws_url,
                                    timeout = ?CONNECT_TIMEOUT,
                                    "connect timed out"
                                );
                                effects.extend(self.manager.closed());
                            }
                        }
                    }
                    Effect::ScheduleReconnect(delay) => {
                        tracing::info!(
                            delay_ms = delay.as_millis() as u64,
                            attempt = self.manager.retries(),
                            "reconnect scheduled"
                        );
                        reconnect = Some(Box::pin(tokio::time::sleep(delay)));
                    }
                    Effect::CancelReconnect => reconnect = None,
                    Effect::StartKeepAlive(period) => {
                        keep_alive = Some(tokio::time::interval_at(Instant::now() + period, period));
                    }
                    Effect::StopKeepAlive => keep_alive = None,
                    Effect::RefreshImage => {
                        match until_shutdown(self.refresh_image(), &mut signals, &mut held).await {
                            None => {
                                effects.clear();
                                effects.extend(self.manager.teardown());
                            }
                            Some(Err(e)) => tracing::warn!(error = %e, "image refresh failed"),
                            Some(Ok(())) => {}
                        }
                    }
                    Effect::Close => close_socket(&mut socket).await,
                    Effect::RetriesExhausted => {
                        tracing::warn!(
                            retries = self.manager.retries(),
                            "retries exhausted, waiting for re-activation"
                        );
                    }
                }
            }

            if self.manager.is_torn_down() {
                tracing::info!("follower stopped");
                return;
            }

            let input = if let Some(activation) = held.pop_front() {
                Input::Signal(Some(activation))
            } else {
                tokio::select! {
                    frame = next_frame(&mut socket) => Input::Frame(frame),
                    _ = sleep_until_due(&mut reconnect) => Input::ReconnectDue,
                    _ = tick(&mut keep_alive) => Input::KeepAlive,
                    signal = signals.recv(), if self.manager.is_listening() => Input::Signal(signal),
                }
            };

            match input {
                Input::Frame(Some(Ok(Message::Text(text)))) => {
                    effects.extend(self.manager.message(&text));
                }
                Input::Frame(Some(Ok(Message::Close(_)))) | Input::Frame(None) => {
                    tracing::info!("push channel closed");
                    socket = None;
                    effects.extend(self.manager.closed());
                }
                Input::Frame(Some(Ok(_))) => {}
                Input::Frame(Some(Err(e))) => {
                    tracing::warn!(error = %e, "push channel error");
                    socket = None;
                    effects.extend(self.manager.closed());
                }
                Input::ReconnectDue => {
                    reconnect = None;
                    effects.extend(self.manager.reconnect_due());
                }
                Input::KeepAlive => {
                    if let Err(e) = send_ping(&mut socket).await {
                        tracing::warn!(error = %e, "keep-alive failed");
                        socket = None;
                        effects.extend(self.manager.closed());
                    }
                }
                Input::Signal(Some(Activation::Visible)) => {
                    tracing::debug!("re-activated");
                    effects.extend(self.manager.visible());
                }
                Input::Signal(Some(Activation::Shutdown)) | Input::Signal(None) => {
                    effects.extend(self.manager.teardown());
                }
            }
        }
    }

    /// Fetch the cache-busted image and store it if an output is configured
    async fn refresh_image(&self) -> Result<(), ClientError> {
        let url = self.manager.image_url(&self.config.server);
        let bytes = self
            .http
            .get(&url)
            .send()
            .await?
            .error_for_status()?
            .bytes()
            .await?;
        tracing::info!(url = %url, bytes = bytes.len(), "image refreshed");

        if let Some(output) = &self.config.output {
            atomic_write(output, &bytes).await?;
        }
        Ok(())
    }
}

/// Drive `work` to completion unless a shutdown arrives first.
///
/// Re-activations seen meanwhile are held for the main loop. Returns `None`
/// when the work was abandoned.
async fn until_shutdown<F>(
    work: F,
    signals: &mut mpsc::Receiver<Activation>,
    held: &mut VecDeque<Activation>,
) -> Option<F::Output>
where
    F: Future,
{
    tokio::pin!(work);
    loop {
        tokio::select! {
            output = &mut work => return Some(output),
            signal = signals.recv() => match signal {
                Some(Activation::Visible) => held.push_back(Activation::Visible),
                Some(Activation::Shutdown) | None => return None,
            },
        }
    }
}

/// `http(s)://host[:port]` → `ws(s)://host[:port]/ws`
pub fn push_channel_url(server: &str) -> Result<String, ClientError> {
    let server = server.trim_end_matches('/');
    if let Some(rest) = server.strip_prefix("http://") {
        Ok(format!("ws://{rest}/ws"))
    } else if let Some(rest) = server.strip_prefix("https://") {
        Ok(format!("wss://{rest}/ws"))
    } else {
        Err(ClientError::InvalidUrl(server.to_string()))
    }
}

async fn next_frame(
    socket: &mut Option<Socket>,
) -> Option<Result<Message, tokio_tungstenite::tungstenite::Error>> {
    match socket {
        Some(ws) => ws.next().await,
        None => pending().await,
    }
}

async fn sleep_until_due(reconnect: &mut Option<Pin<Box<Sleep>>>) {
    match reconnect {
        Some(sleep) => sleep.as_mut().await,
        None => pending().await,
    }
}

async fn tick(keep_alive: &mut Option<Interval>) {
    match keep_alive {
        Some(interval) => {
            interval.tick().await;
        }
        None => pending().await,
    }
}

async fn send_ping(socket: &mut Option<Socket>) -> Result<(), ClientError> {
    let Some(ws) = socket.as_mut() else {
        return Ok(());
    };
    let ping = serde_json::to_string(&ClientMessage::Ping).unwrap_or_default();
    ws.send(Message::Text(ping)).await?;
    Ok(())
}

async fn close_socket(socket: &mut Option<Socket>) {
    if let Some(mut ws) = socket.take() {
        match tokio::time::timeout(CLOSE_TIMEOUT, ws.close(None)).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => tracing::debug!(error = %e, "error while closing push channel"),
            Err(_) => tracing::debug!("push channel close timed out"),
        }
    }
}
