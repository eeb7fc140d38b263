//! WebSocket connection handler

use std::sync::Arc;

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::Response,
};
use futures::{SinkExt, StreamExt};
use tokio_stream::wrappers::UnboundedReceiverStream;

use super::registry::{ClientConnection, ClientRegistry, ReadyState};
use crate::api::state::AppState;
use crate::types::{ClientMessage, ServerMessage};

/// Why a connection loop ended
#[derive(Debug)]
enum Disconnect {
    Closed,
    WriteFailed,
    Error(axum::Error),
}

/// WebSocket upgrade handler
pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<Arc<AppState>>) -> Response {
    let registry = state.registry.clone();
    ws.on_upgrade(move |socket| handle_socket(socket, registry))
}

/// Handle an individual WebSocket connection
async fn handle_socket(socket: WebSocket, registry: Arc<ClientRegistry>) {
    let (conn, outbound) = registry.connect();
    let (mut sink, mut stream) = socket.split();

    conn.set_state(ReadyState::Open);
    registry.register(conn.clone());
    tracing::info!(client = conn.id(), clients = registry.len(), "client connected");

    // Drain the connection queue into the socket
    let mut writer = tokio::spawn(async move {
        let mut outbound = UnboundedReceiverStream::new(outbound)
            .map(|text| Ok::<_, axum::Error>(Message::Text(text.to_string())));
        sink.send_all(&mut outbound).await
    });

    let outcome = loop {
        tokio::select! {
            _ = &mut writer => break Disconnect::WriteFailed,
            msg = stream.next() => match msg {
                Some(Ok(Message::Text(text))) => handle_client_text(&conn, &text),
                Some(Ok(Message::Close(_))) | None => break Disconnect::Closed,
                // tungstenite answers protocol pings itself
                Some(Ok(_)) => {}
                Some(Err(e)) => break Disconnect::Error(e),
            },
        }
    };

    conn.set_state(ReadyState::Closing);
    registry.unregister(conn.id());
    writer.abort();
    conn.set_state(ReadyState::Closed);

    match outcome {
        Disconnect::Closed => {
            tracing::info!(client = conn.id(), clients = registry.len(), "client disconnected");
        }
        Disconnect::WriteFailed => {
            tracing::warn!(client = conn.id(), clients = registry.len(), "client write failed, dropped");
        }
        Disconnect::Error(e) => {
            tracing::error!(client = conn.id(), clients = registry.len(), error = %e, "websocket error");
        }
    }
}

/// Handle a text frame from the client
fn handle_client_text(conn: &ClientConnection, text: &str) {
    match serde_json::from_str::<ClientMessage>(text) {
        Ok(ClientMessage::Ping) => {
            if let Ok(json) = serde_json::to_string(&ServerMessage::Pong) {
                conn.send(json.into());
            }
        }
        Err(_) => {
            tracing::debug!(client = conn.id(), "ignoring unrecognized client message");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ping_is_answered_with_pong() {
        let registry = ClientRegistry::new();
        let (conn, mut rx) = registry.connect();

        handle_client_text(&conn, r#"{"type":"ping"}"#);

        assert_eq!(&*rx.try_recv().unwrap(), r#"{"type":"pong"}"#);
    }

    #[test]
    fn test_garbage_is_ignored() {
        let registry = ClientRegistry::new();
        let (conn, mut rx) = registry.connect();

        handle_client_text(&conn, "not json");
        handle_client_text(&conn, r#"{"type":"subscribe"}"#);

        assert!(rx.try_recv().is_err());
    }
}
