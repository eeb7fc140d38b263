//! End-to-end tests for the `/ws` push channel

use std::sync::Arc;
use std::time::{Duration, SystemTime};

use futures::{SinkExt, Stream, StreamExt};
use tokio_tungstenite::tungstenite::Message;

use allsky_live::api::assets::AssetConfig;
use allsky_live::api::websocket::notify_clients;
use allsky_live::{create_router, AppState, ServerMessage, StabilizedChange};

async fn start_server() -> (String, Arc<AppState>) {
    let dir = std::env::temp_dir();
    let state = Arc::new(AppState::new(AssetConfig {
        image_dir: dir.clone(),
        offline_image: dir.join("offline.jpg"),
        stale_after: Duration::from_secs(600),
        collections: Vec::new(),
        static_dir: dir,
    }));

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let app = create_router(state.clone());
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    (format!("ws://{addr}/ws"), state)
}

async fn wait_for_clients(state: &AppState, expected: usize) {
    for _ in 0..200 {
        if state.registry.len() == expected {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!(
        "expected {expected} registered clients, found {}",
        state.registry.len()
    );
}

fn change() -> StabilizedChange {
    StabilizedChange {
        path: "latest.jpg".into(),
        modified: SystemTime::now(),
    }
}

async fn next_text<S>(socket: &mut S) -> String
where
    S: Stream<Item = Result<Message, tokio_tungstenite::tungstenite::Error>> + Unpin,
{
    loop {
        let frame = tokio::time::timeout(Duration::from_secs(5), socket.next())
            .await
            .expect("timed out waiting for a frame")
            .expect("socket closed")
            .unwrap();
        if let Message::Text(text) = frame {
            return text;
        }
    }
}

#[tokio::test]
async fn test_broadcast_reaches_every_open_client_once() {
    let (url, state) = start_server().await;
    let (mut first, _) = tokio_tungstenite::connect_async(url.as_str()).await.unwrap();
    let (mut second, _) = tokio_tungstenite::connect_async(url.as_str()).await.unwrap();
    wait_for_clients(&state, 2).await;

    assert_eq!(notify_clients(&state.registry, &change()), 2);

    for socket in [&mut first, &mut second] {
        let text = next_text(socket).await;
        let message: ServerMessage = serde_json::from_str(&text).unwrap();
        assert!(matches!(message, ServerMessage::ImageUpdate { .. }));
    }

    let extra = tokio::time::timeout(Duration::from_millis(200), first.next()).await;
    assert!(extra.is_err(), "client received a duplicate update");
}

#[tokio::test]
async fn test_ping_gets_pong() {
    let (url, state) = start_server().await;
    let (mut socket, _) = tokio_tungstenite::connect_async(url.as_str()).await.unwrap();
    wait_for_clients(&state, 1).await;

    socket
        .send(Message::Text(r#"{"type":"ping"}"#.to_string()))
        .await
        .unwrap();

    assert_eq!(next_text(&mut socket).await, r#"{"type":"pong"}"#);
}

#[tokio::test]
async fn test_closed_client_is_unregistered() {
    let (url, state) = start_server().await;
    let (mut leaving, _) = tokio_tungstenite::connect_async(url.as_str()).await.unwrap();
    let (mut staying, _) = tokio_tungstenite::connect_async(url.as_str()).await.unwrap();
    wait_for_clients(&state, 2).await;

    leaving.close(None).await.unwrap();
    wait_for_clients(&state, 1).await;

    assert_eq!(notify_clients(&state.registry, &change()), 1);
    let text = next_text(&mut staying).await;
    assert!(text.starts_with(r#"{"type":"imageUpdate","timestamp":"#));
}
