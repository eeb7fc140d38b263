//! HTTP server setup with Axum

use std::sync::Arc;

use axum::{routing::get, Router};
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::ServeDir;
use tower_http::trace::{DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, TraceLayer};
use tracing::Level;

use super::assets::{collection_handler, image_handler, image_root_handler};
use super::state::AppState;
use super::websocket::handler::ws_handler;

/// Create the Axum router with all endpoints
pub fn create_router(state: Arc<AppState>) -> Router {
    // Images are embedded cross-origin by the viewer page
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let trace = TraceLayer::new_for_http()
        .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
        .on_request(DefaultOnRequest::new().level(Level::INFO))
        .on_response(DefaultOnResponse::new().level(Level::DEBUG));

    let mut router = Router::new()
        // WebSocket endpoint
        .route("/ws", get(ws_handler))
        // Health check
        .route("/health", get(health_check))
        // Latest image
        .route("/images/", get(image_root_handler))
        .route("/images/*file", get(image_handler));

    for collection in &state.assets.collections {
        let base = format!("/{}", collection.name);
        router = router
            .route(&base, get(collection_handler))
            .route(&format!("{base}/"), get(collection_handler))
            .route(&format!("{base}/*path"), get(collection_handler));
    }

    // Everything else is the front-end
    let frontend = ServeDir::new(&state.assets.static_dir);

    router
        .fallback_service(frontend)
        .layer(trace)
        .layer(cors)
        .with_state(state)
}

/// Health check endpoint
async fn health_check() -> &'static str {
    "OK"
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::assets::{AssetConfig, Collection};
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use std::time::Duration;
    use tower::util::ServiceExt;

    fn state(dir: &std::path::Path) -> Arc<AppState> {
        Arc::new(AppState::new(AssetConfig {
            image_dir: dir.to_path_buf(),
            offline_image: dir.join("offline.jpg"),
            stale_after: Duration::from_secs(600),
            collections: vec![Collection::new("videos", dir.join("videos"))],
            static_dir: dir.to_path_buf(),
        }))
    }

    #[tokio::test]
    async fn test_health_check() {
        let dir = tempfile::tempdir().unwrap();
        let app = create_router(state(dir.path()));

        let response = app
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), 200);
    }

    #[tokio::test]
    async fn test_unknown_path_falls_through_to_frontend() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("index.html"), "<html>viewer</html>").unwrap();
        let app = create_router(state(dir.path()));

        let response = app
            .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_image_root_is_plain_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let app = create_router(state(dir.path()));

        let response = app
            .oneshot(Request::builder().uri("/images/").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        assert_eq!(&body[..], b"Not Found");
    }

    #[tokio::test]
    async fn test_bare_collection_redirects() {
        let dir = tempfile::tempdir().unwrap();
        let app = create_router(state(dir.path()));

        let response = app
            .oneshot(Request::builder().uri("/videos").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::MOVED_PERMANENTLY);
        assert_eq!(response.headers()["location"], "/videos/");
    }
}
