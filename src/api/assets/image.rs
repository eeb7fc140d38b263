//! Latest-image endpoint: `GET /images/<filename>`

use std::path::Path;
use std::sync::Arc;

use axum::extract::{Path as UrlPath, State};
use axum::http::header::IF_MODIFIED_SINCE;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};

use super::body::{no_cache_headers, open_full};
use super::AssetConfig;
use crate::api::state::AppState;
use crate::error::AssetError;
use crate::types::AssetDescriptor;
use crate::utils::time::{age, parse_http_date, truncate_to_secs};

/// Every image, including the offline fallback, is served as JPEG
const IMAGE_CONTENT_TYPE: &str = "image/jpeg";

/// Axum handler for `/images/*file`
pub async fn image_handler(
    State(state): State<Arc<AppState>>,
    UrlPath(file): UrlPath<String>,
    headers: HeaderMap,
) -> Response {
    match serve_image(&state.assets, &file, &headers).await {
        Ok(response) => response,
        Err(e) => e.into_response(),
    }
}

/// Axum handler for `/images/`, which names no file
pub async fn image_root_handler(State(state): State<Arc<AppState>>) -> Response {
    AssetError::NotFound(state.assets.image_dir.clone()).into_response()
}

/// Resolve and serve an image from the image directory.
///
/// Only the last segment of `requested` is used as the file name. A source
/// older than the staleness threshold is replaced by the offline image.
pub async fn serve_image(
    config: &AssetConfig,
    requested: &str,
    headers: &HeaderMap,
) -> Result<Response, AssetError> {
    let filename = requested.rsplit('/').next().unwrap_or_default();
    let path = config.image_dir.join(filename);
    if matches!(filename, "" | "." | "..") {
        return Err(AssetError::NotFound(path));
    }
    tracing::debug!(path = %path.display(), "serving image");

    let asset = describe(&path).await?;

    let image_age = age(asset.modified);
    if image_age > config.stale_after {
        tracing::info!(
            path = %asset.path.display(),
            age_ms = image_age.as_millis() as u64,
            fallback = %config.offline_image.display(),
            "image is too old, serving offline image"
        );
        return serve_offline(config).await;
    }

    if let Some(since) = if_modified_since(headers) {
        if truncate_to_secs(asset.modified) <= since {
            tracing::debug!(path = %asset.path.display(), "image not modified");
            return Ok(StatusCode::NOT_MODIFIED.into_response());
        }
    }

    let body = open_full(&asset).await?;
    Ok((StatusCode::OK, no_cache_headers(&asset), body).into_response())
}

/// Serve the configured offline image with the normal header set
async fn serve_offline(config: &AssetConfig) -> Result<Response, AssetError> {
    let asset = describe(&config.offline_image).await.map_err(|e| {
        tracing::error!(path = %config.offline_image.display(), error = %e, "offline image unavailable");
        e
    })?;
    let body = open_full(&asset).await?;
    Ok((StatusCode::OK, no_cache_headers(&asset), body).into_response())
}

async fn describe(path: &Path) -> Result<AssetDescriptor, AssetError> {
    let metadata = tokio::fs::metadata(path)
        .await
        .map_err(|e| AssetError::from_io(path, e))?;
    if !metadata.is_file() {
        return Err(AssetError::NotFound(path.to_path_buf()));
    }
    Ok(AssetDescriptor::with_content_type(
        path.to_path_buf(),
        &metadata,
        IMAGE_CONTENT_TYPE,
    ))
}

fn if_modified_since(headers: &HeaderMap) -> Option<std::time::SystemTime> {
    headers
        .get(IF_MODIFIED_SINCE)
        .and_then(|value| value.to_str().ok())
        .and_then(parse_http_date)
}
