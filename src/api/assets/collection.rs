//! Directory-tree endpoints (`/videos/...`, `/keograms/...`)

use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use axum::extract::State;
use axum::http::header::{CONTENT_LENGTH, CONTENT_RANGE, CONTENT_TYPE, LOCATION, RANGE};
use axum::http::{HeaderMap, HeaderValue, StatusCode, Uri};
use axum::response::{IntoResponse, Response};

use super::body::{open_full, open_range, ranged_headers};
use super::listing::list_directory;
use super::range::{parse_range, RangeRequest};
use super::Collection;
use crate::api::state::AppState;
use crate::error::AssetError;
use crate::types::AssetDescriptor;

/// Axum handler shared by every collection route.
///
/// The first path segment selects the collection; a bare collection name
/// is redirected to its trailing-slash form.
pub async fn collection_handler(
    State(state): State<Arc<AppState>>,
    uri: Uri,
    headers: HeaderMap,
) -> Response {
    let path = uri.path();
    let trimmed = path.trim_start_matches('/');
    let (name, rest) = match trimmed.split_once('/') {
        Some((name, rest)) => (name, Some(rest)),
        None => (trimmed, None),
    };

    let Some(collection) = state.assets.collection(name) else {
        return AssetError::NotFound(PathBuf::from(path)).into_response();
    };
    let Some(rest) = rest else {
        return redirect_with_slash(&uri);
    };

    match serve_collection(collection, rest, &uri, &headers).await {
        Ok(response) => response,
        Err(e) => e.into_response(),
    }
}

/// Serve `encoded_rest` (still percent-encoded) from `collection`
pub async fn serve_collection(
    collection: &Collection,
    encoded_rest: &str,
    uri: &Uri,
    headers: &HeaderMap,
) -> Result<Response, AssetError> {
    let full_path = resolve(&collection.dir, encoded_rest)?;
    tracing::debug!(collection = %collection.name, path = %full_path.display(), "serving from collection");

    let metadata = tokio::fs::metadata(&full_path)
        .await
        .map_err(|e| AssetError::from_io(&full_path, e))?;

    if metadata.is_dir() {
        if !uri.path().ends_with('/') {
            return Ok(redirect_with_slash(uri));
        }
        let html = list_directory(full_path).await?;
        return Ok((
            StatusCode::OK,
            [
                (CONTENT_TYPE, HeaderValue::from_static("text/html")),
                (CONTENT_LENGTH, HeaderValue::from(html.len() as u64)),
            ],
            html,
        )
            .into_response());
    }

    let asset = AssetDescriptor::from_metadata(full_path, &metadata);
    serve_file(&asset, headers).await
}

/// Serve a file, honouring a single-span `Range` header
pub async fn serve_file(asset: &AssetDescriptor, headers: &HeaderMap) -> Result<Response, AssetError> {
    let range = headers
        .get(RANGE)
        .and_then(|value| value.to_str().ok())
        .map(|value| parse_range(value, asset.size))
        .unwrap_or(RangeRequest::Ignored);

    match range {
        RangeRequest::Satisfiable(range) => {
            tracing::debug!(
                path = %asset.path.display(),
                start = range.start,
                end = range.end,
                size = asset.size,
                "range request"
            );
            let body = open_range(asset, range).await?;
            let mut response_headers = ranged_headers(asset, range.len());
            if let Ok(value) = HeaderValue::from_str(&range.content_range(asset.size)) {
                response_headers.insert(CONTENT_RANGE, value);
            }
            Ok((StatusCode::PARTIAL_CONTENT, response_headers, body).into_response())
        }
        RangeRequest::Unsatisfiable => {
            let content_range = format!("bytes */{}", asset.size);
            Ok((
                StatusCode::RANGE_NOT_SATISFIABLE,
                [(CONTENT_RANGE, content_range)],
            )
                .into_response())
        }
        RangeRequest::Ignored => {
            let body = open_full(asset).await?;
            Ok((StatusCode::OK, ranged_headers(asset, asset.size), body).into_response())
        }
    }
}

/// Join a percent-encoded relative path onto `base`, refusing anything
/// that could step outside it
pub fn resolve(base: &Path, encoded_rest: &str) -> Result<PathBuf, AssetError> {
    let decoded = urlencoding::decode(encoded_rest)
        .map_err(|_| AssetError::NotFound(base.join(encoded_rest)))?;

    let mut resolved = base.to_path_buf();
    for component in Path::new(decoded.as_ref()).components() {
        match component {
            Component::Normal(part) => resolved.push(part),
            Component::CurDir => {}
            Component::ParentDir | Component::RootDir | Component::Prefix(_) => {
                return Err(AssetError::NotFound(base.join(decoded.as_ref())));
            }
        }
    }
    Ok(resolved)
}

/// 301 to the same path with a trailing `/`, keeping any query string
fn redirect_with_slash(uri: &Uri) -> Response {
    let location = match uri.query() {
        Some(query) => format!("{}/?{}", uri.path(), query),
        None => format!("{}/", uri.path()),
    };
    (StatusCode::MOVED_PERMANENTLY, [(LOCATION, location)]).into_response()
}
