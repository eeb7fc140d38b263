//! Streaming file bodies and the header sets shared by file responses

use std::io::SeekFrom;
use std::path::PathBuf;

use axum::body::Body;
use axum::http::header::{ACCEPT_RANGES, CACHE_CONTROL, CONTENT_LENGTH, CONTENT_TYPE, LAST_MODIFIED};
use axum::http::{HeaderMap, HeaderValue};
use futures::TryStreamExt;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncSeekExt};
use tokio_util::io::ReaderStream;

use super::range::ByteRange;
use crate::error::AssetError;
use crate::types::AssetDescriptor;
use crate::utils::time::http_date;

/// Wrap a reader as a response body. A read error mid-stream is logged and
/// ends the body early; the client sees a truncated response.
pub fn stream_body<R>(reader: R, path: PathBuf) -> Body
where
    R: AsyncRead + Send + 'static,
{
    let stream = ReaderStream::new(reader).inspect_err(move |e| {
        tracing::error!(path = %path.display(), error = %e, "error streaming file");
    });
    Body::from_stream(stream)
}

/// Open the whole asset for streaming
pub async fn open_full(asset: &AssetDescriptor) -> Result<Body, AssetError> {
    let file = tokio::fs::File::open(&asset.path)
        .await
        .map_err(|e| AssetError::from_io(&asset.path, e))?;
    Ok(stream_body(file, asset.path.clone()))
}

/// Open only `range` of the asset for streaming
pub async fn open_range(asset: &AssetDescriptor, range: ByteRange) -> Result<Body, AssetError> {
    let mut file = tokio::fs::File::open(&asset.path)
        .await
        .map_err(|e| AssetError::from_io(&asset.path, e))?;
    file.seek(SeekFrom::Start(range.start))
        .await
        .map_err(|source| AssetError::ReadFailure {
            path: asset.path.clone(),
            source,
        })?;
    Ok(stream_body(file.take(range.len()), asset.path.clone()))
}

/// Content type, exact length and last-modified for `asset`
pub fn content_headers(asset: &AssetDescriptor, length: u64) -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(CONTENT_TYPE, HeaderValue::from_static(asset.content_type));
    headers.insert(CONTENT_LENGTH, HeaderValue::from(length));
    if let Ok(value) = HeaderValue::from_str(&http_date(asset.modified)) {
        headers.insert(LAST_MODIFIED, value);
    }
    headers
}

/// Headers for a cache-disabled image hit
pub fn no_cache_headers(asset: &AssetDescriptor) -> HeaderMap {
    let mut headers = content_headers(asset, asset.size);
    headers.insert(CACHE_CONTROL, HeaderValue::from_static("no-cache"));
    headers
}

/// Headers for a range-capable media file
pub fn ranged_headers(asset: &AssetDescriptor, length: u64) -> HeaderMap {
    let mut headers = content_headers(asset, length);
    headers.insert(ACCEPT_RANGES, HeaderValue::from_static("bytes"));
    headers
}
