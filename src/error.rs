//! Error types for the live-update subsystem
//!
//! Every failure is caught where it happens and turned into either an HTTP
//! status or a log line; none of these are fatal to the process.

use std::path::PathBuf;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

/// Failure while resolving or reading a served asset
#[derive(Debug, thiserror::Error)]
pub enum AssetError {
    /// Nothing exists at the resolved path
    #[error("not found: {}", .0.display())]
    NotFound(PathBuf),

    /// Stat, directory read or open failed
    #[error("failed to read {}: {source}", path.display())]
    ReadFailure {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl AssetError {
    /// Classify an I/O error for `path`: a missing file is `NotFound`,
    /// anything else is a `ReadFailure`.
    pub fn from_io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        let path = path.into();
        if source.kind() == std::io::ErrorKind::NotFound {
            Self::NotFound(path)
        } else {
            Self::ReadFailure { path, source }
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::ReadFailure { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AssetError {
    fn into_response(self) -> Response {
        match &self {
            Self::NotFound(path) => {
                tracing::debug!(path = %path.display(), "asset not found");
                (StatusCode::NOT_FOUND, "Not Found").into_response()
            }
            Self::ReadFailure { path, source } => {
                tracing::error!(path = %path.display(), error = %source, "asset read failure");
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error").into_response()
            }
        }
    }
}

/// Failure of the underlying filesystem subscription
#[derive(Debug, thiserror::Error)]
pub enum WatchError {
    #[error("watch target {} has no parent directory", .0.display())]
    NoParent(PathBuf),

    #[error("failed to subscribe to {}: {source}", path.display())]
    Subscribe {
        path: PathBuf,
        #[source]
        source: notify::Error,
    },

    #[error("watch backend error: {0}")]
    Backend(#[from] notify::Error),
}

/// Failure inside the follower client
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("invalid server url: {0}")]
    InvalidUrl(String),

    #[error("push channel error: {0}")]
    Channel(#[from] tokio_tungstenite::tungstenite::Error),

    #[error("image download failed: {0}")]
    Download(#[from] reqwest::Error),

    #[error("failed to write image: {0}")]
    Io(#[from] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_maps_to_not_found() {
        let err = AssetError::from_io(
            "/nope",
            std::io::Error::new(std::io::ErrorKind::NotFound, "gone"),
        );
        assert!(matches!(err, AssetError::NotFound(_)));
        assert_eq!(err.status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn test_permission_error_maps_to_read_failure() {
        let err = AssetError::from_io(
            "/secret",
            std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        );
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
