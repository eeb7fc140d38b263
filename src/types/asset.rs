//! Request-time description of a file about to be served

use std::fs::Metadata;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

/// A resolved asset. Rebuilt on every request, never cached.
#[derive(Debug, Clone)]
pub struct AssetDescriptor {
    pub path: PathBuf,
    pub content_type: &'static str,
    pub size: u64,
    pub modified: SystemTime,
}

impl AssetDescriptor {
    /// Describe `path` from already-fetched metadata, deriving the content
    /// type from the extension
    pub fn from_metadata(path: PathBuf, metadata: &Metadata) -> Self {
        let content_type = content_type_for(&path);
        Self::with_content_type(path, metadata, content_type)
    }

    /// Describe `path` with a fixed content type
    pub fn with_content_type(path: PathBuf, metadata: &Metadata, content_type: &'static str) -> Self {
        Self {
            path,
            content_type,
            size: metadata.len(),
            // Platforms without mtime report the epoch, which only ever makes
            // the asset look stale
            modified: metadata.modified().unwrap_or(SystemTime::UNIX_EPOCH),
        }
    }
}

/// Map a file extension onto its MIME type
pub fn content_type_for(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_ascii_lowercase());

    match ext.as_deref() {
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("png") => "image/png",
        Some("gif") => "image/gif",
        Some("mp4") => "video/mp4",
        Some("webm") => "video/webm",
        Some("mov") => "video/quicktime",
        Some("pdf") => "application/pdf",
        Some("txt") => "text/plain",
        Some("html") => "text/html",
        Some("css") => "text/css",
        Some("js") => "application/javascript",
        Some("json") => "application/json",
        _ => "application/octet-stream",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_extensions() {
        assert_eq!(content_type_for(Path::new("a/keogram.JPG")), "image/jpeg");
        assert_eq!(content_type_for(Path::new("timelapse.mp4")), "video/mp4");
        assert_eq!(content_type_for(Path::new("clip.mov")), "video/quicktime");
        assert_eq!(content_type_for(Path::new("data.json")), "application/json");
    }

    #[test]
    fn test_unknown_or_missing_extension() {
        assert_eq!(content_type_for(Path::new("archive.tar.zst")), "application/octet-stream");
        assert_eq!(content_type_for(Path::new("README")), "application/octet-stream");
    }
}
