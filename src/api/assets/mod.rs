//! HTTP asset serving
//!
//! - `GET /images/<file>` - latest image, with conditional requests and a
//!   stale-source fallback to the offline image
//! - `GET /<collection>/<path>` - directory trees (videos, keograms) with
//!   index pages and byte-range delivery
//!
//! Everything else falls through to the static front-end.

pub mod body;
pub mod collection;
pub mod image;
pub mod listing;
pub mod range;

use std::path::PathBuf;
use std::time::Duration;

pub use collection::collection_handler;
pub use image::{image_handler, image_root_handler};

/// A named directory tree served under `/<name>/`
#[derive(Debug, Clone)]
pub struct Collection {
    pub name: String,
    pub dir: PathBuf,
}

impl Collection {
    pub fn new(name: impl Into<String>, dir: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            dir: dir.into(),
        }
    }
}

/// Filesystem layout behind the HTTP surface
#[derive(Debug, Clone)]
pub struct AssetConfig {
    /// Directory holding the live image
    pub image_dir: PathBuf,
    /// Served instead of a stale image
    pub offline_image: PathBuf,
    /// Maximum image age before the offline image is served
    pub stale_after: Duration,
    pub collections: Vec<Collection>,
    /// Front-end files for every other path
    pub static_dir: PathBuf,
}

impl AssetConfig {
    /// Look up a collection by its URL name
    pub fn collection(&self, name: &str) -> Option<&Collection> {
        self.collections.iter().find(|c| c.name == name)
    }
}
