//! Watched filesystem resources

use std::path::PathBuf;
use std::time::{Duration, SystemTime};

/// Default quiet period before a change counts as finished
pub const DEFAULT_STABILITY_THRESHOLD: Duration = Duration::from_millis(2000);

/// Default interval at which pending paths are re-examined
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Default delay between attempts to (re)subscribe to the OS watcher
pub const DEFAULT_RETRY_INTERVAL: Duration = Duration::from_secs(5);

/// How long a path must stay quiet, and how often it is checked
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StabilityWindow {
    pub threshold: Duration,
    pub poll_interval: Duration,
}

impl Default for StabilityWindow {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_STABILITY_THRESHOLD,
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }
}

/// Whether the watched path is a single file or a whole tree
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchTarget {
    File,
    Tree,
}

/// A filesystem path under observation
#[derive(Debug, Clone)]
pub struct WatchedResource {
    pub path: PathBuf,
    pub target: WatchTarget,
    /// Modification time of the last reported change
    pub last_modified: Option<SystemTime>,
    pub window: StabilityWindow,
    pub retry_interval: Duration,
}

impl WatchedResource {
    /// Watch a single file
    pub fn file(path: impl Into<PathBuf>) -> Self {
        Self::new(path.into(), WatchTarget::File)
    }

    /// Watch a directory tree recursively
    pub fn tree(path: impl Into<PathBuf>) -> Self {
        Self::new(path.into(), WatchTarget::Tree)
    }

    fn new(path: PathBuf, target: WatchTarget) -> Self {
        Self {
            path,
            target,
            last_modified: None,
            window: StabilityWindow::default(),
            retry_interval: DEFAULT_RETRY_INTERVAL,
        }
    }

    pub fn with_window(mut self, window: StabilityWindow) -> Self {
        self.window = window;
        self
    }

    pub fn with_retry_interval(mut self, retry_interval: Duration) -> Self {
        self.retry_interval = retry_interval;
        self
    }
}
