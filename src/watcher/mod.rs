//! File watcher producing stabilized change notifications
//!
//! Wraps a `notify` OS subscription and feeds its raw events through a
//! [`Stabilizer`]. The result is a lazy, infinite stream: nothing is watched
//! until it is first polled, and dropping it releases the subscription.
//!
//! A single file is watched through its parent directory so that atomic
//! rename-over writes keep being observed.

mod stabilizer;

use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::time::{Instant, SystemTime};

use futures::Stream;
use notify::event::ModifyKind;
use notify::{Config, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;

use crate::error::WatchError;
use crate::types::{WatchTarget, WatchedResource};

pub use stabilizer::{Snapshot, StabilizedChange, Stabilizer};

/// Stream of settled changes returned by [`FileWatcher::watch`]
pub type StabilizedChanges = Pin<Box<dyn Stream<Item = StabilizedChange> + Send>>;

type RawEvent = notify::Result<Event>;

/// Watches one [`WatchedResource`]
#[derive(Debug)]
pub struct FileWatcher {
    resource: WatchedResource,
}

/// A live OS subscription plus what it should match
struct Subscription {
    _watcher: RecommendedWatcher,
    root: PathBuf,
    /// Identity of `root` when the watch was placed
    root_id: Option<DirIdentity>,
    /// Exact path to match when watching a single file
    file: Option<PathBuf>,
}

impl Subscription {
    fn matches(&self, path: &Path) -> bool {
        match &self.file {
            Some(file) => path == file,
            None => path.starts_with(&self.root),
        }
    }

    /// The watched directory itself was removed or renamed away. The OS
    /// watch is dead at that point and reports no error of its own.
    fn lost_root(&self, event: &Event) -> bool {
        let hits_root = matches!(
            event.kind,
            EventKind::Remove(_) | EventKind::Modify(ModifyKind::Name(_))
        ) && event.paths.iter().any(|path| path == &self.root);
        hits_root || !self.is_alive()
    }

    /// `root` still exists and is the same directory that was watched
    fn is_alive(&self) -> bool {
        self.root_id.is_some() && dir_identity(&self.root) == self.root_id
    }
}

enum Step {
    Retry,
    Raw(RawEvent),
    Poll,
}

impl FileWatcher {
    pub fn new(resource: WatchedResource) -> Self {
        Self { resource }
    }

    pub fn resource(&self) -> &WatchedResource {
        &self.resource
    }

    /// Turn the watcher into its change stream.
    ///
    /// Subscription failures (missing target, permissions, backend errors)
    /// are logged and retried every `retry_interval`; the stream never ends
    /// on its own.
    pub fn watch(self) -> StabilizedChanges {
        let mut resource = self.resource;

        Box::pin(async_stream::stream! {
            let (raw_tx, mut raw_rx) = mpsc::unbounded_channel::<RawEvent>();
            let mut subscription: Option<Subscription> = None;
            let mut subscribed_once = false;
            let mut stabilizer = Stabilizer::new(resource.window.threshold);

            let mut retry = tokio::time::interval(resource.retry_interval);
            retry.set_missed_tick_behavior(MissedTickBehavior::Delay);
            let mut poll = tokio::time::interval(resource.window.poll_interval);
            poll.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                let step = tokio::select! {
                    _ = retry.tick() => Step::Retry,
                    Some(raw) = raw_rx.recv() => Step::Raw(raw),
                    _ = poll.tick(), if !stabilizer.is_idle() => Step::Poll,
                };

                match step {
                    Step::Retry => {
                        if let Some(sub) = subscription.as_ref() {
                            if sub.is_alive() {
                                continue;
                            }
                            tracing::warn!(
                                root = %sub.root.display(),
                                "watched directory disappeared, resubscribing"
                            );
                            subscription = None;
                        }
                        match subscribe(&resource, raw_tx.clone()) {
                            Ok(sub) => {
                                tracing::info!(
                                    path = %resource.path.display(),
                                    root = %sub.root.display(),
                                    "file watcher subscribed"
                                );
                                let current = probe(&resource.path).map(|(_, modified)| modified);
                                if subscribed_once
                                    && resource.target == WatchTarget::File
                                    && current.is_some()
                                    && current != resource.last_modified
                                {
                                    // Changed while we were not subscribed
                                    let target = sub.file.clone().unwrap_or_else(|| resource.path.clone());
                                    stabilizer.observe(target, Instant::now());
                                }
                                if !subscribed_once {
                                    resource.last_modified = current;
                                }
                                subscribed_once = true;
                                subscription = Some(sub);
                            }
                            Err(e) => {
                                tracing::warn!(
                                    path = %resource.path.display(),
                                    error = %e,
                                    retry_in = ?resource.retry_interval,
                                    "file watcher subscription failed"
                                );
                            }
                        }
                    }
                    Step::Raw(Ok(event)) => {
                        let Some(sub) = subscription.as_ref() else {
                            continue;
                        };
                        if sub.lost_root(&event) {
                            tracing::warn!(
                                root = %sub.root.display(),
                                kind = ?event.kind,
                                "watched directory removed, resubscribing"
                            );
                            subscription = None;
                            continue;
                        }
                        if !is_write_activity(&event.kind) {
                            continue;
                        }
                        let now = Instant::now();
                        for path in event.paths {
                            if sub.matches(&path) {
                                tracing::trace!(path = %path.display(), kind = ?event.kind, "raw fs event");
                                stabilizer.observe(path, now);
                            }
                        }
                    }
                    Step::Raw(Err(e)) => {
                        let err = WatchError::Backend(e);
                        tracing::warn!(
                            path = %resource.path.display(),
                            error = %err,
                            "file watcher lost its subscription, resubscribing"
                        );
                        subscription = None;
                    }
                    Step::Poll => {
                        for change in stabilizer.poll(Instant::now(), probe) {
                            resource.last_modified = Some(change.modified);
                            yield change;
                        }
                    }
                }
            }
        })
    }
}

/// Only content-affecting events start a stabilization
fn is_write_activity(kind: &EventKind) -> bool {
    matches!(kind, EventKind::Create(_) | EventKind::Modify(_))
}

fn probe(path: &Path) -> Snapshot {
    let metadata = std::fs::metadata(path).ok()?;
    Some((
        metadata.len(),
        metadata.modified().unwrap_or(SystemTime::UNIX_EPOCH),
    ))
}

fn subscribe(
    resource: &WatchedResource,
    tx: mpsc::UnboundedSender<RawEvent>,
) -> Result<Subscription, WatchError> {
    let (root, mode, file) = match resource.target {
        WatchTarget::File => {
            let file_name = resource
                .path
                .file_name()
                .ok_or_else(|| WatchError::NoParent(resource.path.clone()))?;
            let parent = match resource.path.parent() {
                Some(parent) if !parent.as_os_str().is_empty() => parent,
                _ => Path::new("."),
            };
            let parent = canonical(parent)?;
            let file = parent.join(file_name);
            (parent, RecursiveMode::NonRecursive, Some(file))
        }
        WatchTarget::Tree => (canonical(&resource.path)?, RecursiveMode::Recursive, None),
    };

    let mut watcher = RecommendedWatcher::new(
        move |res: RawEvent| {
            // Receiver gone means the stream was dropped
            let _ = tx.send(res);
        },
        Config::default(),
    )?;

    watcher
        .watch(&root, mode)
        .map_err(|source| WatchError::Subscribe {
            path: root.clone(),
            source,
        })?;

    Ok(Subscription {
        _watcher: watcher,
        root_id: dir_identity(&root),
        root,
        file,
    })
}

#[cfg(unix)]
type DirIdentity = (u64, u64);

#[cfg(not(unix))]
type DirIdentity = ();

/// Device and inode on unix, so a directory recreated under the same name
/// is told apart from the one the watch was placed on
#[cfg(unix)]
fn dir_identity(path: &Path) -> Option<DirIdentity> {
    use std::os::unix::fs::MetadataExt;
    let metadata = std::fs::metadata(path).ok()?;
    Some((metadata.dev(), metadata.ino()))
}

#[cfg(not(unix))]
fn dir_identity(path: &Path) -> Option<DirIdentity> {
    std::fs::metadata(path).ok().map(|_| ())
}

fn canonical(path: &Path) -> Result<PathBuf, WatchError> {
    path.canonicalize().map_err(|e| WatchError::Subscribe {
        path: path.to_path_buf(),
        source: notify::Error::io(e),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use notify::event::{AccessKind, CreateKind, RemoveKind};

    #[test]
    fn test_write_activity_kinds() {
        assert!(is_write_activity(&EventKind::Create(CreateKind::File)));
        assert!(is_write_activity(&EventKind::Modify(ModifyKind::Any)));
        assert!(!is_write_activity(&EventKind::Remove(RemoveKind::File)));
        assert!(!is_write_activity(&EventKind::Access(AccessKind::Any)));
    }

    #[test]
    fn test_probe_missing_path() {
        assert!(probe(Path::new("/definitely/not/here.jpg")).is_none());
    }

    #[test]
    fn test_subscribe_missing_tree_fails() {
        let (tx, _rx) = mpsc::unbounded_channel();
        let resource = WatchedResource::tree("/definitely/not/here");
        assert!(matches!(
            subscribe(&resource, tx),
            Err(WatchError::Subscribe { .. })
        ));
    }

    #[test]
    fn test_file_subscription_matches_only_target() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("latest.jpg");
        let (tx, _rx) = mpsc::unbounded_channel();

        let sub = subscribe(&WatchedResource::file(&target), tx).unwrap();
        let root = dir.path().canonicalize().unwrap();

        assert!(sub.matches(&root.join("latest.jpg")));
        assert!(!sub.matches(&root.join("latest.jpg.tmp")));
    }

    #[test]
    fn test_removing_watched_directory_kills_subscription() {
        let dir = tempfile::tempdir().unwrap();
        let images = dir.path().join("images");
        std::fs::create_dir(&images).unwrap();
        let (tx, _rx) = mpsc::unbounded_channel();

        let sub = subscribe(&WatchedResource::file(images.join("latest.jpg")), tx).unwrap();
        let root = images.canonicalize().unwrap();

        let file_removed = Event::new(EventKind::Remove(RemoveKind::File)).add_path(root.join("latest.jpg"));
        assert!(!sub.lost_root(&file_removed));

        let root_removed = Event::new(EventKind::Remove(RemoveKind::Folder)).add_path(root.clone());
        assert!(sub.lost_root(&root_removed));

        // Any event seen after the directory is gone
        std::fs::remove_dir(&images).unwrap();
        let write = Event::new(EventKind::Modify(ModifyKind::Any)).add_path(root.join("latest.jpg"));
        assert!(sub.lost_root(&write));
    }
}
