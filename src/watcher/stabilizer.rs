//! Write-finished detection
//!
//! Raw filesystem events arrive in bursts (truncate, several writes, a
//! rename). Each event only marks its path pending; the path is then probed
//! on every poll and reported once its `(size, mtime)` snapshot has stayed
//! unchanged for the whole quiet period.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant, SystemTime};

/// What a probe saw on disk: `None` when the path is currently missing
pub type Snapshot = Option<(u64, SystemTime)>;

/// A change that has settled
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StabilizedChange {
    pub path: PathBuf,
    pub modified: SystemTime,
}

#[derive(Debug)]
struct Pending {
    /// `None` until the first probe after the triggering event
    snapshot: Option<Snapshot>,
    quiet_since: Instant,
}

/// Coalesces raw events into exactly one change per settled write
#[derive(Debug)]
pub struct Stabilizer {
    threshold: Duration,
    pending: HashMap<PathBuf, Pending>,
}

impl Stabilizer {
    pub fn new(threshold: Duration) -> Self {
        Self {
            threshold,
            pending: HashMap::new(),
        }
    }

    /// Record raw activity on `path`, restarting its quiet period
    pub fn observe(&mut self, path: PathBuf, now: Instant) {
        self.pending
            .entry(path)
            .and_modify(|p| p.quiet_since = now)
            .or_insert(Pending {
                snapshot: None,
                quiet_since: now,
            });
    }

    /// Probe every pending path and return the ones that have settled.
    ///
    /// A path that is still missing once its quiet period ends is dropped
    /// without being reported.
    pub fn poll<F>(&mut self, now: Instant, mut probe: F) -> Vec<StabilizedChange>
    where
        F: FnMut(&Path) -> Snapshot,
    {
        let threshold = self.threshold;
        let mut settled = Vec::new();

        self.pending.retain(|path, pending| {
            let current = probe(path);
            if pending.snapshot != Some(current) {
                pending.snapshot = Some(current);
                pending.quiet_since = now;
                return true;
            }
            if now.saturating_duration_since(pending.quiet_since) < threshold {
                return true;
            }
            if let Some((_, modified)) = current {
                settled.push(StabilizedChange {
                    path: path.clone(),
                    modified,
                });
            }
            false
        });

        settled
    }

    /// True when no path is waiting to settle
    pub fn is_idle(&self) -> bool {
        self.pending.is_empty()
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::UNIX_EPOCH;

    const POLL: Duration = Duration::from_millis(100);
    const QUIET: Duration = Duration::from_millis(2000);

    fn snapshot(size: u64, secs: u64) -> Snapshot {
        Some((size, UNIX_EPOCH + Duration::from_secs(secs)))
    }

    #[test]
    fn test_burst_of_writes_reports_once() {
        let path = PathBuf::from("/data/latest.jpg");
        let start = Instant::now();
        let mut stabilizer = Stabilizer::new(QUIET);
        let mut reported = Vec::new();

        // 10 writes, 50ms apart, file growing each time
        let mut size = 0;
        for i in 0..10u32 {
            let now = start + Duration::from_millis(50 * u64::from(i));
            size += 4096;
            stabilizer.observe(path.clone(), now);
            reported.extend(stabilizer.poll(now, |_| snapshot(size, 100)));
        }
        assert!(reported.is_empty());

        // Keep polling well past the quiet period
        let writes_done = start + Duration::from_millis(450);
        for tick in 1..=40u32 {
            let now = writes_done + POLL * tick;
            reported.extend(stabilizer.poll(now, |_| snapshot(size, 100)));
        }

        assert_eq!(reported.len(), 1);
        assert_eq!(reported[0].path, path);
        assert!(stabilizer.is_idle());
    }

    #[test]
    fn test_not_reported_before_quiet_period() {
        let path = PathBuf::from("/data/latest.jpg");
        let start = Instant::now();
        let mut stabilizer = Stabilizer::new(QUIET);

        stabilizer.observe(path, start);
        assert!(stabilizer.poll(start, |_| snapshot(10, 1)).is_empty());
        assert!(stabilizer
            .poll(start + Duration::from_millis(1900), |_| snapshot(10, 1))
            .is_empty());
        assert_eq!(
            stabilizer
                .poll(start + Duration::from_millis(2000), |_| snapshot(10, 1))
                .len(),
            1
        );
    }

    #[test]
    fn test_growth_seen_by_probe_restarts_quiet_period() {
        let path = PathBuf::from("/data/latest.jpg");
        let start = Instant::now();
        let mut stabilizer = Stabilizer::new(QUIET);

        stabilizer.observe(path, start);
        stabilizer.poll(start, |_| snapshot(10, 1));
        // Size changes without a raw event (e.g. coalesced by the OS)
        stabilizer.poll(start + Duration::from_millis(1500), |_| snapshot(20, 2));

        assert!(stabilizer
            .poll(start + Duration::from_millis(2500), |_| snapshot(20, 2))
            .is_empty());
        assert_eq!(
            stabilizer
                .poll(start + Duration::from_millis(3500), |_| snapshot(20, 2))
                .len(),
            1
        );
    }

    #[test]
    fn test_deleted_path_is_dropped_silently() {
        let path = PathBuf::from("/data/latest.jpg");
        let start = Instant::now();
        let mut stabilizer = Stabilizer::new(QUIET);

        stabilizer.observe(path, start);
        stabilizer.poll(start, |_| None);
        let reported = stabilizer.poll(start + QUIET, |_| None);

        assert!(reported.is_empty());
        assert!(stabilizer.is_idle());
    }

    #[test]
    fn test_independent_paths_settle_independently() {
        let a = PathBuf::from("/videos/a.mp4");
        let b = PathBuf::from("/videos/b.mp4");
        let start = Instant::now();
        let mut stabilizer = Stabilizer::new(QUIET);

        stabilizer.observe(a.clone(), start);
        stabilizer.poll(start, |_| snapshot(1, 1));
        stabilizer.observe(b.clone(), start + Duration::from_millis(1000));
        stabilizer.poll(start + Duration::from_millis(1000), |_| snapshot(1, 1));
        assert_eq!(stabilizer.pending_count(), 2);

        let first = stabilizer.poll(start + Duration::from_millis(2000), |_| snapshot(1, 1));
        assert_eq!(first.len(), 1);
        assert_eq!(first[0].path, a);

        let second = stabilizer.poll(start + Duration::from_millis(3000), |_| snapshot(1, 1));
        assert_eq!(second.len(), 1);
        assert_eq!(second[0].path, b);
    }
}
