//! Filesystem tests for the stabilized file watcher

use std::io::Write;
use std::time::Duration;

use futures::StreamExt;
use tokio::sync::mpsc;

use allsky_live::types::StabilityWindow;
use allsky_live::{FileWatcher, StabilizedChange, WatchedResource};

fn fast_window() -> StabilityWindow {
    StabilityWindow {
        threshold: Duration::from_millis(300),
        poll_interval: Duration::from_millis(20),
    }
}

/// Forward the watcher's stream into a channel the test can time out on
fn spawn_watch(resource: WatchedResource) -> mpsc::UnboundedReceiver<StabilizedChange> {
    let (tx, rx) = mpsc::unbounded_channel();
    tokio::spawn(async move {
        let mut changes = FileWatcher::new(resource).watch();
        while let Some(change) = changes.next().await {
            if tx.send(change).is_err() {
                break;
            }
        }
    });
    rx
}

#[tokio::test]
async fn test_write_burst_reports_once() {
    let dir = tempfile::tempdir().unwrap();
    let image = dir.path().join("latest.jpg");
    std::fs::write(&image, b"initial").unwrap();

    let resource = WatchedResource::file(&image)
        .with_window(fast_window())
        .with_retry_interval(Duration::from_millis(50));
    let mut changes = spawn_watch(resource);

    // Let the subscription settle
    tokio::time::sleep(Duration::from_millis(500)).await;

    let mut file = std::fs::File::create(&image).unwrap();
    for chunk in 0..5u8 {
        file.write_all(&[chunk; 4096]).unwrap();
        file.flush().unwrap();
        tokio::time::sleep(Duration::from_millis(30)).await;
    }
    drop(file);

    let change = tokio::time::timeout(Duration::from_secs(10), changes.recv())
        .await
        .expect("no stabilized change reported")
        .unwrap();
    assert_eq!(change.path.file_name().unwrap(), "latest.jpg");

    let second = tokio::time::timeout(Duration::from_millis(1000), changes.recv()).await;
    assert!(second.is_err(), "burst reported more than once");
}

#[tokio::test]
async fn test_atomic_replace_is_observed() {
    let dir = tempfile::tempdir().unwrap();
    let image = dir.path().join("latest.jpg");
    std::fs::write(&image, b"old frame").unwrap();

    let resource = WatchedResource::file(&image)
        .with_window(fast_window())
        .with_retry_interval(Duration::from_millis(50));
    let mut changes = spawn_watch(resource);

    tokio::time::sleep(Duration::from_millis(500)).await;

    let staging = dir.path().join("latest.jpg.tmp");
    std::fs::write(&staging, vec![1u8; 8192]).unwrap();
    std::fs::rename(&staging, &image).unwrap();

    let change = tokio::time::timeout(Duration::from_secs(10), changes.recv())
        .await
        .expect("replacement not reported")
        .unwrap();
    assert_eq!(change.path.file_name().unwrap(), "latest.jpg");
}

#[tokio::test]
async fn test_unrelated_files_are_ignored() {
    let dir = tempfile::tempdir().unwrap();
    let image = dir.path().join("latest.jpg");
    std::fs::write(&image, b"frame").unwrap();

    let resource = WatchedResource::file(&image)
        .with_window(fast_window())
        .with_retry_interval(Duration::from_millis(50));
    let mut changes = spawn_watch(resource);

    tokio::time::sleep(Duration::from_millis(500)).await;
    std::fs::write(dir.path().join("other.jpg"), b"noise").unwrap();

    let result = tokio::time::timeout(Duration::from_millis(1200), changes.recv()).await;
    assert!(result.is_err(), "sibling file reported as a change");
}

#[tokio::test]
async fn test_missing_directory_is_picked_up_once_created() {
    let dir = tempfile::tempdir().unwrap();
    let images = dir.path().join("images");
    let image = images.join("latest.jpg");

    let resource = WatchedResource::file(&image)
        .with_window(fast_window())
        .with_retry_interval(Duration::from_millis(50));
    let mut changes = spawn_watch(resource);

    // Subscription keeps failing while the directory is absent
    tokio::time::sleep(Duration::from_millis(300)).await;
    std::fs::create_dir(&images).unwrap();
    tokio::time::sleep(Duration::from_millis(500)).await;

    std::fs::write(&image, vec![5u8; 2048]).unwrap();

    let change = tokio::time::timeout(Duration::from_secs(10), changes.recv())
        .await
        .expect("write after late directory creation not reported")
        .unwrap();
    assert_eq!(change.path.file_name().unwrap(), "latest.jpg");
}

#[tokio::test]
async fn test_recreated_directory_is_watched_again() {
    let dir = tempfile::tempdir().unwrap();
    let images = dir.path().join("images");
    std::fs::create_dir(&images).unwrap();
    let image = images.join("latest.jpg");
    std::fs::write(&image, b"before").unwrap();

    let resource = WatchedResource::file(&image)
        .with_window(fast_window())
        .with_retry_interval(Duration::from_millis(50));
    let mut changes = spawn_watch(resource);

    tokio::time::sleep(Duration::from_millis(500)).await;

    std::fs::remove_dir_all(&images).unwrap();
    std::fs::create_dir(&images).unwrap();
    std::fs::write(&image, vec![6u8; 4096]).unwrap();

    let change = tokio::time::timeout(Duration::from_secs(10), changes.recv())
        .await
        .expect("write into recreated directory not reported")
        .unwrap();
    assert_eq!(change.path.file_name().unwrap(), "latest.jpg");
}
