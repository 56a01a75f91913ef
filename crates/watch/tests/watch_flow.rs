//! Watcher integration: catch-up scan, live detection, restart idempotence.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Notify;
use uuid::Uuid;

use tickerflow_core::config::WatchConfig;
use tickerflow_queue::{JobQueue, SqliteQueue};
use tickerflow_watch::DirWatcher;

fn test_dir() -> PathBuf {
    let dir = std::env::temp_dir().join(format!("tickerflow-test-{}", Uuid::new_v4()));
    std::fs::create_dir_all(&dir).unwrap();
    dir
}

fn watch_config(raw_dir: PathBuf, scan_existing: bool) -> WatchConfig {
    WatchConfig {
        raw_dir,
        poll_interval: Duration::from_millis(25),
        scan_existing,
        vendor_override: None,
    }
}

const CSV: &str = "date,open,high,low,close,volume\n2024-01-02,184.22,186.95,183.82,185.64,82488700\n";

#[tokio::test]
async fn test_scan_existing_enqueues_each_file_once() {
    let dir = test_dir();
    let raw = dir.join("raw");
    std::fs::create_dir_all(raw.join("fmp")).unwrap();
    std::fs::write(raw.join("AAPL.csv"), CSV).unwrap();
    std::fs::write(raw.join("fmp").join("MSFT.csv"), CSV).unwrap();

    let queue = Arc::new(SqliteQueue::connect(&dir.join("queue.db"), 3).await.unwrap());

    let watcher = Arc::new(DirWatcher::new(watch_config(raw.clone(), true), queue.clone()));
    let shutdown = Arc::new(Notify::new());
    let handle = {
        let watcher = watcher.clone();
        let shutdown = shutdown.clone();
        tokio::spawn(async move { watcher.run(shutdown).await })
    };

    // Several poll intervals: register, confirm stability, enqueue.
    tokio::time::sleep(Duration::from_millis(500)).await;
    handle.abort();

    let depth = queue.depth().await.unwrap();
    assert_eq!(depth.pending, 2);

    // Restart with a rescan: queue-side dedup keeps it at one job per file.
    let watcher = Arc::new(DirWatcher::new(watch_config(raw, true), queue.clone()));
    let handle = {
        let watcher = watcher.clone();
        let shutdown = shutdown.clone();
        tokio::spawn(async move { watcher.run(shutdown).await })
    };
    tokio::time::sleep(Duration::from_millis(500)).await;
    handle.abort();

    let depth = queue.depth().await.unwrap();
    assert_eq!(depth.pending, 2);
}

#[tokio::test]
async fn test_live_detection_of_new_file() {
    let dir = test_dir();
    let raw = dir.join("raw");
    std::fs::create_dir_all(&raw).unwrap();

    let queue = Arc::new(SqliteQueue::connect(&dir.join("queue.db"), 3).await.unwrap());

    let watcher = Arc::new(DirWatcher::new(watch_config(raw.clone(), false), queue.clone()));
    let shutdown = Arc::new(Notify::new());
    let handle = {
        let watcher = watcher.clone();
        tokio::spawn(async move { watcher.run(shutdown).await })
    };

    // Let the watcher start, then drop a file.
    tokio::time::sleep(Duration::from_millis(150)).await;
    std::fs::write(raw.join("NVDA.csv"), CSV).unwrap();

    tokio::time::sleep(Duration::from_millis(700)).await;
    handle.abort();

    let depth = queue.depth().await.unwrap();
    assert_eq!(depth.pending, 1);
}

#[tokio::test]
async fn test_preexisting_files_ignored_without_scan_existing() {
    let dir = test_dir();
    let raw = dir.join("raw");
    std::fs::create_dir_all(&raw).unwrap();
    std::fs::write(raw.join("OLD.csv"), CSV).unwrap();

    let queue = Arc::new(SqliteQueue::connect(&dir.join("queue.db"), 3).await.unwrap());

    let watcher = Arc::new(DirWatcher::new(watch_config(raw, false), queue.clone()));
    let shutdown = Arc::new(Notify::new());
    let handle = {
        let watcher = watcher.clone();
        tokio::spawn(async move { watcher.run(shutdown).await })
    };

    tokio::time::sleep(Duration::from_millis(300)).await;
    handle.abort();

    let depth = queue.depth().await.unwrap();
    assert_eq!(depth.pending, 0);
}
