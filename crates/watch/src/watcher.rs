//! The watch loop: filesystem events feed candidates, a fixed-interval poll
//! confirms stability and enqueues.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::mpsc;
use std::sync::Arc;

use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::Notify;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use tickerflow_core::config::WatchConfig;
use tickerflow_core::Vendor;
use tickerflow_queue::{IngestJob, JobQueue};

use crate::error::WatchError;
use crate::tracker::{FileSnapshot, StabilityTracker};

/// Vendor tag for a dropped file: forced override if configured, else the
/// per-source subfolder name when it names a known vendor, else the default.
pub fn resolve_vendor(raw_root: &Path, path: &Path, overridden: Option<Vendor>) -> Vendor {
    if let Some(vendor) = overridden {
        return vendor;
    }
    if let Ok(relative) = path.strip_prefix(raw_root) {
        let mut components = relative.components();
        if let (Some(first), Some(_rest)) = (components.next(), components.next()) {
            if let Some(name) = first.as_os_str().to_str() {
                if let Ok(vendor) = Vendor::from_str(name) {
                    return vendor;
                }
            }
        }
    }
    Vendor::default()
}

fn is_candidate(path: &Path) -> bool {
    let is_csv = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.eq_ignore_ascii_case("csv"))
        .unwrap_or(false);
    let hidden = path
        .file_name()
        .and_then(|n| n.to_str())
        .map(|n| n.starts_with('.'))
        .unwrap_or(true);
    is_csv && !hidden
}

/// Watches one raw root (recursively, covering per-vendor subfolders).
pub struct DirWatcher {
    config: WatchConfig,
    queue: Arc<dyn JobQueue>,
}

impl DirWatcher {
    pub fn new(config: WatchConfig, queue: Arc<dyn JobQueue>) -> Self {
        Self { config, queue }
    }

    /// Run until `shutdown` fires. Shutdown stops enqueueing immediately.
    pub async fn run(&self, shutdown: Arc<Notify>) -> Result<(), WatchError> {
        let overridden = self
            .config
            .vendor_override
            .as_deref()
            .map(Vendor::from_str)
            .transpose()
            .map_err(|e| WatchError::VendorOverride(e.to_string()))?;

        std::fs::create_dir_all(&self.config.raw_dir)?;
        let root = self.config.raw_dir.canonicalize()?;

        // Filesystem events register candidates; the poll pass below decides
        // stability. The watcher handle must stay alive for the whole run.
        let (tx, rx) = mpsc::channel::<PathBuf>();
        let mut fs_watcher: RecommendedWatcher =
            notify::recommended_watcher(move |res: Result<Event, notify::Error>| {
                if let Ok(event) = res {
                    if matches!(event.kind, EventKind::Create(_) | EventKind::Modify(_)) {
                        for path in event.paths {
                            if is_candidate(&path) {
                                let _ = tx.send(path);
                            }
                        }
                    }
                }
            })?;
        fs_watcher.watch(&root, RecursiveMode::Recursive)?;

        let mut tracker = StabilityTracker::new();
        let mut candidates: HashSet<PathBuf> = HashSet::new();

        if self.config.scan_existing {
            for entry in WalkDir::new(&root).into_iter().filter_map(Result::ok) {
                let path = entry.path();
                if entry.file_type().is_file() && is_candidate(path) {
                    candidates.insert(path.to_path_buf());
                }
            }
            info!(count = candidates.len(), "catch-up scan registered existing files");
        }

        info!(root = %root.display(), poll = ?self.config.poll_interval, "watching for CSV files");

        let mut interval = tokio::time::interval(self.config.poll_interval);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = shutdown.notified() => {
                    info!("watcher shutting down");
                    return Ok(());
                }
                _ = interval.tick() => {
                    while let Ok(path) = rx.try_recv() {
                        candidates.insert(path);
                    }
                    self.poll_pass(&root, overridden, &mut tracker, &mut candidates).await;
                }
            }
        }
    }

    /// One stability pass over the candidate set.
    async fn poll_pass(
        &self,
        root: &Path,
        overridden: Option<Vendor>,
        tracker: &mut StabilityTracker,
        candidates: &mut HashSet<PathBuf>,
    ) {
        let paths: Vec<PathBuf> = candidates.iter().cloned().collect();
        for path in paths {
            let snapshot = match std::fs::metadata(&path) {
                Ok(meta) => match meta.modified() {
                    Ok(mtime) => FileSnapshot { len: meta.len(), mtime },
                    Err(e) => {
                        warn!(path = %path.display(), error = %e, "mtime unavailable, skipping");
                        continue;
                    }
                },
                // Moved out (processed) or deleted: start over if re-dropped.
                Err(_) => {
                    tracker.forget(&path);
                    candidates.remove(&path);
                    continue;
                }
            };

            if !tracker.observe(&path, snapshot) {
                continue;
            }

            let vendor = resolve_vendor(root, &path, overridden);
            let job = IngestJob::new(path.clone(), vendor);
            match self.queue.enqueue(&job).await {
                Ok(inserted) => {
                    if !inserted {
                        debug!(path = %path.display(), "already queued");
                    }
                    tracker.mark_enqueued(&path);
                }
                // Leave untracked as enqueued: the next tick retries.
                Err(e) => warn!(path = %path.display(), error = %e, "enqueue failed"),
            }
        }
    }
}
