//! Drop-directory watcher.
//!
//! Detects newly-completed CSV files in the raw root and enqueues exactly one
//! ingestion job per file per drop. A file counts as complete only after its
//! size and mtime are unchanged across two successive polls; queue-side
//! dedup makes restarts and rescans idempotent.

pub mod error;
pub mod tracker;
pub mod watcher;

pub use error::WatchError;
pub use tracker::StabilityTracker;
pub use watcher::{resolve_vendor, DirWatcher};
