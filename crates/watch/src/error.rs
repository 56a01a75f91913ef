//! Watcher error types.

use thiserror::Error;

use tickerflow_queue::QueueError;

#[derive(Debug, Error)]
pub enum WatchError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("filesystem watch error: {0}")]
    Notify(#[from] notify::Error),

    #[error("queue error: {0}")]
    Queue(#[from] QueueError),

    #[error("bad vendor override: {0}")]
    VendorOverride(String),
}
