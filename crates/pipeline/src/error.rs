//! Pipeline error type and retry classification.

use std::path::PathBuf;

use thiserror::Error;

use tickerflow_core::CoreError;
use tickerflow_ingest::IngestError;
use tickerflow_queue::QueueError;
use tickerflow_store::StoreError;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("validation: {0}")]
    Ingest(#[from] IngestError),

    #[error("storage: {0}")]
    Store(#[from] StoreError),

    #[error("queue: {0}")]
    Queue(#[from] QueueError),

    #[error("{0}")]
    Core(#[from] CoreError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("source file missing: {0}")]
    MissingFile(PathBuf),
}

impl PipelineError {
    /// Whether re-enqueueing the job can reasonably succeed. Validation
    /// failures never retry; only transient storage trouble does.
    pub fn retryable(&self) -> bool {
        match self {
            PipelineError::Store(e) => e.retryable(),
            _ => false,
        }
    }
}
