//! Job payload and the queue trait.

use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use tickerflow_core::Vendor;

use crate::error::QueueError;

/// The full wire contract between producer and consumers: everything else a
/// worker needs is re-derived from the file itself.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IngestJob {
    pub source_path: PathBuf,
    pub vendor: Vendor,
    pub enqueued_at: DateTime<Utc>,
}

impl IngestJob {
    pub fn new(source_path: impl Into<PathBuf>, vendor: Vendor) -> Self {
        Self {
            source_path: source_path.into(),
            vendor,
            enqueued_at: Utc::now(),
        }
    }
}

/// A job leased to one worker.
#[derive(Debug, Clone)]
pub struct ClaimedJob {
    pub id: i64,
    pub job: IngestJob,
    /// Delivery count including this one.
    pub attempts: u32,
}

/// What `fail` did with the job, so the worker knows whether the source file
/// gets moved to the failed area or left in place for the retry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobDisposition {
    /// Returned to pending for another attempt.
    Requeued,
    /// Terminally failed.
    Terminal,
}

/// Per-state job counts.
#[derive(Debug, Clone, Default, Serialize)]
pub struct QueueDepth {
    pub pending: u64,
    pub running: u64,
    pub done: u64,
    pub failed: u64,
}

/// Trait for job queue backends.
#[async_trait]
pub trait JobQueue: Send + Sync {
    /// Enqueue a job unless a pending/running job for the same path already
    /// exists. Returns whether a new job was created.
    async fn enqueue(&self, job: &IngestJob) -> Result<bool, QueueError>;

    /// Atomically lease the oldest available job (pending, or running with an
    /// expired lease). Returns `None` when the queue is idle.
    async fn claim(&self, lease: Duration) -> Result<Option<ClaimedJob>, QueueError>;

    /// Mark a job done.
    async fn complete(&self, id: i64) -> Result<(), QueueError>;

    /// Record a failure. Retryable failures under the attempt budget go back
    /// to pending; everything else is terminal, with `reason` persisted.
    async fn fail(
        &self,
        id: i64,
        reason: &str,
        retryable: bool,
    ) -> Result<JobDisposition, QueueError>;

    /// Per-state counts, for operators and idle checks.
    async fn depth(&self) -> Result<QueueDepth, QueueError>;
}
