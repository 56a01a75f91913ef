//! Per-job processing: normalize, upsert, relocate.

use chrono::Utc;
use tracing::{error, info, warn};

use tickerflow_core::config::PipelineConfig;
use tickerflow_core::ticker_from_path;
use tickerflow_ingest::normalize_file;
use tickerflow_queue::ClaimedJob;
use tickerflow_store::{ApplyReport, Store};

use crate::error::PipelineError;
use crate::outcome::{relocate, OutcomeRecord};

/// Runs one claimed job end to end against the store.
pub struct JobProcessor {
    store: Store,
    config: PipelineConfig,
}

impl JobProcessor {
    pub fn new(store: Store, config: PipelineConfig) -> Self {
        Self { store, config }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Normalize and upsert the job's file; on success move it to the
    /// processed area with its audit record.
    ///
    /// Errors are returned for the worker to classify; a retryable storage
    /// error leaves the file in place for the re-enqueued attempt.
    pub async fn run_job(&self, claimed: &ClaimedJob) -> Result<ApplyReport, PipelineError> {
        let path = &claimed.job.source_path;
        if !path.exists() {
            return Err(PipelineError::MissingFile(path.clone()));
        }

        let ticker = ticker_from_path(path)?;
        let report = normalize_file(path, claimed.job.vendor, &ticker, self.config.row_tolerance)?;
        let applied = self.store.apply(&ticker, &report.records).await?;

        info!(
            ticker,
            vendor = %claimed.job.vendor,
            rows = applied.rows_written,
            skipped = report.issues.len(),
            "file ingested"
        );

        let outcome = OutcomeRecord {
            source_file: path.display().to_string(),
            ticker: Some(ticker),
            vendor: claimed.job.vendor.as_str().to_string(),
            status: "processed",
            rows_written: Some(applied.rows_written),
            row_count: Some(applied.row_count),
            first_date: Some(applied.first_date),
            last_date: Some(applied.last_date),
            skipped_rows: report.issues.len(),
            issues: report.issues,
            error: None,
            attempts: claimed.attempts,
            enqueued_at: claimed.job.enqueued_at,
            finished_at: Utc::now(),
        };
        let dest = self
            .config
            .processed_dir
            .join(claimed.job.vendor.as_str());
        if let Err(e) = relocate(path, &dest, &outcome) {
            // The batch is committed; the watcher will re-see the file and a
            // re-run is idempotent.
            warn!(path = %path.display(), error = %e, "post-ingest relocation failed");
        }

        Ok(applied)
    }

    /// Record a terminal failure: move the file (if still present) to the
    /// failed area with the reason persisted alongside. Failed files are
    /// never retried automatically; the operator re-drops them.
    pub async fn record_failure(&self, claimed: &ClaimedJob, err: &PipelineError) {
        let path = &claimed.job.source_path;
        let outcome = OutcomeRecord {
            source_file: path.display().to_string(),
            ticker: ticker_from_path(path).ok(),
            vendor: claimed.job.vendor.as_str().to_string(),
            status: "failed",
            rows_written: None,
            row_count: None,
            first_date: None,
            last_date: None,
            skipped_rows: 0,
            issues: Vec::new(),
            error: Some(err.to_string()),
            attempts: claimed.attempts,
            enqueued_at: claimed.job.enqueued_at,
            finished_at: Utc::now(),
        };

        if !path.exists() {
            error!(path = %path.display(), error = %err, "job failed, file already gone");
            return;
        }

        let dest = self.config.failed_dir.join(claimed.job.vendor.as_str());
        match relocate(path, &dest, &outcome) {
            Ok(moved) => error!(
                path = %moved.display(),
                error = %err,
                "job failed, file moved to failed area"
            ),
            Err(move_err) => error!(
                path = %path.display(),
                error = %err,
                move_error = %move_err,
                "job failed and file could not be relocated"
            ),
        }
    }
}
