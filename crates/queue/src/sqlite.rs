//! SQLite-backed queue implementation.
//!
//! One `ingest_jobs` table; claims are a single `UPDATE .. RETURNING` so two
//! workers can never lease the same job. Lease expiry turns a stuck running
//! job back into a claimable one (at-least-once redelivery).

use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::{Row, SqlitePool};
use tracing::{debug, info, warn};

use tickerflow_core::Vendor;

use crate::error::QueueError;
use crate::job::{ClaimedJob, IngestJob, JobDisposition, JobQueue, QueueDepth};

pub struct SqliteQueue {
    pool: SqlitePool,
    max_attempts: u32,
}

impl SqliteQueue {
    /// Open (creating if missing) the queue database.
    pub async fn connect(db_path: &Path, max_attempts: u32) -> Result<Self, QueueError> {
        if let Some(parent) = db_path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let options = SqliteConnectOptions::new()
            .filename(db_path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .busy_timeout(Duration::from_secs(5));

        let pool = SqlitePoolOptions::new()
            .max_connections(4)
            .connect_with(options)
            .await?;

        let queue = Self::from_pool(pool, max_attempts);
        queue.ensure_schema().await?;
        info!(db = %db_path.display(), "job queue ready");
        Ok(queue)
    }

    /// Wrap an existing pool (used when the queue shares the store's file).
    pub fn from_pool(pool: SqlitePool, max_attempts: u32) -> Self {
        Self { pool, max_attempts }
    }

    pub async fn ensure_schema(&self) -> Result<(), QueueError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS ingest_jobs (
                id               INTEGER PRIMARY KEY AUTOINCREMENT,
                source_path      TEXT NOT NULL,
                vendor           TEXT NOT NULL,
                state            TEXT NOT NULL DEFAULT 'pending',
                attempts         INTEGER NOT NULL DEFAULT 0,
                enqueued_at      TEXT NOT NULL,
                lease_expires_at TEXT,
                last_error       TEXT
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_ingest_jobs_state ON ingest_jobs (state, id)",
        )
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

#[async_trait]
impl JobQueue for SqliteQueue {
    async fn enqueue(&self, job: &IngestJob) -> Result<bool, QueueError> {
        let path = job.source_path.to_string_lossy().to_string();
        let result = sqlx::query(
            r#"
            INSERT INTO ingest_jobs (source_path, vendor, state, enqueued_at)
            SELECT ?, ?, 'pending', ?
            WHERE NOT EXISTS (
                SELECT 1 FROM ingest_jobs
                WHERE source_path = ? AND state IN ('pending', 'running')
            )
            "#,
        )
        .bind(&path)
        .bind(job.vendor.as_str())
        .bind(job.enqueued_at)
        .bind(&path)
        .execute(&self.pool)
        .await?;

        let inserted = result.rows_affected() > 0;
        if inserted {
            info!(path = %path, vendor = %job.vendor, "job enqueued");
        } else {
            debug!(path = %path, "already queued, skipping");
        }
        Ok(inserted)
    }

    async fn claim(&self, lease: Duration) -> Result<Option<ClaimedJob>, QueueError> {
        let now = Utc::now();
        let lease_until = now + chrono::Duration::from_std(lease).unwrap_or_default();

        let row = sqlx::query(
            r#"
            UPDATE ingest_jobs
            SET state = 'running', attempts = attempts + 1, lease_expires_at = ?
            WHERE id = (
                SELECT id FROM ingest_jobs
                WHERE state = 'pending'
                   OR (state = 'running' AND lease_expires_at <= ?)
                ORDER BY id
                LIMIT 1
            )
            RETURNING id, source_path, vendor, enqueued_at, attempts
            "#,
        )
        .bind(lease_until)
        .bind(now)
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let id: i64 = row.try_get("id")?;
        let vendor_raw: String = row.try_get("vendor")?;
        let vendor = Vendor::from_str(&vendor_raw)
            .map_err(|e| QueueError::Parse(format!("job {id}: {e}")))?;
        let claimed = ClaimedJob {
            id,
            job: IngestJob {
                source_path: PathBuf::from(row.try_get::<String, _>("source_path")?),
                vendor,
                enqueued_at: row.try_get("enqueued_at")?,
            },
            attempts: row.try_get::<i64, _>("attempts")? as u32,
        };
        debug!(id, attempts = claimed.attempts, "job claimed");
        Ok(Some(claimed))
    }

    async fn complete(&self, id: i64) -> Result<(), QueueError> {
        let result = sqlx::query(
            "UPDATE ingest_jobs SET state = 'done', lease_expires_at = NULL WHERE id = ?",
        )
        .bind(id)
        .execute(&self.pool)
        .await?;
        if result.rows_affected() == 0 {
            return Err(QueueError::NotFound(id));
        }
        debug!(id, "job done");
        Ok(())
    }

    async fn fail(
        &self,
        id: i64,
        reason: &str,
        retryable: bool,
    ) -> Result<JobDisposition, QueueError> {
        let attempts: Option<(i64,)> =
            sqlx::query_as("SELECT attempts FROM ingest_jobs WHERE id = ?")
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;
        let Some((attempts,)) = attempts else {
            return Err(QueueError::NotFound(id));
        };

        if retryable && (attempts as u32) < self.max_attempts {
            sqlx::query(
                "UPDATE ingest_jobs SET state = 'pending', lease_expires_at = NULL, \
                 last_error = ? WHERE id = ?",
            )
            .bind(reason)
            .bind(id)
            .execute(&self.pool)
            .await?;
            warn!(id, attempts, reason, "job requeued");
            Ok(JobDisposition::Requeued)
        } else {
            sqlx::query(
                "UPDATE ingest_jobs SET state = 'failed', lease_expires_at = NULL, \
                 last_error = ? WHERE id = ?",
            )
            .bind(reason)
            .bind(id)
            .execute(&self.pool)
            .await?;
            warn!(id, attempts, reason, "job failed terminally");
            Ok(JobDisposition::Terminal)
        }
    }

    async fn depth(&self) -> Result<QueueDepth, QueueError> {
        let rows: Vec<(String, i64)> =
            sqlx::query_as("SELECT state, COUNT(*) FROM ingest_jobs GROUP BY state")
                .fetch_all(&self.pool)
                .await?;

        let mut depth = QueueDepth::default();
        for (state, count) in rows {
            let count = count as u64;
            match state.as_str() {
                "pending" => depth.pending = count,
                "running" => depth.running = count,
                "done" => depth.done = count,
                "failed" => depth.failed = count,
                other => warn!(state = other, "unknown job state in queue table"),
            }
        }
        Ok(depth)
    }
}
