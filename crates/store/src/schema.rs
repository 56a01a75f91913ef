//! Table setup. Called once at deploy time, not on the ingestion hot path.

use tracing::info;

use crate::{Store, StoreError};

impl Store {
    /// Create the metadata table and the partition registry if absent.
    ///
    /// Yearly partitions themselves are created lazily by
    /// [`Store::ensure_partition`] (or eagerly by `pipeline-setup`).
    pub async fn ensure_schema(&self) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS ticker_metadata (
                ticker       TEXT PRIMARY KEY,
                first_date   TEXT NOT NULL,
                last_date    TEXT NOT NULL,
                row_count    INTEGER NOT NULL DEFAULT 0,
                last_updated TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS price_partitions (
                year       INTEGER PRIMARY KEY,
                created_at TEXT NOT NULL DEFAULT (datetime('now'))
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        info!("schema ready");
        Ok(())
    }
}
