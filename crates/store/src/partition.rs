//! Yearly partition management.
//!
//! A partition is a physical `price_data_pYYYY` table plus a row in the
//! `price_partitions` registry. Creation is idempotent and safe under
//! concurrent first-touch: when two workers race, the loser's
//! `IF NOT EXISTS` / `OR IGNORE` outcome is success, not failure.

use tracing::debug;

use crate::{Store, StoreError};

/// Table name for a partition year. Callers must have range-checked `year`.
pub(crate) fn partition_table(year: i32) -> String {
    format!("price_data_p{year}")
}

impl Store {
    /// Validate `year` against the configured range.
    pub fn check_year(&self, year: i32) -> Result<(), StoreError> {
        let (min, max) = (self.config().min_year, self.config().max_year);
        if year < min || year > max {
            return Err(StoreError::PartitionRange { year, min, max });
        }
        Ok(())
    }

    /// Create the partition for `year` if absent and register it.
    pub async fn ensure_partition(&self, year: i32) -> Result<(), StoreError> {
        self.check_year(year)?;
        let table = partition_table(year);

        sqlx::query(&format!(
            r#"
            CREATE TABLE IF NOT EXISTS {table} (
                ticker       TEXT NOT NULL,
                date         TEXT NOT NULL,
                open         TEXT,
                high         TEXT,
                low          TEXT,
                close        TEXT,
                volume       INTEGER,
                adj_open     TEXT,
                adj_high     TEXT,
                adj_low      TEXT,
                adj_close    TEXT,
                adj_volume   INTEGER,
                div_cash     TEXT,
                split_factor TEXT,
                created_at   TEXT NOT NULL DEFAULT (datetime('now')),
                PRIMARY KEY (ticker, date)
            )
            "#
        ))
        .execute(self.pool())
        .await?;

        sqlx::query(&format!(
            "CREATE INDEX IF NOT EXISTS idx_{table}_date ON {table} (date)"
        ))
        .execute(self.pool())
        .await?;

        sqlx::query("INSERT OR IGNORE INTO price_partitions (year) VALUES (?)")
            .bind(year)
            .execute(self.pool())
            .await?;

        debug!(year, "partition ready");
        Ok(())
    }

    /// Registered partition years, ascending.
    pub async fn partition_years(&self) -> Result<Vec<i32>, StoreError> {
        let years: Vec<(i32,)> =
            sqlx::query_as("SELECT year FROM price_partitions ORDER BY year")
                .fetch_all(self.pool())
                .await?;
        Ok(years.into_iter().map(|(y,)| y).collect())
    }
}
