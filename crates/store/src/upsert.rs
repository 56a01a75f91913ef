//! Chunked batch upserts and transactional metadata reconciliation.

use std::collections::BTreeMap;

use chrono::{NaiveDate, Utc};
use serde::Serialize;
use sqlx::{QueryBuilder, Sqlite, SqliteConnection};
use tracing::{debug, info};

use tickerflow_core::PriceRecord;

use crate::partition::partition_table;
use crate::{Store, StoreError};

/// Outcome of a successful [`Store::apply`] call.
#[derive(Debug, Clone, Serialize)]
pub struct ApplyReport {
    pub ticker: String,
    pub rows_written: usize,
    pub first_date: NaiveDate,
    pub last_date: NaiveDate,
    pub row_count: i64,
}

const UPSERT_CONFLICT: &str = r#" ON CONFLICT(ticker, date) DO UPDATE SET
    open = excluded.open,
    high = excluded.high,
    low = excluded.low,
    close = excluded.close,
    volume = excluded.volume,
    adj_open = excluded.adj_open,
    adj_high = excluded.adj_high,
    adj_low = excluded.adj_low,
    adj_close = excluded.adj_close,
    adj_volume = excluded.adj_volume,
    div_cash = excluded.div_cash,
    split_factor = excluded.split_factor"#;

impl Store {
    /// Upsert `records` for one ticker and reconcile its metadata.
    ///
    /// Records are grouped by year; every needed partition is ensured before
    /// the first write. Writes go in `chunk_size` chunks, one transaction
    /// each, keyed `(ticker, date)` with conflicting rows overwritten;
    /// last write by processing time wins, regardless of which file was
    /// logically newer. A failed chunk aborts the remaining ones and leaves
    /// metadata untouched; committed chunks are harmless because a retry
    /// re-applies them idempotently.
    pub async fn apply(
        &self,
        ticker: &str,
        records: &[PriceRecord],
    ) -> Result<ApplyReport, StoreError> {
        if records.is_empty() {
            return Err(StoreError::EmptyBatch(ticker.to_string()));
        }

        let mut by_year: BTreeMap<i32, Vec<&PriceRecord>> = BTreeMap::new();
        for rec in records {
            by_year.entry(rec.year()).or_default().push(rec);
        }

        // All partitions first: a range error must surface before any write.
        for year in by_year.keys() {
            self.ensure_partition(*year).await?;
        }

        let chunk_size = self.config().chunk_size.max(1);
        let timeout = self.config().batch_timeout;
        let mut rows_written = 0usize;

        for (year, group) in &by_year {
            let table = partition_table(*year);
            for chunk in group.chunks(chunk_size) {
                tokio::time::timeout(timeout, self.write_chunk(&table, chunk))
                    .await
                    .map_err(|_| StoreError::Timeout(timeout))??;
                rows_written += chunk.len();
                debug!(ticker, year, rows = chunk.len(), "chunk committed");
            }
        }

        let meta = self.refresh_metadata(ticker).await?;
        info!(
            ticker,
            rows = rows_written,
            row_count = meta.2,
            "batch applied"
        );

        Ok(ApplyReport {
            ticker: ticker.to_string(),
            rows_written,
            first_date: meta.0,
            last_date: meta.1,
            row_count: meta.2,
        })
    }

    async fn write_chunk(
        &self,
        table: &str,
        chunk: &[&PriceRecord],
    ) -> Result<(), StoreError> {
        let mut tx = self.pool().begin().await?;

        let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new(format!(
            "INSERT INTO {table} (ticker, date, open, high, low, close, volume, \
             adj_open, adj_high, adj_low, adj_close, adj_volume, div_cash, split_factor) "
        ));
        qb.push_values(chunk, |mut b, rec| {
            b.push_bind(&rec.ticker)
                .push_bind(rec.date)
                .push_bind(rec.open.map(|d| d.to_string()))
                .push_bind(rec.high.map(|d| d.to_string()))
                .push_bind(rec.low.map(|d| d.to_string()))
                .push_bind(rec.close.map(|d| d.to_string()))
                .push_bind(rec.volume)
                .push_bind(rec.adj_open.map(|d| d.to_string()))
                .push_bind(rec.adj_high.map(|d| d.to_string()))
                .push_bind(rec.adj_low.map(|d| d.to_string()))
                .push_bind(rec.adj_close.map(|d| d.to_string()))
                .push_bind(rec.adj_volume)
                .push_bind(rec.div_cash.map(|d| d.to_string()))
                .push_bind(rec.split_factor.map(|d| d.to_string()));
        });
        qb.push(UPSERT_CONFLICT);

        qb.build().execute(&mut *tx).await?;
        tx.commit().await?;
        Ok(())
    }

    /// Recompute `(first_date, last_date, row_count)` for `ticker` from a
    /// fresh aggregate over every partition and upsert the metadata row, all
    /// inside one immediate transaction.
    ///
    /// The aggregate is never derived from an in-memory delta, so two
    /// workers finishing files for the same ticker cannot undercount each
    /// other; the later transaction sees the earlier one's rows.
    pub async fn refresh_metadata(
        &self,
        ticker: &str,
    ) -> Result<(NaiveDate, NaiveDate, i64), StoreError> {
        let mut conn = self.pool().acquire().await?;

        // IMMEDIATE takes the write lock up front; a deferred transaction
        // could fail its snapshot upgrade under concurrent writers.
        sqlx::query("BEGIN IMMEDIATE").execute(&mut *conn).await?;

        match Self::recompute_in_tx(&mut conn, ticker).await {
            Ok(agg) => {
                sqlx::query("COMMIT").execute(&mut *conn).await?;
                Ok(agg)
            }
            Err(e) => {
                let _ = sqlx::query("ROLLBACK").execute(&mut *conn).await;
                Err(e)
            }
        }
    }

    async fn recompute_in_tx(
        conn: &mut SqliteConnection,
        ticker: &str,
    ) -> Result<(NaiveDate, NaiveDate, i64), StoreError> {
        let years: Vec<(i32,)> =
            sqlx::query_as("SELECT year FROM price_partitions ORDER BY year")
                .fetch_all(&mut *conn)
                .await?;

        let mut first: Option<NaiveDate> = None;
        let mut last: Option<NaiveDate> = None;
        let mut count: i64 = 0;

        for (year,) in years {
            let table = partition_table(year);
            let (min, max, n): (Option<NaiveDate>, Option<NaiveDate>, i64) =
                sqlx::query_as(&format!(
                    "SELECT MIN(date), MAX(date), COUNT(*) FROM {table} WHERE ticker = ?"
                ))
                .bind(ticker)
                .fetch_one(&mut *conn)
                .await?;

            if n == 0 {
                continue;
            }
            count += n;
            first = match (first, min) {
                (Some(a), Some(b)) => Some(a.min(b)),
                (a, b) => a.or(b),
            };
            last = match (last, max) {
                (Some(a), Some(b)) => Some(a.max(b)),
                (a, b) => a.or(b),
            };
        }

        let (first, last) = match (first, last) {
            (Some(f), Some(l)) => (f, l),
            // No rows anywhere: drop any stale rollup.
            _ => {
                sqlx::query("DELETE FROM ticker_metadata WHERE ticker = ?")
                    .bind(ticker)
                    .execute(&mut *conn)
                    .await?;
                return Err(StoreError::EmptyBatch(ticker.to_string()));
            }
        };

        sqlx::query(
            r#"
            INSERT INTO ticker_metadata (ticker, first_date, last_date, row_count, last_updated)
            VALUES (?, ?, ?, ?, ?)
            ON CONFLICT(ticker) DO UPDATE SET
                first_date = excluded.first_date,
                last_date = excluded.last_date,
                row_count = excluded.row_count,
                last_updated = excluded.last_updated
            "#,
        )
        .bind(ticker)
        .bind(first)
        .bind(last)
        .bind(count)
        .bind(Utc::now())
        .execute(&mut *conn)
        .await?;

        Ok((first, last, count))
    }
}
