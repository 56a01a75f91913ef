//! Read-only surface consumed by the external query API.
//!
//! Readers may observe a ticker mid-ingestion with rows committed ahead of
//! its metadata refresh; they never observe metadata describing rows that
//! were not committed.

use std::str::FromStr;

use chrono::{DateTime, Datelike, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use sqlx::sqlite::SqliteRow;
use sqlx::Row;

use tickerflow_core::{PriceRecord, TickerMetadata};

use crate::partition::partition_table;
use crate::{Store, StoreError};

/// Whole-store statistics.
#[derive(Debug, Clone, Serialize)]
pub struct StoreStats {
    pub total_rows: i64,
    pub total_tickers: i64,
    pub earliest_date: Option<NaiveDate>,
    pub latest_date: Option<NaiveDate>,
}

fn decimal_col(row: &SqliteRow, column: &'static str) -> Result<Option<Decimal>, StoreError> {
    let raw: Option<String> = row.try_get(column)?;
    match raw {
        None => Ok(None),
        Some(s) => Decimal::from_str(&s)
            .map(Some)
            .map_err(|_| StoreError::Corrupt { column, value: s }),
    }
}

fn record_from_row(row: &SqliteRow) -> Result<PriceRecord, StoreError> {
    Ok(PriceRecord {
        ticker: row.try_get("ticker")?,
        date: row.try_get("date")?,
        open: decimal_col(row, "open")?,
        high: decimal_col(row, "high")?,
        low: decimal_col(row, "low")?,
        close: decimal_col(row, "close")?,
        volume: row.try_get("volume")?,
        adj_open: decimal_col(row, "adj_open")?,
        adj_high: decimal_col(row, "adj_high")?,
        adj_low: decimal_col(row, "adj_low")?,
        adj_close: decimal_col(row, "adj_close")?,
        adj_volume: row.try_get("adj_volume")?,
        div_cash: decimal_col(row, "div_cash")?,
        split_factor: decimal_col(row, "split_factor")?,
    })
}

impl Store {
    /// Rows for `ticker` within `[from, to]` (both optional), ascending by
    /// date across every partition the range touches.
    pub async fn fetch_prices(
        &self,
        ticker: &str,
        from: Option<NaiveDate>,
        to: Option<NaiveDate>,
    ) -> Result<Vec<PriceRecord>, StoreError> {
        let lo = from.unwrap_or_else(|| {
            NaiveDate::from_ymd_opt(self.config().min_year, 1, 1).unwrap_or(NaiveDate::MIN)
        });
        let hi = to.unwrap_or_else(|| {
            NaiveDate::from_ymd_opt(self.config().max_year, 12, 31).unwrap_or(NaiveDate::MAX)
        });

        let mut out = Vec::new();
        for year in self.partition_years().await? {
            if year < lo.year() || year > hi.year() {
                continue;
            }
            let table = partition_table(year);
            let rows = sqlx::query(&format!(
                "SELECT * FROM {table} WHERE ticker = ? AND date >= ? AND date <= ? ORDER BY date"
            ))
            .bind(ticker)
            .bind(lo)
            .bind(hi)
            .fetch_all(self.pool())
            .await?;

            for row in &rows {
                out.push(record_from_row(row)?);
            }
        }
        Ok(out)
    }

    /// Rollup row for one ticker, if any batch has ever succeeded for it.
    pub async fn metadata(&self, ticker: &str) -> Result<Option<TickerMetadata>, StoreError> {
        let row = sqlx::query(
            "SELECT ticker, first_date, last_date, row_count, last_updated \
             FROM ticker_metadata WHERE ticker = ?",
        )
        .bind(ticker)
        .fetch_optional(self.pool())
        .await?;

        row.map(|row| {
            Ok(TickerMetadata {
                ticker: row.try_get("ticker")?,
                first_date: row.try_get("first_date")?,
                last_date: row.try_get("last_date")?,
                row_count: row.try_get("row_count")?,
                last_updated: row.try_get::<DateTime<Utc>, _>("last_updated")?,
            })
        })
        .transpose()
    }

    /// All tickers with a committed rollup, sorted.
    pub async fn tickers(&self) -> Result<Vec<String>, StoreError> {
        let rows: Vec<(String,)> =
            sqlx::query_as("SELECT ticker FROM ticker_metadata ORDER BY ticker")
                .fetch_all(self.pool())
                .await?;
        Ok(rows.into_iter().map(|(t,)| t).collect())
    }

    /// Whole-store statistics from the committed rollups.
    pub async fn stats(&self) -> Result<StoreStats, StoreError> {
        let (total_rows, total_tickers, earliest, latest): (
            i64,
            i64,
            Option<NaiveDate>,
            Option<NaiveDate>,
        ) = sqlx::query_as(
            "SELECT COALESCE(SUM(row_count), 0), COUNT(*), MIN(first_date), MAX(last_date) \
             FROM ticker_metadata",
        )
        .fetch_one(self.pool())
        .await?;

        Ok(StoreStats {
            total_rows,
            total_tickers,
            earliest_date: earliest,
            latest_date: latest,
        })
    }
}
