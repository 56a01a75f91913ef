//! Canonical price record and per-ticker rollup metadata.

use std::path::Path;

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// One trading day for one instrument, in the canonical shape every vendor
/// mapping normalizes into.
///
/// `(ticker, date)` is unique across the whole store; a later write of the
/// same key overwrites the prior values (last-write-wins).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceRecord {
    pub ticker: String,
    pub date: NaiveDate,
    pub open: Option<Decimal>,
    pub high: Option<Decimal>,
    pub low: Option<Decimal>,
    pub close: Option<Decimal>,
    pub volume: Option<i64>,
    pub adj_open: Option<Decimal>,
    pub adj_high: Option<Decimal>,
    pub adj_low: Option<Decimal>,
    pub adj_close: Option<Decimal>,
    pub adj_volume: Option<i64>,
    pub div_cash: Option<Decimal>,
    pub split_factor: Option<Decimal>,
}

impl PriceRecord {
    /// Empty record for a (ticker, date) key; fields are filled in by the
    /// normalizer as vendor columns are parsed.
    pub fn new(ticker: impl Into<String>, date: NaiveDate) -> Self {
        Self {
            ticker: ticker.into(),
            date,
            open: None,
            high: None,
            low: None,
            close: None,
            volume: None,
            adj_open: None,
            adj_high: None,
            adj_low: None,
            adj_close: None,
            adj_volume: None,
            div_cash: None,
            split_factor: None,
        }
    }

    /// Partition year this record belongs to.
    pub fn year(&self) -> i32 {
        use chrono::Datelike;
        self.date.year()
    }
}

/// Rollup row kept in `ticker_metadata`, always equal to the aggregate of
/// the ticker's price rows after a successful batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TickerMetadata {
    pub ticker: String,
    pub first_date: NaiveDate,
    pub last_date: NaiveDate,
    pub row_count: i64,
    pub last_updated: DateTime<Utc>,
}

/// Validate a ticker symbol: 1–10 chars, uppercase alphanumeric plus `.`/`-`.
pub fn validate_ticker(ticker: &str) -> Result<(), CoreError> {
    let ok = !ticker.is_empty()
        && ticker.len() <= 10
        && ticker
            .chars()
            .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit() || c == '.' || c == '-');
    if ok {
        Ok(())
    } else {
        Err(CoreError::InvalidTicker(ticker.to_string()))
    }
}

/// Derive the ticker symbol from a dropped file's stem (`AAPL.csv` → `AAPL`).
pub fn ticker_from_path(path: &Path) -> Result<String, CoreError> {
    let stem = path
        .file_stem()
        .and_then(|s| s.to_str())
        .ok_or_else(|| CoreError::TickerFromPath(path.display().to_string()))?;
    let ticker = stem.to_ascii_uppercase();
    validate_ticker(&ticker)?;
    Ok(ticker)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_validate_ticker() {
        assert!(validate_ticker("AAPL").is_ok());
        assert!(validate_ticker("BRK.B").is_ok());
        assert!(validate_ticker("BF-B").is_ok());
        assert!(validate_ticker("").is_err());
        assert!(validate_ticker("aapl").is_err());
        assert!(validate_ticker("WAYTOOLONGSYM").is_err());
    }

    #[test]
    fn test_ticker_from_path_uppercases_stem() {
        let path = PathBuf::from("/data/raw/tiingo/msft.csv");
        assert_eq!(ticker_from_path(&path).unwrap(), "MSFT");
    }

    #[test]
    fn test_record_year() {
        let date = NaiveDate::from_ymd_opt(2024, 1, 2).unwrap();
        let rec = PriceRecord::new("AAPL", date);
        assert_eq!(rec.year(), 2024);
    }
}
