//! Integration tests for the partitioned store: idempotent partitions,
//! upsert semantics, metadata reconciliation, and concurrent workers.

use std::str::FromStr;
use std::time::Duration;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use uuid::Uuid;

use tickerflow_core::config::StoreConfig;
use tickerflow_core::PriceRecord;
use tickerflow_store::{Store, StoreError};

// ============================================================================
// Test Helpers
// ============================================================================

fn test_config() -> StoreConfig {
    let dir = std::env::temp_dir().join(format!("tickerflow-test-{}", Uuid::new_v4()));
    std::fs::create_dir_all(&dir).unwrap();
    StoreConfig {
        db_path: dir.join("store.db"),
        max_connections: 5,
        chunk_size: 2000,
        batch_timeout: Duration::from_secs(30),
        min_year: 1990,
        max_year: 2026,
    }
}

async fn make_store() -> Store {
    let store = Store::connect(test_config()).await.unwrap();
    store.ensure_schema().await.unwrap();
    store
}

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn dec(s: &str) -> Decimal {
    Decimal::from_str(s).unwrap()
}

/// Record with a close price and volume; other fields left empty.
fn rec(ticker: &str, day: NaiveDate, close: &str, volume: i64) -> PriceRecord {
    let mut record = PriceRecord::new(ticker, day);
    record.close = Some(dec(close));
    record.volume = Some(volume);
    record
}

// ============================================================================
// Partitions
// ============================================================================

#[tokio::test]
async fn test_ensure_partition_is_idempotent() {
    let store = make_store().await;
    store.ensure_partition(2024).await.unwrap();
    store.ensure_partition(2024).await.unwrap();
    assert_eq!(store.partition_years().await.unwrap(), vec![2024]);
}

#[tokio::test]
async fn test_concurrent_partition_first_touch() {
    let store = make_store().await;
    let (a, b) = tokio::join!(store.ensure_partition(2023), store.ensure_partition(2023));
    a.unwrap();
    b.unwrap();
    assert_eq!(store.partition_years().await.unwrap(), vec![2023]);
}

#[tokio::test]
async fn test_out_of_range_year_is_validation_error() {
    let store = make_store().await;
    let records = vec![rec("AAPL", date(1971, 6, 1), "0.10", 100)];
    let err = store.apply("AAPL", &records).await.unwrap_err();
    assert!(matches!(err, StoreError::PartitionRange { year: 1971, .. }));
    assert!(!err.retryable());
    // Nothing was written and no partition appeared.
    assert!(store.partition_years().await.unwrap().is_empty());
    assert!(store.metadata("AAPL").await.unwrap().is_none());
}

// ============================================================================
// Upsert + metadata
// ============================================================================

#[tokio::test]
async fn test_apply_then_overlapping_reingest() {
    let store = make_store().await;

    // First file: three consecutive days.
    let first = vec![
        rec("AAPL", date(2024, 1, 2), "185.64", 82_488_700),
        rec("AAPL", date(2024, 1, 3), "184.25", 58_414_500),
        rec("AAPL", date(2024, 1, 4), "181.91", 71_983_600),
    ];
    let report = store.apply("AAPL", &first).await.unwrap();
    assert_eq!(report.row_count, 3);
    assert_eq!(report.first_date, date(2024, 1, 2));
    assert_eq!(report.last_date, date(2024, 1, 4));

    // Second file: one overlapping date with a new close, one new date.
    let second = vec![
        rec("AAPL", date(2024, 1, 3), "190.00", 60_000_000),
        rec("AAPL", date(2024, 1, 5), "182.68", 62_303_300),
    ];
    let report = store.apply("AAPL", &second).await.unwrap();
    assert_eq!(report.row_count, 4);
    assert_eq!(report.last_date, date(2024, 1, 5));

    let rows = store.fetch_prices("AAPL", None, None).await.unwrap();
    assert_eq!(rows.len(), 4);
    let overlapped = rows.iter().find(|r| r.date == date(2024, 1, 3)).unwrap();
    assert_eq!(overlapped.close, Some(dec("190.00")));
    assert_eq!(overlapped.volume, Some(60_000_000));
}

#[tokio::test]
async fn test_reingest_same_file_is_idempotent() {
    let store = make_store().await;
    let records = vec![
        rec("MSFT", date(2024, 2, 1), "403.78", 23_000_000),
        rec("MSFT", date(2024, 2, 2), "411.22", 21_000_000),
    ];

    let first = store.apply("MSFT", &records).await.unwrap();
    let second = store.apply("MSFT", &records).await.unwrap();

    assert_eq!(first.row_count, 2);
    assert_eq!(second.row_count, 2);
    assert_eq!(store.fetch_prices("MSFT", None, None).await.unwrap().len(), 2);
}

#[tokio::test]
async fn test_year_spanning_file_creates_both_partitions() {
    let store = make_store().await;
    let records = vec![
        rec("TSLA", date(2023, 12, 29), "248.48", 100),
        rec("TSLA", date(2024, 1, 2), "248.42", 200),
    ];
    store.apply("TSLA", &records).await.unwrap();

    assert_eq!(store.partition_years().await.unwrap(), vec![2023, 2024]);
    let rows = store.fetch_prices("TSLA", None, None).await.unwrap();
    assert_eq!(rows.len(), 2);
    // Ascending across the partition boundary.
    assert_eq!(rows[0].date, date(2023, 12, 29));
    assert_eq!(rows[1].date, date(2024, 1, 2));
}

#[tokio::test]
async fn test_disjoint_upserts_commute() {
    let file_a = vec![
        rec("NVDA", date(2024, 3, 1), "822.79", 1000),
        rec("NVDA", date(2024, 3, 4), "852.37", 1100),
    ];
    let file_b = vec![
        rec("NVDA", date(2024, 3, 5), "859.64", 1200),
        rec("NVDA", date(2024, 3, 6), "887.00", 1300),
    ];

    let ab = make_store().await;
    ab.apply("NVDA", &file_a).await.unwrap();
    ab.apply("NVDA", &file_b).await.unwrap();

    let ba = make_store().await;
    ba.apply("NVDA", &file_b).await.unwrap();
    ba.apply("NVDA", &file_a).await.unwrap();

    let rows_ab = ab.fetch_prices("NVDA", None, None).await.unwrap();
    let rows_ba = ba.fetch_prices("NVDA", None, None).await.unwrap();
    assert_eq!(rows_ab, rows_ba);
    assert_eq!(
        ab.metadata("NVDA").await.unwrap().unwrap().row_count,
        ba.metadata("NVDA").await.unwrap().unwrap().row_count,
    );
}

#[tokio::test]
async fn test_metadata_always_matches_aggregate() {
    let store = make_store().await;
    for (day, close) in [(1, "10"), (2, "11"), (3, "12")] {
        store
            .apply("IBM", &[rec("IBM", date(2024, 4, day), close, 500)])
            .await
            .unwrap();

        let meta = store.metadata("IBM").await.unwrap().unwrap();
        let rows = store.fetch_prices("IBM", None, None).await.unwrap();
        assert_eq!(meta.row_count as usize, rows.len());
        assert_eq!(meta.first_date, rows.first().unwrap().date);
        assert_eq!(meta.last_date, rows.last().unwrap().date);
    }
}

#[tokio::test]
async fn test_concurrent_same_ticker_disjoint_dates() {
    let store = make_store().await;
    let file_a: Vec<_> = (2..=6)
        .map(|d| rec("AMD", date(2024, 5, d), "160.5", 100))
        .collect();
    let file_b: Vec<_> = (13..=17)
        .map(|d| rec("AMD", date(2024, 5, d), "158.0", 100))
        .collect();

    let store_a = store.clone();
    let store_b = store.clone();
    let (a, b) = tokio::join!(
        tokio::spawn(async move { store_a.apply("AMD", &file_a).await }),
        tokio::spawn(async move { store_b.apply("AMD", &file_b).await }),
    );
    a.unwrap().unwrap();
    b.unwrap().unwrap();

    // Whichever worker refreshed last, the rollup is the full sum.
    let meta = store.metadata("AMD").await.unwrap().unwrap();
    assert_eq!(meta.row_count, 10);
    assert_eq!(meta.first_date, date(2024, 5, 2));
    assert_eq!(meta.last_date, date(2024, 5, 17));
}

#[tokio::test]
async fn test_batch_timeout_fails_file_without_metadata() {
    let mut config = test_config();
    config.batch_timeout = Duration::ZERO;
    let store = Store::connect(config).await.unwrap();
    store.ensure_schema().await.unwrap();

    let records = vec![rec("META", date(2024, 9, 2), "512.3", 100)];
    let err = store.apply("META", &records).await.unwrap_err();

    // An expired write budget surfaces as a retryable file failure rather
    // than hanging the worker; the rollup stays untouched for the retry.
    assert!(matches!(err, StoreError::Timeout(_)));
    assert!(err.retryable());
    assert!(store.metadata("META").await.unwrap().is_none());
}

#[tokio::test]
async fn test_chunked_writes_cover_all_rows() {
    let mut config = test_config();
    config.chunk_size = 2;
    let store = Store::connect(config).await.unwrap();
    store.ensure_schema().await.unwrap();

    let records: Vec<_> = (1..=7)
        .map(|d| rec("GOOG", date(2024, 6, d), "175.0", 100))
        .collect();
    let report = store.apply("GOOG", &records).await.unwrap();
    assert_eq!(report.rows_written, 7);
    assert_eq!(report.row_count, 7);
}

#[tokio::test]
async fn test_decimal_precision_roundtrips() {
    let store = make_store().await;
    let mut record = rec("BRK.A", date(2024, 7, 1), "621504.9001", 12);
    record.split_factor = Some(dec("1.000001"));
    record.div_cash = Some(dec("0.00"));
    store.apply("BRK.A", &[record.clone()]).await.unwrap();

    let rows = store.fetch_prices("BRK.A", None, None).await.unwrap();
    assert_eq!(rows[0].close, Some(dec("621504.9001")));
    assert_eq!(rows[0].split_factor, Some(dec("1.000001")));
    assert_eq!(rows[0].div_cash, Some(dec("0.00")));
}

#[tokio::test]
async fn test_date_range_queries() {
    let store = make_store().await;
    let records: Vec<_> = (1..=10)
        .map(|d| rec("SPY", date(2024, 8, d), "550.0", 100))
        .collect();
    store.apply("SPY", &records).await.unwrap();

    let window = store
        .fetch_prices("SPY", Some(date(2024, 8, 3)), Some(date(2024, 8, 6)))
        .await
        .unwrap();
    assert_eq!(window.len(), 4);
    assert_eq!(window[0].date, date(2024, 8, 3));
    assert_eq!(window[3].date, date(2024, 8, 6));
}

#[tokio::test]
async fn test_stats_and_tickers() {
    let store = make_store().await;
    store
        .apply("AAPL", &[rec("AAPL", date(2024, 1, 2), "185.64", 100)])
        .await
        .unwrap();
    store
        .apply("MSFT", &[rec("MSFT", date(2023, 12, 29), "376.04", 100)])
        .await
        .unwrap();

    assert_eq!(store.tickers().await.unwrap(), vec!["AAPL", "MSFT"]);
    let stats = store.stats().await.unwrap();
    assert_eq!(stats.total_rows, 2);
    assert_eq!(stats.total_tickers, 2);
    assert_eq!(stats.earliest_date, Some(date(2023, 12, 29)));
    assert_eq!(stats.latest_date, Some(date(2024, 1, 2)));
}
