//! Year-partitioned SQLite price store.
//!
//! One [`Store`] handle owns the connection pool. Prices live in one physical
//! table per calendar year (`price_data_pYYYY`), keyed by `(ticker, date)`;
//! rollups live in `ticker_metadata` and are recomputed transactionally from
//! a fresh aggregate after every successful batch. Price columns are stored
//! as TEXT so decimal precision is carried exactly as the normalizer emitted
//! it.

pub mod error;
pub mod partition;
pub mod query;
pub mod schema;
pub mod upsert;

use std::time::Duration;

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::SqlitePool;
use tracing::info;

use tickerflow_core::config::StoreConfig;

pub use error::StoreError;
pub use upsert::ApplyReport;

/// Handle over the price store.
#[derive(Clone)]
pub struct Store {
    pool: SqlitePool,
    config: StoreConfig,
}

impl Store {
    /// Open (creating if missing) the database file and connection pool.
    pub async fn connect(config: StoreConfig) -> Result<Self, StoreError> {
        if let Some(parent) = config.db_path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let options = SqliteConnectOptions::new()
            .filename(&config.db_path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .busy_timeout(Duration::from_secs(5))
            .foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(config.max_connections)
            .connect_with(options)
            .await?;

        info!(db = %config.db_path.display(), "store connected");
        Ok(Self { pool, config })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }
}
