//! Store error types.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Sqlx(#[from] sqlx::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("date year {year} outside supported partition range {min}..={max}")]
    PartitionRange { year: i32, min: i32, max: i32 },

    #[error("batch write timed out after {0:?}")]
    Timeout(std::time::Duration),

    #[error("empty batch for ticker {0}")]
    EmptyBatch(String),

    #[error("malformed stored value in column {column}: {value}")]
    Corrupt { column: &'static str, value: String },
}

impl StoreError {
    /// Whether a retry of the whole job can reasonably succeed.
    ///
    /// Lock contention, pool exhaustion, and timeouts are transient; range
    /// and decode errors are not.
    pub fn retryable(&self) -> bool {
        match self {
            StoreError::Timeout(_) => true,
            StoreError::Io(_) => true,
            StoreError::Sqlx(sqlx::Error::PoolTimedOut) => true,
            StoreError::Sqlx(sqlx::Error::Io(_)) => true,
            StoreError::Sqlx(sqlx::Error::Database(db)) => {
                let msg = db.message().to_ascii_lowercase();
                msg.contains("locked") || msg.contains("busy")
            }
            _ => false,
        }
    }
}
