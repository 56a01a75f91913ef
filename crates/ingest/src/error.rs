//! Ingest error types. All of these are file-level validation failures and
//! never retried automatically.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum IngestError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("missing required columns: {0}")]
    MissingColumns(String),

    #[error("file has no data rows")]
    Empty,

    #[error("{bad} of {total} rows invalid, above tolerance {tolerance}")]
    TooManyBadRows {
        bad: usize,
        total: usize,
        tolerance: f64,
    },
}
