use thiserror::Error;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("unknown vendor: {0}")]
    UnknownVendor(String),

    #[error("invalid ticker: {0}")]
    InvalidTicker(String),

    #[error("cannot derive ticker from path: {0}")]
    TickerFromPath(String),
}
