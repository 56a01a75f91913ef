//! Vendor CSV normalization.
//!
//! Absorbs vendor schema differences so the upserter only ever sees the
//! canonical [`tickerflow_core::PriceRecord`] shape.

pub mod error;
pub mod normalize;

pub use error::IngestError;
pub use normalize::{normalize, read_csv, normalize_file, NormalizeReport, RowIssue};
