//! Ingestion worker pool.
//!
//! Workers pull jobs from the shared queue, run the normalizer and batch
//! upserter, and relocate each source file to the processed or failed area
//! with a JSON outcome record. A job's failure never takes down the pool;
//! every error is converted to a file outcome at the job boundary.

pub mod error;
pub mod outcome;
pub mod process;
pub mod worker;

pub use error::PipelineError;
pub use outcome::OutcomeRecord;
pub use process::JobProcessor;
pub use worker::WorkerPool;
