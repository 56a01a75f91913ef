//! Durable at-least-once ingestion job queue.
//!
//! The queue exclusively owns job lifecycle state (pending → running →
//! done/failed). Delivery is at-least-once: a claimed job whose lease
//! expires is redelivered, and consumers rely on the store's idempotent
//! upsert to make re-processing harmless. Jobs are never silently dropped.

pub mod error;
pub mod job;
pub mod sqlite;

pub use error::QueueError;
pub use job::{ClaimedJob, IngestJob, JobDisposition, JobQueue, QueueDepth};
pub use sqlite::SqliteQueue;
