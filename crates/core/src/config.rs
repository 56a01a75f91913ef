use std::env;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Load .env file (silently ignores if missing).
pub fn load_dotenv() {
    dotenvy::dotenv().ok();
}

fn env_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_opt(key: &str) -> Option<String> {
    env::var(key).ok().filter(|s| !s.is_empty())
}

fn env_u32(key: &str, default: u32) -> u32 {
    env_opt(key).and_then(|v| v.parse().ok()).unwrap_or(default)
}

fn env_u64(key: &str, default: u64) -> u64 {
    env_opt(key).and_then(|v| v.parse().ok()).unwrap_or(default)
}

fn env_i32(key: &str, default: i32) -> i32 {
    env_opt(key).and_then(|v| v.parse().ok()).unwrap_or(default)
}

fn env_f64(key: &str, default: f64) -> f64 {
    env_opt(key).and_then(|v| v.parse().ok()).unwrap_or(default)
}

fn env_bool(key: &str, default: bool) -> bool {
    env_opt(key)
        .map(|v| matches!(v.as_str(), "1" | "true" | "yes"))
        .unwrap_or(default)
}

// ── Top-level config ──────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub store: StoreConfig,
    pub watch: WatchConfig,
    pub pipeline: PipelineConfig,
}

impl Config {
    /// Build config from environment variables (call `load_dotenv()` first).
    pub fn from_env() -> Self {
        Self {
            store: StoreConfig::from_env(),
            watch: WatchConfig::from_env(),
            pipeline: PipelineConfig::from_env(),
        }
    }

    /// Print a summary for startup logs.
    pub fn log_summary(&self) {
        tracing::info!("Config loaded:");
        tracing::info!(
            "  store:    db={}, chunk_size={}, years={}..={}",
            self.store.db_path.display(),
            self.store.chunk_size,
            self.store.min_year,
            self.store.max_year
        );
        tracing::info!(
            "  watch:    raw={}, poll={:?}, scan_existing={}",
            self.watch.raw_dir.display(),
            self.watch.poll_interval,
            self.watch.scan_existing
        );
        tracing::info!(
            "  pipeline: workers={}, processed={}, failed={}, tolerance={}",
            self.pipeline.worker_count,
            self.pipeline.processed_dir.display(),
            self.pipeline.failed_dir.display(),
            self.pipeline.row_tolerance
        );
    }
}

// ── Store ─────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// SQLite database file holding prices, metadata, and the job queue.
    pub db_path: PathBuf,
    pub max_connections: u32,
    /// Rows per upsert chunk. Bounded so the SQLite bind-parameter count
    /// stays under the engine limit.
    pub chunk_size: usize,
    /// A chunk write exceeding this duration fails the file instead of
    /// hanging a worker.
    pub batch_timeout: Duration,
    /// Supported partition year range, inclusive. Dates outside it are a
    /// validation error.
    pub min_year: i32,
    pub max_year: i32,
}

impl StoreConfig {
    pub fn from_env() -> Self {
        Self {
            db_path: PathBuf::from(env_or("TICKERFLOW_DB", "data/tickerflow.db")),
            max_connections: env_u32("STORE_MAX_CONNECTIONS", 8),
            chunk_size: env_u32("STORE_CHUNK_SIZE", 2000) as usize,
            batch_timeout: Duration::from_secs(env_u64("STORE_BATCH_TIMEOUT_SECS", 30)),
            min_year: env_i32("PARTITION_MIN_YEAR", 1990),
            max_year: env_i32("PARTITION_MAX_YEAR", 2026),
        }
    }
}

// ── Watcher ───────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WatchConfig {
    /// Drop-directory root. Either flat ticker-named files or one subfolder
    /// per vendor tag.
    pub raw_dir: PathBuf,
    /// Interval between stability polls. A file is enqueued only after its
    /// size/mtime are unchanged across two successive polls.
    pub poll_interval: Duration,
    /// Enqueue every stable file already present at startup (catch-up mode).
    pub scan_existing: bool,
    /// Force one vendor for all files instead of deriving it from subfolders.
    pub vendor_override: Option<String>,
}

impl WatchConfig {
    pub fn from_env() -> Self {
        Self {
            raw_dir: PathBuf::from(env_or("RAW_DIR", "data/raw")),
            poll_interval: Duration::from_millis(env_u64("WATCH_POLL_INTERVAL_MS", 2000)),
            scan_existing: env_bool("WATCH_SCAN_EXISTING", false),
            vendor_override: env_opt("WATCH_VENDOR"),
        }
    }
}

// ── Pipeline / workers ────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    pub processed_dir: PathBuf,
    pub failed_dir: PathBuf,
    pub worker_count: usize,
    /// Idle sleep between queue polls when no job is available.
    pub idle_poll: Duration,
    /// Claim lease; a worker that dies mid-job has its job redelivered after
    /// this long.
    pub job_lease: Duration,
    /// Attempts before a retryable failure becomes terminal.
    pub max_attempts: u32,
    /// Maximum fraction of bad rows a file may carry and still ingest.
    pub row_tolerance: f64,
}

impl PipelineConfig {
    pub fn from_env() -> Self {
        Self {
            processed_dir: PathBuf::from(env_or("PROCESSED_DIR", "data/processed")),
            failed_dir: PathBuf::from(env_or("FAILED_DIR", "data/failed")),
            worker_count: env_u32("WORKER_COUNT", 4) as usize,
            idle_poll: Duration::from_millis(env_u64("WORKER_IDLE_POLL_MS", 500)),
            job_lease: Duration::from_secs(env_u64("JOB_LEASE_SECS", 1800)),
            max_attempts: env_u32("JOB_MAX_ATTEMPTS", 3),
            row_tolerance: env_f64("INGEST_ROW_TOLERANCE", 0.10),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_without_env() {
        // Defaults only exercise keys unlikely to be set in CI.
        let store = StoreConfig::from_env();
        assert_eq!(store.chunk_size, 2000);
        assert!(store.min_year <= store.max_year);

        let pipeline = PipelineConfig::from_env();
        assert!(pipeline.worker_count >= 1);
        assert!(pipeline.row_tolerance > 0.0 && pipeline.row_tolerance < 1.0);
    }
}
