//! File relocation and outcome records.
//!
//! Operators observe job results through the processed/failed directory
//! split; every moved file gets a `<name>.outcome.json` sidecar so no
//! outcome is ever silently discarded.

use std::path::{Path, PathBuf};

use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use tracing::info;

use tickerflow_ingest::normalize::RowIssue;

/// Sidecar written next to every relocated file.
#[derive(Debug, Serialize)]
pub struct OutcomeRecord {
    pub source_file: String,
    pub ticker: Option<String>,
    pub vendor: String,
    /// "processed" or "failed".
    pub status: &'static str,
    pub rows_written: Option<usize>,
    pub row_count: Option<i64>,
    pub first_date: Option<NaiveDate>,
    pub last_date: Option<NaiveDate>,
    pub skipped_rows: usize,
    pub issues: Vec<RowIssue>,
    pub error: Option<String>,
    pub attempts: u32,
    pub enqueued_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

/// Move `src` into `dest_dir` (created if needed) and drop the outcome
/// sidecar next to it. An existing file of the same name is replaced, so a
/// re-dropped file's newest outcome wins.
pub fn relocate(
    src: &Path,
    dest_dir: &Path,
    outcome: &OutcomeRecord,
) -> std::io::Result<PathBuf> {
    std::fs::create_dir_all(dest_dir)?;
    let name = src
        .file_name()
        .ok_or_else(|| std::io::Error::other(format!("no file name: {}", src.display())))?;
    let dest = dest_dir.join(name);
    if dest.exists() {
        std::fs::remove_file(&dest)?;
    }

    // rename does not cross filesystems; fall back to copy + remove.
    if std::fs::rename(src, &dest).is_err() {
        std::fs::copy(src, &dest)?;
        std::fs::remove_file(src)?;
    }

    write_sidecar(&dest, outcome)?;
    info!(
        file = %dest.display(),
        status = outcome.status,
        "file relocated"
    );
    Ok(dest)
}

/// Write just the sidecar (used when there is no file left to move).
pub fn write_sidecar(moved_to: &Path, outcome: &OutcomeRecord) -> std::io::Result<()> {
    let sidecar = sidecar_path(moved_to);
    let json = serde_json::to_vec_pretty(outcome)
        .map_err(|e| std::io::Error::other(e.to_string()))?;
    std::fs::write(sidecar, json)
}

/// `AAPL.csv` → `AAPL.csv.outcome.json`, next to the moved file.
pub fn sidecar_path(moved_to: &Path) -> PathBuf {
    let mut name = moved_to.as_os_str().to_os_string();
    name.push(".outcome.json");
    PathBuf::from(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sidecar_path() {
        assert_eq!(
            sidecar_path(Path::new("/data/processed/tiingo/AAPL.csv")),
            PathBuf::from("/data/processed/tiingo/AAPL.csv.outcome.json")
        );
    }
}
