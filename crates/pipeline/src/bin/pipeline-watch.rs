//! pipeline-watch: watch raw drop directories and enqueue ingestion jobs.

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tokio::sync::Notify;
use tracing::info;

use tickerflow_core::config::{load_dotenv, Config};
use tickerflow_queue::SqliteQueue;
use tickerflow_watch::DirWatcher;

/// Watch raw directories and enqueue CSV jobs.
#[derive(Parser, Debug)]
#[command(name = "pipeline-watch", version, about)]
struct Cli {
    /// Raw directory to watch (overrides RAW_DIR).
    #[arg(long)]
    raw_dir: Option<PathBuf>,

    /// Force a vendor tag for all files instead of per-subfolder detection.
    #[arg(long)]
    vendor: Option<String>,

    /// Enqueue existing stable CSV files on startup (catch-up after downtime).
    #[arg(long)]
    scan_existing: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    load_dotenv();
    let cli = Cli::parse();
    let mut config = Config::from_env();
    if let Some(raw_dir) = cli.raw_dir {
        config.watch.raw_dir = raw_dir;
    }
    if cli.vendor.is_some() {
        config.watch.vendor_override = cli.vendor;
    }
    if cli.scan_existing {
        config.watch.scan_existing = true;
    }
    config.log_summary();

    let queue = Arc::new(
        SqliteQueue::connect(&config.store.db_path, config.pipeline.max_attempts).await?,
    );
    let watcher = DirWatcher::new(config.watch, queue);

    let shutdown = Arc::new(Notify::new());
    let signal_shutdown = shutdown.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("shutdown signal received");
            signal_shutdown.notify_waiters();
        }
    });

    watcher.run(shutdown).await?;
    Ok(())
}
