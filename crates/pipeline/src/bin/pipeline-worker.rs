//! pipeline-worker: run the ingestion worker pool against the shared queue.

use std::sync::Arc;

use clap::Parser;
use tokio::sync::Notify;
use tracing::info;

use tickerflow_core::config::{load_dotenv, Config};
use tickerflow_pipeline::{JobProcessor, WorkerPool};
use tickerflow_queue::SqliteQueue;
use tickerflow_store::Store;

/// Process queued CSV ingest jobs.
#[derive(Parser, Debug)]
#[command(name = "pipeline-worker", version, about)]
struct Cli {
    /// Number of worker slots (overrides WORKER_COUNT).
    #[arg(long)]
    workers: Option<usize>,
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
    if let Some(workers) = cli.workers {
        config.pipeline.worker_count = workers.max(1);
    }
    config.log_summary();

    let store = Store::connect(config.store.clone()).await?;
    // Safe to repeat; pipeline-setup normally ran first.
    store.ensure_schema().await?;

    let queue = Arc::new(
        SqliteQueue::connect(&config.store.db_path, config.pipeline.max_attempts).await?,
    );
    let processor = Arc::new(JobProcessor::new(store, config.pipeline.clone()));
    let pool = WorkerPool::new(queue, processor, config.pipeline);

    let shutdown = Arc::new(Notify::new());
    let signal_shutdown = shutdown.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("shutdown signal received, draining");
            signal_shutdown.notify_waiters();
        }
    });

    pool.run(shutdown).await;
    Ok(())
}
