//! pipeline-setup: one-time database setup.
//!
//! Creates the metadata/registry/queue tables and pre-creates the configured
//! partition year range so the ingestion hot path only ever hits the
//! idempotent fast case.

use clap::Parser;
use tracing::info;

use tickerflow_core::config::{load_dotenv, Config};
use tickerflow_queue::SqliteQueue;
use tickerflow_store::Store;

/// Create tables and yearly partitions for the price store.
#[derive(Parser, Debug)]
#[command(name = "pipeline-setup", version, about)]
struct Cli {
    /// Only create tables; leave partitions to be created lazily on ingest.
    #[arg(long)]
    skip_partitions: bool,
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
    let config = Config::from_env();
    config.log_summary();

    let store = Store::connect(config.store.clone()).await?;
    store.ensure_schema().await?;

    // The queue lives in the same database file.
    SqliteQueue::connect(&config.store.db_path, config.pipeline.max_attempts).await?;

    if !cli.skip_partitions {
        for year in config.store.min_year..=config.store.max_year {
            store.ensure_partition(year).await?;
        }
        info!(
            from = config.store.min_year,
            to = config.store.max_year,
            "partitions created"
        );
    }

    info!("setup complete");
    Ok(())
}
