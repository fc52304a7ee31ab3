//! catalog-sync - Resilient batch synchronization of a remote product catalog
//!
//! This is the main entry point for the catalog-sync binary.

use std::sync::Arc;

use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use catalog_sync::catalog::HttpCatalogClient;
use catalog_sync::config::Config;
use catalog_sync::database::SqliteStore;
use catalog_sync::sync::SyncPipeline;

/// catalog-sync - Resilient batch synchronization of a remote product catalog
#[derive(Parser, Debug)]
#[command(name = "catalog-sync")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the configuration file
    #[arg(short, long, env = "CATALOG_SYNC_CONFIG")]
    config: Option<String>,

    /// First page to synchronize (overrides config)
    #[arg(long)]
    start_page: Option<u32>,

    /// Last page to synchronize, inclusive (overrides config)
    #[arg(long)]
    end_page: Option<u32>,

    /// Target language (overrides config)
    #[arg(long)]
    lang: Option<String>,

    /// Pages processed concurrently (overrides config)
    #[arg(long)]
    page_concurrency: Option<usize>,

    /// Items fetched concurrently per page (overrides config)
    #[arg(long)]
    item_concurrency: Option<usize>,

    /// Clear previously synchronized data before running
    #[arg(long)]
    reset: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Parse CLI arguments
    let args = Args::parse();

    // Load configuration
    let config = load_config(&args)?;

    // Initialize tracing/logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config.logging.level.clone())),
        )
        .init();

    info!(
        version = env!("CARGO_PKG_VERSION"),
        "Starting catalog-sync"
    );

    // Initialize database
    let store = Arc::new(SqliteStore::new(&config.database.path).await?);
    info!(path = %config.database.path, "Database initialized");

    // Initialize the catalog client
    let client = Arc::new(HttpCatalogClient::new(&config.catalog)?);
    info!(base_url = %config.catalog.base_url, "Catalog client initialized");

    // Wire Ctrl-C to cooperative cancellation
    let cancel = CancellationToken::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("Interrupt received, finishing in-flight work");
                cancel.cancel();
            }
        });
    }

    let pipeline = SyncPipeline::new(client, store, &config.catalog, config.sync.clone())
        .with_cancellation(cancel)
        .with_progress(|completed, total, outcome| {
            info!(
                page = outcome.page,
                completed,
                total,
                succeeded = outcome.succeeded,
                failed = outcome.failed,
                chunks = outcome.chunks_created,
                "Page synchronized"
            );
        });

    let report = pipeline.run().await?;

    info!(
        pages = report.pages_processed,
        products = report.products_fetched,
        offers = report.offers_upserted,
        chunks = report.chunks_indexed,
        errors = report.total_errors,
        elapsed_secs = report.elapsed.as_secs_f64(),
        products_per_sec = report.products_per_sec,
        pages_per_sec = report.pages_per_sec,
        "Sync complete"
    );
    for error in &report.error_sample {
        warn!(error = %error, "Sync error (sample)");
    }
    if report.total_errors > report.error_sample.len() {
        warn!(
            shown = report.error_sample.len(),
            total = report.total_errors,
            "Additional errors omitted from sample"
        );
    }

    Ok(())
}

/// Merge config file, environment, and CLI overrides
fn load_config(args: &Args) -> anyhow::Result<Config> {
    let mut config = match &args.config {
        Some(path) => Config::from_file(path)?,
        None => Config::default(),
    };
    config.apply_env()?;

    if let Some(start) = args.start_page {
        config.sync.start_page = start;
    }
    if let Some(end) = args.end_page {
        config.sync.end_page = Some(end);
    }
    if let Some(lang) = &args.lang {
        config.catalog.language = lang.clone();
    }
    if let Some(concurrency) = args.page_concurrency {
        config.sync.page_concurrency = concurrency;
    }
    if let Some(concurrency) = args.item_concurrency {
        config.sync.item_concurrency = concurrency;
    }
    if args.reset {
        config.sync.reset = true;
    }

    config.validate()?;
    Ok(config)
}
