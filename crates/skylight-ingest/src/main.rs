//! Skylight live ingestion daemon.
//!
//! Main entry point for the firehose ingestion service. It subscribes to
//! a Jetstream endpoint, indexes each qualifying post-creation event into
//! the content store, and maintains author rows as it goes.
//!
//! # Usage
//!
//! ```bash
//! # Run with settings from the environment / .env
//! skylight-ingest
//!
//! # Run against explicit endpoints
//! skylight-ingest \
//!     --database-url postgres://skylight@localhost/skylight \
//!     --embedder-url http://localhost:8081 \
//!     --firehose-url "wss://jetstream2.us-east.bsky.network/subscribe?wantedCollections=app.bsky.feed.post"
//! ```
//!
//! The firehose loop is the process's steady state: it reconnects forever
//! and only exits on an unusable configuration. Failure to reach the
//! database at startup is fatal and exits non-zero.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use metrics::gauge;
use tracing_subscriber::EnvFilter;

use skylight_core::metrics::{init_metrics, start_metrics_server};
use skylight_core::{AppView, HttpEmbedder, Store, DEFAULT_APPVIEW_URL};
use skylight_ingest::{Firehose, FirehoseConfig, Indexer, DEFAULT_JETSTREAM_URL};

/// Skylight live ingestion daemon.
#[derive(Parser, Debug)]
#[command(name = "skylight-ingest")]
#[command(about = "Live Bluesky firehose ingestion daemon")]
#[command(version)]
struct Args {
    /// Postgres connection URL
    #[arg(long, env = "DATABASE_URL")]
    database_url: String,

    /// Jetstream firehose subscription URL
    #[arg(long, env = "FIREHOSE_URL", default_value = DEFAULT_JETSTREAM_URL)]
    firehose_url: String,

    /// Embedding service base URL
    #[arg(long, env = "EMBEDDER_URL")]
    embedder_url: String,

    /// AppView base URL for profile lookups
    #[arg(long, env = "APPVIEW_URL", default_value = DEFAULT_APPVIEW_URL)]
    appview_url: String,

    /// Seconds to wait before reconnecting after a firehose disconnect
    #[arg(long, default_value = "5")]
    reconnect_secs: u64,

    /// Metrics HTTP server port (0 to disable)
    #[arg(long, env = "METRICS_PORT", default_value = "9090")]
    metrics_port: u16,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env()
                .add_directive("info".parse().unwrap())
                .add_directive("skylight_ingest=debug".parse().unwrap()),
        )
        .init();

    let args = Args::parse();

    tracing::info!("skylight ingestion daemon starting...");

    if args.metrics_port > 0 {
        let handle = init_metrics();
        start_metrics_server(args.metrics_port, handle).await?;
        gauge!("ingest_running").set(1.0);
    }

    let store = Store::connect(&args.database_url)
        .await
        .context("failed to connect to Postgres")?;
    store
        .init_schema()
        .await
        .context("failed to ensure database schema")?;

    let embedder = Arc::new(HttpEmbedder::new(&args.embedder_url));
    let appview = AppView::new(&args.appview_url);
    let indexer = Indexer::new(store, embedder, appview);

    tracing::info!("Configuration:");
    tracing::info!("  Firehose: {}", args.firehose_url);
    tracing::info!("  AppView:  {}", args.appview_url);
    tracing::info!("  Embedder: {}", args.embedder_url);
    tracing::info!("  Reconnect backoff: {}s", args.reconnect_secs);

    let firehose = Firehose::new(FirehoseConfig {
        url: args.firehose_url,
        reconnect_delay: Duration::from_secs(args.reconnect_secs),
    });

    firehose.run(|event| indexer.index_post(event)).await?;

    Ok(())
}
