//! Retention pruner for the post table.
//!
//! Perpetual polling loop that keeps the post table's on-disk footprint
//! under a fixed ceiling: once per interval it measures
//! `pg_total_relation_size('posts')` and, when over the ceiling, deletes a
//! fixed-size batch of the oldest rows by creation time. This is a soft,
//! eventually-convergent control loop: under fast ingestion the table can
//! transiently overshoot by one interval's worth of growth.
//!
//! Unlike the ingestion daemon, there is no reconnect logic here: losing
//! the store connection is fatal and the process exits non-zero.
//!
//! # Usage
//!
//! ```bash
//! skylight-prune --database-url postgres://skylight@localhost/skylight
//!
//! # Custom ceiling and batch
//! skylight-prune --max-table-bytes 2147483648 --batch-size 500
//! ```

use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use metrics::{counter, gauge};
use tracing_subscriber::EnvFilter;

use skylight_core::metrics::{init_metrics, start_metrics_server};
use skylight_core::Store;

const GIB: i64 = 1024 * 1024 * 1024;

/// Retention pruner: bounds the post table's on-disk footprint.
#[derive(Parser, Debug)]
#[command(name = "skylight-prune")]
#[command(about = "Size-triggered retention pruner for the post table")]
#[command(version)]
struct Args {
    /// Postgres connection URL
    #[arg(long, env = "DATABASE_URL")]
    database_url: String,

    /// Post table size ceiling in bytes
    #[arg(long, default_value_t = 6 * GIB)]
    max_table_bytes: i64,

    /// Rows deleted per prune cycle
    #[arg(long, default_value = "100")]
    batch_size: i64,

    /// Seconds between size checks
    #[arg(long, default_value = "1")]
    interval_secs: u64,

    /// Metrics HTTP server port (0 to disable)
    #[arg(long, default_value = "0")]
    metrics_port: u16,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("info".parse().unwrap()))
        .init();

    let args = Args::parse();

    if args.metrics_port > 0 {
        let handle = init_metrics();
        start_metrics_server(args.metrics_port, handle).await?;
    }

    let store = Store::connect(&args.database_url)
        .await
        .context("failed to connect to Postgres")?;

    tracing::info!(
        "pruner started: ceiling {} bytes, batch {}, interval {}s",
        args.max_table_bytes,
        args.batch_size,
        args.interval_secs
    );

    loop {
        let bytes = store
            .post_table_bytes()
            .await
            .context("failed to measure post table size")?;
        gauge!("prune_table_bytes").set(bytes as f64);
        tracing::info!("post table size: {:.2} MB", bytes as f64 / 1024.0 / 1024.0);

        if bytes > args.max_table_bytes {
            tracing::info!("pruning oldest rows...");
            let deleted = store
                .delete_oldest_posts(args.batch_size)
                .await
                .context("failed to prune oldest rows")?;
            counter!("prune_rows_deleted_total").increment(deleted);
            tracing::info!("deleted {} rows", deleted);
        }

        counter!("prune_cycles_total").increment(1);
        tokio::time::sleep(Duration::from_secs(args.interval_secs)).await;
    }
}
