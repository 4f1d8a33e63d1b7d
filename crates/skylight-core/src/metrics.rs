//! Prometheus metrics helpers for the Skylight components.
//!
//! Centralized metrics initialization and the metric descriptions shared
//! across the ingestion daemon, the pruner, and the serving layer.
//!
//! # Metric Naming Conventions
//!
//! - Prefix: component name (`ingest_`, `feed_`, `prune_`)
//! - Suffix: unit or type (`_total`, `_bytes`)
//! - Labels: used sparingly to avoid cardinality explosion

use axum::{routing::get, Router};
use metrics::{describe_counter, describe_gauge};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::net::SocketAddr;

/// Initialize the Prometheus metrics recorder.
///
/// Must be called once at startup before any metrics are recorded.
/// Returns a handle for [`start_metrics_server`].
///
/// # Panics
///
/// Panics if called more than once (the recorder can only be installed once).
pub fn init_metrics() -> PrometheusHandle {
    let handle = PrometheusBuilder::new()
        .install_recorder()
        .expect("failed to install Prometheus recorder");

    register_common_metrics();

    handle
}

/// Like [`init_metrics`] but returns `None` if a recorder is already
/// installed instead of panicking. Useful for tests.
pub fn try_init_metrics() -> Option<PrometheusHandle> {
    PrometheusBuilder::new().install_recorder().ok()
}

/// Start the Prometheus metrics HTTP server.
///
/// Serves `/metrics` on the given port; spawns a background task and
/// returns immediately.
pub async fn start_metrics_server(
    port: u16,
    handle: PrometheusHandle,
) -> Result<(), std::io::Error> {
    let app = Router::new().route(
        "/metrics",
        get(move || {
            let handle = handle.clone();
            async move { handle.render() }
        }),
    );

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("metrics server listening on http://{}/metrics", addr);

    tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            tracing::error!("metrics server exited: {}", e);
        }
    });

    Ok(())
}

/// Register descriptions for the metrics used across Skylight.
///
/// Called automatically by [`init_metrics`].
fn register_common_metrics() {
    // =========================================================================
    // Firehose Ingestion Metrics
    // =========================================================================

    describe_counter!(
        "ingest_events_total",
        "Total firehose messages received, qualifying or not"
    );
    describe_counter!(
        "ingest_posts_total",
        "Post-creation events indexed into the store"
    );
    describe_counter!(
        "ingest_authors_created_total",
        "Authors seen for the first time and inserted"
    );
    describe_counter!(
        "ingest_authors_updated_total",
        "Rolling-window updates applied to existing authors"
    );
    describe_counter!(
        "ingest_parse_errors_total",
        "Firehose messages discarded as unparseable"
    );
    describe_counter!(
        "ingest_index_errors_total",
        "Qualifying events dropped because indexing failed"
    );
    describe_counter!(
        "ingest_reconnects_total",
        "Firehose reconnect attempts after disconnect"
    );
    describe_gauge!(
        "ingest_running",
        "Whether the ingestion daemon is running (1=yes, 0=no)"
    );

    // =========================================================================
    // Feed Build / Cache Metrics
    // =========================================================================

    describe_counter!("feed_builds_total", "Feed skeleton rebuilds completed");
    describe_counter!(
        "feed_build_errors_total",
        "Feed rebuilds that failed (label: mode = sync|background)"
    );
    describe_counter!(
        "feed_cache_hits_total",
        "Cache hits served (label: state = fresh|stale)"
    );
    describe_counter!("feed_cache_misses_total", "Cache misses built synchronously");
    describe_counter!(
        "feed_refreshes_coalesced_total",
        "Stale-read refresh triggers dropped because a rebuild was already in flight"
    );

    // =========================================================================
    // Retention Pruner Metrics
    // =========================================================================

    describe_counter!("prune_cycles_total", "Pruner polling cycles completed");
    describe_counter!("prune_rows_deleted_total", "Post rows deleted by the pruner");
    describe_gauge!("prune_table_bytes", "Last measured post table footprint");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn try_init_metrics_is_idempotent() {
        let handle1 = try_init_metrics();
        // Second call must return None (recorder already installed).
        let handle2 = try_init_metrics();
        assert!(handle1.is_none() || handle2.is_none());
    }

    #[test]
    fn register_common_metrics_does_not_panic() {
        let _ = try_init_metrics();
        register_common_metrics();
        register_common_metrics();
    }
}
