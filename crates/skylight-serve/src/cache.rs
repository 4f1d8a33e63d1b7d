//! Stale-while-revalidate serving over the persisted feed cache.
//!
//! Every feed has at most one cache row: the last successfully built
//! skeleton and its build timestamp. Serving prefers availability over
//! freshness:
//!
//! - fresh hit (`age < TTL`): return the cached skeleton as-is
//! - stale hit (`age >= TTL`): return the cached skeleton immediately and
//!   kick off a background rebuild that never blocks or fails the caller
//! - miss: build synchronously; a failure here is a request failure
//!
//! Concurrent stale reads of the same feed coalesce on the handle's
//! refresh guard, so at most one background rebuild per feed is in flight.

use std::sync::Arc;

use chrono::Utc;

use crate::builder::{self, Skeleton};
use crate::error::ApiError;
use crate::registry::FeedHandle;
use crate::state::AppState;

/// How long a cached skeleton is served without triggering a rebuild.
pub const CACHE_TTL_SECS: i64 = 60;

/// Whether a cache row built at `cached_at` is stale at `now`.
pub(crate) fn is_stale(now: i64, cached_at: i64) -> bool {
    now - cached_at >= CACHE_TTL_SECS
}

/// Serve a feed skeleton, going through the cache state machine.
pub async fn serve_feed(
    state: &AppState,
    handle: &Arc<FeedHandle>,
    limit: usize,
) -> Result<Skeleton, ApiError> {
    if let Some(row) = state.store.feed_cache(&handle.uri).await? {
        let skeleton: Skeleton = serde_json::from_str(&row.response_json)?;

        let now = Utc::now().timestamp();
        if is_stale(now, row.timestamp) {
            metrics::counter!("feed_cache_hits_total", "state" => "stale").increment(1);
            tracing::debug!(feed = %handle.uri, age = now - row.timestamp, "serving stale cache");
            spawn_refresh(state.clone(), Arc::clone(handle), limit);
        } else {
            metrics::counter!("feed_cache_hits_total", "state" => "fresh").increment(1);
        }

        return Ok(skeleton);
    }

    // Cold cache: the caller waits for the first build, and a failure
    // surfaces as a request failure.
    metrics::counter!("feed_cache_misses_total").increment(1);
    tracing::info!(feed = %handle.uri, "cache miss, building synchronously");
    match builder::build_feed(state, &handle.uri, limit).await {
        Ok(skeleton) => Ok(skeleton),
        Err(e) => {
            metrics::counter!("feed_build_errors_total", "mode" => "sync").increment(1);
            Err(e.into())
        }
    }
}

/// Fire-and-forget a background rebuild for a stale feed.
///
/// The triggering request never awaits the rebuild; a failure leaves the
/// stale row servable and is visible only in logs and counters. The
/// per-feed guard drops redundant triggers from concurrent stale reads.
fn spawn_refresh(state: AppState, handle: Arc<FeedHandle>, limit: usize) {
    if !handle.begin_refresh() {
        metrics::counter!("feed_refreshes_coalesced_total").increment(1);
        tracing::debug!(feed = %handle.uri, "refresh already in flight");
        return;
    }

    tokio::spawn(async move {
        if let Err(e) = builder::build_feed(&state, &handle.uri, limit).await {
            metrics::counter!("feed_build_errors_total", "mode" => "background").increment(1);
            tracing::warn!(feed = %handle.uri, error = %e, "background refresh failed");
        }
        handle.end_refresh();
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cache_is_fresh_within_ttl() {
        let built_at = 1_700_000_000;
        assert!(!is_stale(built_at, built_at));
        assert!(!is_stale(built_at + CACHE_TTL_SECS - 1, built_at));
    }

    #[test]
    fn cache_is_stale_at_ttl_boundary() {
        let built_at = 1_700_000_000;
        assert!(is_stale(built_at + CACHE_TTL_SECS, built_at));
        assert!(is_stale(built_at + CACHE_TTL_SECS * 10, built_at));
    }
}
