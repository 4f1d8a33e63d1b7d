//! Feed handler registry.
//!
//! Explicit registry object mapping feed URIs to their serving handles:
//! `init` loads the persisted feeds at startup, `register` adds one (also
//! at runtime, when a feed is reconfigured), `lookup` resolves an incoming
//! request. Registration can race with lookups from in-flight requests, so
//! the map lives behind a lock.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;

use skylight_core::{Result, Store};

/// The per-feed serving handle.
///
/// Besides naming the feed, the handle carries the in-flight guard that
/// coalesces concurrent background refreshes for the same feed.
pub struct FeedHandle {
    pub uri: String,
    refreshing: AtomicBool,
}

impl FeedHandle {
    fn new(uri: &str) -> Self {
        Self {
            uri: uri.to_string(),
            refreshing: AtomicBool::new(false),
        }
    }

    /// Claim the refresh slot for this feed. Returns `false` when a
    /// refresh is already in flight.
    pub fn begin_refresh(&self) -> bool {
        self.refreshing
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
    }

    /// Release the refresh slot.
    pub fn end_refresh(&self) {
        self.refreshing.store(false, Ordering::SeqCst);
    }
}

/// Concurrency-safe mapping from feed URI to serving handle.
pub struct FeedRegistry {
    feeds: RwLock<HashMap<String, Arc<FeedHandle>>>,
}

impl FeedRegistry {
    pub fn new() -> Self {
        Self {
            feeds: RwLock::new(HashMap::new()),
        }
    }

    /// Load all persisted feeds from the store and register each.
    /// Returns the number of registered feeds.
    pub async fn init(&self, store: &Store) -> Result<usize> {
        let feeds = store.list_feeds().await?;
        let count = feeds.len();
        for feed in feeds {
            self.register(&feed.uri);
        }
        Ok(count)
    }

    /// Register a feed, returning its handle. Re-registering an existing
    /// feed returns the already-live handle so an in-flight refresh guard
    /// is never lost.
    pub fn register(&self, uri: &str) -> Arc<FeedHandle> {
        let mut feeds = self.feeds.write();
        Arc::clone(
            feeds
                .entry(uri.to_string())
                .or_insert_with(|| Arc::new(FeedHandle::new(uri))),
        )
    }

    /// Resolve a feed URI to its handle.
    pub fn lookup(&self, uri: &str) -> Option<Arc<FeedHandle>> {
        self.feeds.read().get(uri).cloned()
    }

    /// All registered feed URIs, sorted.
    pub fn uris(&self) -> Vec<String> {
        let mut uris: Vec<String> = self.feeds.read().keys().cloned().collect();
        uris.sort();
        uris
    }
}

impl Default for FeedRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_unknown_feed_is_none() {
        let registry = FeedRegistry::new();
        assert!(registry.lookup("at://did:plc:x/app.bsky.feed.generator/f").is_none());
    }

    #[test]
    fn register_then_lookup_returns_same_handle() {
        let registry = FeedRegistry::new();
        let registered = registry.register("at://feed/1");
        let looked_up = registry.lookup("at://feed/1").unwrap();
        assert!(Arc::ptr_eq(&registered, &looked_up));
    }

    #[test]
    fn reregistering_keeps_the_live_handle() {
        let registry = FeedRegistry::new();
        let first = registry.register("at://feed/1");
        assert!(first.begin_refresh());
        let second = registry.register("at://feed/1");
        assert!(Arc::ptr_eq(&first, &second));
        // The in-flight guard survives re-registration.
        assert!(!second.begin_refresh());
    }

    #[test]
    fn refresh_guard_coalesces_until_released() {
        let handle = FeedHandle::new("at://feed/1");
        assert!(handle.begin_refresh());
        assert!(!handle.begin_refresh());
        handle.end_refresh();
        assert!(handle.begin_refresh());
    }

    #[test]
    fn uris_are_sorted() {
        let registry = FeedRegistry::new();
        registry.register("at://feed/b");
        registry.register("at://feed/a");
        assert_eq!(registry.uris(), vec!["at://feed/a", "at://feed/b"]);
    }
}
