//! Skylight Serve - feed generator HTTP service.
//!
//! This crate builds, caches, and serves feed skeletons for every
//! registered feed.
//!
//! # Serving Model
//!
//! Each request goes through a per-feed cache row with
//! stale-while-revalidate semantics: fresh rows are served directly, stale
//! rows are served immediately while a background rebuild refreshes them,
//! and only a cold cache makes the caller wait for a build. Concurrent
//! rebuilds of the same feed are coalesced.
//!
//! # Architecture
//!
//! - **AppState**: shared state (store, embedder, AppView client, registry)
//! - **FeedRegistry**: concurrency-safe feed-uri → handle mapping
//! - **Builder**: the rebuild algorithm (aggregate, dedup, filter, persist)
//! - **Cache**: the stale-while-revalidate state machine
//! - **Routes**: endpoint handlers grouped by domain

mod builder;
mod cache;
mod error;
mod registry;
mod routes;
mod state;

pub use self::builder::{build_feed, Skeleton, SkeletonItem};
pub use self::cache::{serve_feed, CACHE_TTL_SECS};
pub use self::error::ApiError;
pub use self::registry::{FeedHandle, FeedRegistry};
pub use self::routes::router;
pub use self::state::{AppState, Config};
