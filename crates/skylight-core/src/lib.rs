//! Core types, store access, and shared clients for the Skylight feed engine.
//!
//! This crate provides:
//! - The content store access layer (Postgres + pgvector) for posts,
//!   authors, feeds, and the feed cache
//! - The embedding oracle client and vector normalization
//! - The Bluesky AppView HTTP client (profiles, author feeds, full posts)
//! - Prometheus metrics helpers
//! - Shared error types

mod error;

pub mod appview;
pub mod embed;
pub mod metrics;
pub mod store;

// ═══════════════════════════════════════════════════════════════════════════
// Constants
// ═══════════════════════════════════════════════════════════════════════════

/// Dimensionality of every embedding produced by the oracle and stored in
/// the vector columns. Vectors of any other length are rejected outright.
pub const EMBEDDING_DIM: usize = 384;

/// Maximum length, in characters, of an author's rolling `posts_text`
/// window. Newest post text is prepended and the result truncated to this.
pub const POSTS_TEXT_CAP: usize = 500;

pub use error::{Error, Result};

pub use appview::{AppView, PostView, Profile, parse_at_uri, post_uri, DEFAULT_APPVIEW_URL};
pub use embed::{normalize, Embedder, HttpEmbedder};
pub use store::{
    cap_posts_text, AuthorHit, CachedFeed, Feed, FeedSource, NewAuthor, NewFeed, NewPost, PostHit,
    SimilarPost, SourceType, Store,
};
