//! API route definitions.

mod feeds;
mod health;
mod search;
mod wellknown;

use axum::routing::{get, post};
use axum::Router;

use crate::state::AppState;

/// Build the complete API router.
///
/// # Route Structure
///
/// ## Feed generator surface
/// - `GET /health` - Health check
/// - `GET /.well-known/did.json` - Feed generator DID document
/// - `GET /xrpc/app.bsky.feed.describeFeedGenerator` - Registered feeds
/// - `GET /xrpc/app.bsky.feed.getFeedSkeleton` - Serve a feed skeleton
///
/// ## Search
/// - `GET /search/posts` - Substring search over stored post text
/// - `GET /search/authors` - Author search (fame-ranked, or semantic with
///   `semantic=true`)
///
/// ## Management (x-api-key required)
/// - `POST /feeds` - Register or reconfigure a feed and its sources
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_check))
        .route("/.well-known/did.json", get(wellknown::did_document))
        .route(
            "/xrpc/app.bsky.feed.describeFeedGenerator",
            get(feeds::describe_feed_generator),
        )
        .route(
            "/xrpc/app.bsky.feed.getFeedSkeleton",
            get(feeds::get_feed_skeleton),
        )
        .route("/search/posts", get(search::search_posts))
        .route("/search/authors", get(search::search_authors))
        .route("/feeds", post(feeds::manage_feed))
        .with_state(state)
}
