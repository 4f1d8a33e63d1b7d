//! Feed skeleton serving and feed management endpoints.

use axum::extract::{Query, State};
use axum::http::HeaderMap;
use axum::Json;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use skylight_core::{FeedSource, NewFeed};

use crate::builder::Skeleton;
use crate::cache;
use crate::error::ApiError;
use crate::state::AppState;

/// Default skeleton length when the caller does not specify one.
const DEFAULT_LIMIT: usize = 20;

/// Hard cap on the skeleton length a caller may request.
const MAX_LIMIT: usize = 100;

/// Query parameters for `getFeedSkeleton`.
#[derive(Debug, Deserialize)]
pub struct FeedSkeletonQuery {
    /// The feed's at-uri.
    pub feed: String,
    /// Opaque cursor from a previous response.
    #[serde(default)]
    pub cursor: Option<String>,
    /// Requested number of skeleton entries.
    pub limit: Option<usize>,
}

/// `GET /xrpc/app.bsky.feed.getFeedSkeleton`
///
/// Resolves the feed in the registry and serves its skeleton through the
/// stale-while-revalidate cache. Unknown feeds are a 400.
pub async fn get_feed_skeleton(
    State(state): State<AppState>,
    Query(params): Query<FeedSkeletonQuery>,
) -> Result<Json<Skeleton>, ApiError> {
    let handle = state
        .registry
        .lookup(&params.feed)
        .ok_or_else(|| ApiError::UnknownFeed(params.feed.clone()))?;

    if params.cursor.is_some() {
        // The cursor is a freshness token; skeleton pagination is not
        // supported.
        tracing::debug!(feed = %params.feed, "ignoring cursor");
    }

    let limit = params.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT);
    let skeleton = cache::serve_feed(&state, &handle, limit).await?;
    Ok(Json(skeleton))
}

/// `GET /xrpc/app.bsky.feed.describeFeedGenerator`
///
/// Lists every registered feed under this generator's DID.
pub async fn describe_feed_generator(State(state): State<AppState>) -> Json<Value> {
    let feeds: Vec<Value> = state
        .registry
        .uris()
        .into_iter()
        .map(|uri| json!({"uri": uri}))
        .collect();

    Json(json!({
        "did": state.config.service_did,
        "feeds": feeds
    }))
}

/// Request body for `POST /feeds`.
#[derive(Debug, Deserialize)]
pub struct ManageFeedRequest {
    #[serde(flatten)]
    pub feed: NewFeed,
    #[serde(default)]
    pub sources: Vec<FeedSource>,
}

/// Response body for `POST /feeds`.
#[derive(Debug, Serialize)]
pub struct ManageFeedResponse {
    pub uri: String,
}

/// `POST /feeds`
///
/// Registers or reconfigures a feed: upserts the feed row, replaces its
/// sources wholesale, and registers the serving handle. Requires the
/// `x-api-key` header. Publishing the feed record to the network is the
/// operator's concern, not this service's.
pub async fn manage_feed(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<ManageFeedRequest>,
) -> Result<Json<ManageFeedResponse>, ApiError> {
    let key = headers.get("x-api-key").and_then(|v| v.to_str().ok());
    if key != Some(state.config.api_key.as_str()) {
        tracing::debug!("missing or invalid api key");
        return Err(ApiError::Unauthorized);
    }

    let feed_id = state.store.upsert_feed(&request.feed).await?;
    state.store.replace_sources(feed_id, &request.sources).await?;
    state.registry.register(&request.feed.uri);

    tracing::info!(
        feed = %request.feed.uri,
        sources = request.sources.len(),
        "feed registered"
    );

    Ok(Json(ManageFeedResponse {
        uri: request.feed.uri,
    }))
}
