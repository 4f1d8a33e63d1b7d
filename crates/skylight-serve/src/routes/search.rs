//! Search endpoints over the content store.

use axum::extract::{Query, State};
use axum::Json;
use serde::Deserialize;

use skylight_core::{AuthorHit, PostHit};

use crate::error::ApiError;
use crate::state::AppState;

/// Result cap for both search endpoints.
const SEARCH_LIMIT: i64 = 50;

/// Query parameters for post search.
#[derive(Debug, Deserialize)]
pub struct PostSearchQuery {
    pub q: String,
}

/// Query parameters for author search.
#[derive(Debug, Deserialize)]
pub struct AuthorSearchQuery {
    pub q: String,
    /// Rank by rolling-text embedding similarity instead of fame.
    #[serde(default)]
    pub semantic: bool,
}

/// `GET /search/posts`
///
/// Substring search over stored post text, newest first.
pub async fn search_posts(
    State(state): State<AppState>,
    Query(params): Query<PostSearchQuery>,
) -> Result<Json<Vec<PostHit>>, ApiError> {
    tracing::info!(query = %params.q, "post search");
    let hits = state.store.text_search_posts(&params.q, SEARCH_LIMIT).await?;
    Ok(Json(hits))
}

/// `GET /search/authors`
///
/// Author search over handle, display name, description, and the rolling
/// posts window, ranked by fame (followers + posts). With `semantic=true`
/// the query is embedded and authors are ranked by similarity of their
/// rolling-text embedding instead.
pub async fn search_authors(
    State(state): State<AppState>,
    Query(params): Query<AuthorSearchQuery>,
) -> Result<Json<Vec<AuthorHit>>, ApiError> {
    tracing::info!(query = %params.q, semantic = params.semantic, "author search");

    let hits = if params.semantic {
        let embedding = state.embedder.embed(&params.q).await?;
        state
            .store
            .vector_search_authors(&embedding, SEARCH_LIMIT)
            .await?
    } else {
        state.store.text_search_authors(&params.q, SEARCH_LIMIT).await?
    };

    Ok(Json(hits))
}
