//! Author table access.
//!
//! An author row is created on the first post seen from that author and
//! updated on every subsequent one. The `posts_text` column is a rolling
//! window of the author's most recent post text: newest text prepended,
//! truncated to [`POSTS_TEXT_CAP`] characters. `updated_at` only ever
//! moves forward (`GREATEST` of the existing and incoming timestamps).

use chrono::NaiveDateTime;
use pgvector::Vector;
use serde::Serialize;
use sqlx::FromRow;

use super::{ensure_dim, Store};
use crate::error::Result;
use crate::POSTS_TEXT_CAP;

/// A full author row to insert on first sight.
#[derive(Debug, Clone)]
pub struct NewAuthor {
    pub id: String,
    pub handle: String,
    pub display_name: String,
    pub description: String,
    pub posts_text: String,
    pub display_name_embedding: Vec<f32>,
    pub handle_embedding: Vec<f32>,
    pub description_embedding: Vec<f32>,
    pub posts_embedding: Vec<f32>,
    pub followers_count: i32,
    pub follows_count: i32,
    pub posts_count: i32,
    pub updated_at: Option<NaiveDateTime>,
}

/// An author row returned by search.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct AuthorHit {
    pub id: String,
    pub handle: Option<String>,
    pub display_name: Option<String>,
    pub description: Option<String>,
    pub posts_text: Option<String>,
    pub followers_count: i32,
    pub follows_count: i32,
    pub posts_count: i32,
    pub updated_at: Option<NaiveDateTime>,
    #[sqlx(default)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub similarity: Option<f64>,
}

impl Store {
    /// Whether an author row exists for this id.
    pub async fn author_exists(&self, id: &str) -> Result<bool> {
        let found: Option<String> = sqlx::query_scalar("SELECT id FROM authors WHERE id = $1")
            .bind(id)
            .fetch_optional(self.pool())
            .await?;
        Ok(found.is_some())
    }

    /// Insert a first-seen author.
    ///
    /// Written as an upsert-with-merge so a concurrent first-insert of the
    /// same author degrades to the rolling-window merge instead of a
    /// constraint error: on conflict the incoming `posts_text` is
    /// prepended to the existing window and `updated_at` keeps the later
    /// of the two timestamps.
    pub async fn insert_author(&self, author: NewAuthor) -> Result<()> {
        ensure_dim(&author.display_name_embedding)?;
        ensure_dim(&author.handle_embedding)?;
        ensure_dim(&author.description_embedding)?;
        ensure_dim(&author.posts_embedding)?;
        sqlx::query(
            "INSERT INTO authors (
                 id, handle, display_name, description, posts_text,
                 display_name_embedding, handle_embedding, description_embedding, posts_embedding,
                 followers_count, follows_count, posts_count, updated_at
             )
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
             ON CONFLICT (id) DO UPDATE SET
                 handle = EXCLUDED.handle,
                 display_name = EXCLUDED.display_name,
                 description = EXCLUDED.description,
                 posts_text = LEFT(EXCLUDED.posts_text || authors.posts_text, 500),
                 display_name_embedding = EXCLUDED.display_name_embedding,
                 handle_embedding = EXCLUDED.handle_embedding,
                 description_embedding = EXCLUDED.description_embedding,
                 posts_embedding = EXCLUDED.posts_embedding,
                 followers_count = EXCLUDED.followers_count,
                 follows_count = EXCLUDED.follows_count,
                 posts_count = EXCLUDED.posts_count,
                 updated_at = GREATEST(EXCLUDED.updated_at, authors.updated_at)",
        )
        .bind(&author.id)
        .bind(&author.handle)
        .bind(&author.display_name)
        .bind(&author.description)
        .bind(&author.posts_text)
        .bind(Vector::from(author.display_name_embedding))
        .bind(Vector::from(author.handle_embedding))
        .bind(Vector::from(author.description_embedding))
        .bind(Vector::from(author.posts_embedding))
        .bind(author.followers_count)
        .bind(author.follows_count)
        .bind(author.posts_count)
        .bind(author.updated_at)
        .execute(self.pool())
        .await?;
        Ok(())
    }

    /// Apply the rolling-window update for an already-seen author:
    /// prepend the new snippet to `posts_text` (capped at 500 chars),
    /// replace `posts_embedding`, advance `updated_at` monotonically.
    pub async fn roll_author(
        &self,
        id: &str,
        snippet: &str,
        posts_embedding: Vec<f32>,
        created_at: Option<NaiveDateTime>,
    ) -> Result<()> {
        ensure_dim(&posts_embedding)?;
        sqlx::query(
            "UPDATE authors
             SET posts_text = LEFT($2 || posts_text, 500),
                 posts_embedding = $3,
                 updated_at = GREATEST($4::timestamp, updated_at)
             WHERE id = $1",
        )
        .bind(id)
        .bind(snippet)
        .bind(Vector::from(posts_embedding))
        .bind(created_at)
        .execute(self.pool())
        .await?;
        Ok(())
    }

    /// Substring search over author fields, ranked by fame
    /// (followers + posts) and recency.
    pub async fn text_search_authors(&self, query: &str, limit: i64) -> Result<Vec<AuthorHit>> {
        let rows = sqlx::query_as::<_, AuthorHit>(
            "SELECT id, handle, display_name, description, posts_text,
                    followers_count, follows_count, posts_count, updated_at
             FROM authors
             WHERE display_name ILIKE $1
                OR handle ILIKE $1
                OR description ILIKE $1
                OR posts_text ILIKE $1
             ORDER BY (followers_count + posts_count) DESC, updated_at DESC
             LIMIT $2",
        )
        .bind(format!("%{query}%"))
        .bind(limit)
        .fetch_all(self.pool())
        .await?;
        Ok(rows)
    }

    /// Authors whose rolling-window embedding is nearest to `embedding`.
    pub async fn vector_search_authors(
        &self,
        embedding: &[f32],
        limit: i64,
    ) -> Result<Vec<AuthorHit>> {
        ensure_dim(embedding)?;
        let rows = sqlx::query_as::<_, AuthorHit>(
            "SELECT id, handle, display_name, description, posts_text,
                    followers_count, follows_count, posts_count, updated_at,
                    1 - (posts_embedding <=> $1) AS similarity
             FROM authors
             WHERE posts_embedding IS NOT NULL
             ORDER BY similarity DESC, (followers_count + posts_count) DESC, updated_at DESC
             LIMIT $2",
        )
        .bind(Vector::from(embedding.to_vec()))
        .bind(limit)
        .fetch_all(self.pool())
        .await?;
        Ok(rows)
    }
}

/// Cap text to the rolling-window length, on a char boundary.
pub fn cap_posts_text(text: &str) -> String {
    text.chars().take(POSTS_TEXT_CAP).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cap_posts_text_short_input_unchanged() {
        assert_eq!(cap_posts_text("hello world"), "hello world");
    }

    #[test]
    fn cap_posts_text_truncates_to_window() {
        let long = "a".repeat(800);
        assert_eq!(cap_posts_text(&long).len(), POSTS_TEXT_CAP);
    }

    #[test]
    fn cap_posts_text_counts_chars_not_bytes() {
        let long = "é".repeat(600);
        let capped = cap_posts_text(&long);
        assert_eq!(capped.chars().count(), POSTS_TEXT_CAP);
    }

    #[test]
    fn rolling_window_prepend_matches_sql_merge() {
        // Mirror of LEFT(new || old, 500): newest text first, then the
        // previous window, truncated to the cap.
        let previous = "b".repeat(490);
        let newest = "a".repeat(20);
        let merged = cap_posts_text(&format!("{newest}{previous}"));
        assert_eq!(merged.len(), POSTS_TEXT_CAP);
        assert!(merged.starts_with(&newest));
        assert!(merged.ends_with('b'));
    }
}
