//! Post table access.
//!
//! Posts are append-only: the firehose may deliver the same record more
//! than once and duplicate rows are tolerated rather than deduplicated.
//! The only deletion path is the retention pruner's oldest-first batch
//! delete.

use chrono::NaiveDateTime;
use pgvector::Vector;
use serde::Serialize;
use sqlx::FromRow;

use super::{ensure_dim, Store};
use crate::error::Result;

/// A post row to insert.
#[derive(Debug, Clone)]
pub struct NewPost {
    pub repo: String,
    pub rkey: String,
    pub cid: Option<String>,
    pub text: String,
    pub created_at: Option<NaiveDateTime>,
    pub embedding: Vec<f32>,
    pub raw: serde_json::Value,
}

/// A post row returned by text search.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct PostHit {
    pub repo: String,
    pub rkey: String,
    pub cid: Option<String>,
    pub text: String,
    pub created_at: Option<NaiveDateTime>,
}

/// A post identifier returned by vector search, similarity-rank-first.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct SimilarPost {
    pub repo: String,
    pub rkey: String,
    pub similarity: f64,
}

impl Store {
    /// Append one post row. `created_at` may be absent (unparseable source
    /// timestamp); the row is stored with a null timestamp.
    pub async fn insert_post(&self, post: NewPost) -> Result<()> {
        ensure_dim(&post.embedding)?;
        sqlx::query(
            "INSERT INTO posts (repo, rkey, cid, text, created_at, embedding, raw)
             VALUES ($1, $2, $3, $4, $5, $6, $7)",
        )
        .bind(&post.repo)
        .bind(&post.rkey)
        .bind(&post.cid)
        .bind(&post.text)
        .bind(post.created_at)
        .bind(Vector::from(post.embedding))
        .bind(&post.raw)
        .execute(self.pool())
        .await?;
        Ok(())
    }

    /// Nearest posts to `embedding` by cosine distance, closest first.
    pub async fn vector_search_posts(
        &self,
        embedding: &[f32],
        limit: i64,
    ) -> Result<Vec<SimilarPost>> {
        ensure_dim(embedding)?;
        let rows = sqlx::query_as::<_, SimilarPost>(
            "SELECT repo, rkey, 1 - (embedding <=> $1) AS similarity
             FROM posts
             WHERE embedding IS NOT NULL
             ORDER BY embedding <=> $1
             LIMIT $2",
        )
        .bind(Vector::from(embedding.to_vec()))
        .bind(limit)
        .fetch_all(self.pool())
        .await?;
        Ok(rows)
    }

    /// Substring search over post text, newest first.
    pub async fn text_search_posts(&self, query: &str, limit: i64) -> Result<Vec<PostHit>> {
        let rows = sqlx::query_as::<_, PostHit>(
            "SELECT repo, rkey, cid, text, created_at
             FROM posts
             WHERE text ILIKE $1
             ORDER BY created_at DESC
             LIMIT $2",
        )
        .bind(format!("%{query}%"))
        .bind(limit)
        .fetch_all(self.pool())
        .await?;
        Ok(rows)
    }

    /// Total on-disk footprint of the post table, including indexes and
    /// toast data.
    pub async fn post_table_bytes(&self) -> Result<i64> {
        let bytes: i64 = sqlx::query_scalar("SELECT pg_total_relation_size('posts')")
            .fetch_one(self.pool())
            .await?;
        Ok(bytes)
    }

    /// Delete up to `batch` of the oldest posts by creation time.
    /// Returns the number of rows deleted.
    pub async fn delete_oldest_posts(&self, batch: i64) -> Result<u64> {
        let result = sqlx::query(
            "DELETE FROM posts
             WHERE ctid IN (
                 SELECT ctid FROM posts
                 ORDER BY created_at ASC
                 LIMIT $1
             )",
        )
        .bind(batch)
        .execute(self.pool())
        .await?;
        Ok(result.rows_affected())
    }
}

// Exercising these queries end-to-end requires a running Postgres with the
// pgvector extension; see the pure-logic tests in the ingest and serve
// crates for the surrounding behavior.
