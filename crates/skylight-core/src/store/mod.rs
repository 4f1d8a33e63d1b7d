//! Content store access layer.
//!
//! One Postgres database (with the pgvector extension) backs everything:
//! the append-only `posts` table, the `authors` table with its rolling
//! text window and four embedding columns, the feed registry tables
//! (`feeds`, `feed_sources`), and the persisted `feed_cache` rows. The
//! store is the only resource shared between the ingestion daemon, the
//! pruner, and the serving layer; consistency between them relies on the
//! upsert/replace semantics of the individual statements rather than any
//! in-process coordination.

mod authors;
mod feeds;
mod posts;

pub use authors::{cap_posts_text, AuthorHit, NewAuthor};
pub use feeds::{CachedFeed, Feed, FeedSource, NewFeed, SourceType};
pub use posts::{NewPost, PostHit, SimilarPost};

use sqlx::postgres::{PgPool, PgPoolOptions};

use crate::error::{Error, Result};
use crate::EMBEDDING_DIM;

/// Handle to the content store.
#[derive(Debug, Clone)]
pub struct Store {
    pool: PgPool,
}

impl Store {
    /// Connect to the database.
    ///
    /// Failure here is fatal to every component; callers exit non-zero.
    pub async fn connect(database_url: &str) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(10)
            .connect(database_url)
            .await?;
        Ok(Self { pool })
    }

    /// Ensure the vector extension and all tables exist.
    pub async fn init_schema(&self) -> Result<()> {
        for statement in SCHEMA {
            sqlx::query(statement).execute(&self.pool).await?;
        }
        tracing::info!("database schema ensured");
        Ok(())
    }

    pub(crate) fn pool(&self) -> &PgPool {
        &self.pool
    }
}

/// Reject vectors that do not match the embedding dimensionality.
pub(crate) fn ensure_dim(vector: &[f32]) -> Result<()> {
    if vector.len() != EMBEDDING_DIM {
        return Err(Error::DimensionMismatch {
            expected: EMBEDDING_DIM,
            got: vector.len(),
        });
    }
    Ok(())
}

const SCHEMA: &[&str] = &[
    "CREATE EXTENSION IF NOT EXISTS vector",
    "CREATE TABLE IF NOT EXISTS posts (
        id SERIAL PRIMARY KEY,
        repo TEXT,
        rkey TEXT,
        cid TEXT,
        text TEXT,
        created_at TIMESTAMP,
        embedding VECTOR(384),
        raw JSONB
    )",
    "CREATE TABLE IF NOT EXISTS authors (
        id TEXT PRIMARY KEY,
        handle TEXT,
        display_name TEXT,
        description TEXT,
        posts_text TEXT,
        display_name_embedding VECTOR(384),
        handle_embedding VECTOR(384),
        description_embedding VECTOR(384),
        posts_embedding VECTOR(384),
        followers_count INTEGER DEFAULT 0,
        follows_count INTEGER DEFAULT 0,
        posts_count INTEGER DEFAULT 0,
        updated_at TIMESTAMP
    )",
    "CREATE TABLE IF NOT EXISTS feeds (
        id SERIAL PRIMARY KEY,
        uri TEXT UNIQUE NOT NULL,
        handle TEXT NOT NULL,
        record_name TEXT NOT NULL,
        display_name TEXT NOT NULL,
        description TEXT,
        avatar_path TEXT
    )",
    "CREATE TABLE IF NOT EXISTS feed_sources (
        id SERIAL PRIMARY KEY,
        feed_id INTEGER NOT NULL REFERENCES feeds(id) ON DELETE CASCADE,
        source_type TEXT NOT NULL,
        identifier TEXT NOT NULL,
        UNIQUE (feed_id, source_type, identifier)
    )",
    "CREATE TABLE IF NOT EXISTS feed_cache (
        feed_uri TEXT PRIMARY KEY,
        response_json TEXT NOT NULL,
        timestamp BIGINT NOT NULL
    )",
];
