//! Feed registry and feed cache rows.
//!
//! `feeds` and `feed_sources` hold per-feed configuration: preference
//! sources drive candidate generation, filter sources drive exclusion.
//! Sources are replaced wholesale when a feed is reconfigured. `feed_cache`
//! holds the last-known-good serialized skeleton per feed, overwritten on
//! every successful rebuild and never deleted except by replacement.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use super::Store;
use crate::error::{Error, Result};

/// The four kinds of feed source rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceType {
    AccountPreference,
    TopicPreference,
    AccountFilter,
    TopicFilter,
}

impl SourceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AccountPreference => "account_preference",
            Self::TopicPreference => "topic_preference",
            Self::AccountFilter => "account_filter",
            Self::TopicFilter => "topic_filter",
        }
    }
}

impl fmt::Display for SourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SourceType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "account_preference" => Ok(Self::AccountPreference),
            "topic_preference" => Ok(Self::TopicPreference),
            "account_filter" => Ok(Self::AccountFilter),
            "topic_filter" => Ok(Self::TopicFilter),
            other => Err(Error::Config(format!("unknown source type: {other}"))),
        }
    }
}

/// A registered feed.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Feed {
    pub id: i32,
    pub uri: String,
    pub handle: String,
    pub record_name: String,
    pub display_name: String,
    pub description: Option<String>,
    pub avatar_path: Option<String>,
}

/// Fields for creating or reconfiguring a feed.
#[derive(Debug, Clone, Deserialize)]
pub struct NewFeed {
    pub uri: String,
    pub handle: String,
    pub record_name: String,
    pub display_name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub avatar_path: Option<String>,
}

/// One preference or filter rule attached to a feed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedSource {
    pub source_type: SourceType,
    pub identifier: String,
}

/// The persisted skeleton for a feed, plus its build timestamp.
#[derive(Debug, Clone, FromRow)]
pub struct CachedFeed {
    pub response_json: String,
    pub timestamp: i64,
}

impl Store {
    /// All registered feeds, oldest registration first.
    pub async fn list_feeds(&self) -> Result<Vec<Feed>> {
        let rows = sqlx::query_as::<_, Feed>(
            "SELECT id, uri, handle, record_name, display_name, description, avatar_path
             FROM feeds
             ORDER BY id",
        )
        .fetch_all(self.pool())
        .await?;
        Ok(rows)
    }

    /// Create or reconfigure a feed row; returns its id.
    pub async fn upsert_feed(&self, feed: &NewFeed) -> Result<i32> {
        let id: i32 = sqlx::query_scalar(
            "INSERT INTO feeds (uri, handle, record_name, display_name, description, avatar_path)
             VALUES ($1, $2, $3, $4, $5, $6)
             ON CONFLICT (uri) DO UPDATE SET
                 handle = EXCLUDED.handle,
                 record_name = EXCLUDED.record_name,
                 display_name = EXCLUDED.display_name,
                 description = EXCLUDED.description,
                 avatar_path = EXCLUDED.avatar_path
             RETURNING id",
        )
        .bind(&feed.uri)
        .bind(&feed.handle)
        .bind(&feed.record_name)
        .bind(&feed.display_name)
        .bind(&feed.description)
        .bind(&feed.avatar_path)
        .fetch_one(self.pool())
        .await?;
        Ok(id)
    }

    /// Replace a feed's sources wholesale: delete the old rows, insert the
    /// new set, atomically.
    pub async fn replace_sources(&self, feed_id: i32, sources: &[FeedSource]) -> Result<()> {
        let mut tx = self.pool().begin().await?;
        sqlx::query("DELETE FROM feed_sources WHERE feed_id = $1")
            .bind(feed_id)
            .execute(&mut *tx)
            .await?;
        for source in sources {
            sqlx::query(
                "INSERT INTO feed_sources (feed_id, source_type, identifier)
                 VALUES ($1, $2, $3)
                 ON CONFLICT (feed_id, source_type, identifier) DO NOTHING",
            )
            .bind(feed_id)
            .bind(source.source_type.as_str())
            .bind(&source.identifier)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;
        Ok(())
    }

    /// All sources configured for a feed, in insertion order. Rows with an
    /// unrecognized source type are skipped with a warning.
    pub async fn sources_for_feed(&self, feed_uri: &str) -> Result<Vec<FeedSource>> {
        let rows: Vec<(String, String)> = sqlx::query_as(
            "SELECT s.source_type, s.identifier
             FROM feed_sources s
             JOIN feeds f ON s.feed_id = f.id
             WHERE f.uri = $1
             ORDER BY s.id",
        )
        .bind(feed_uri)
        .fetch_all(self.pool())
        .await?;

        let mut sources = Vec::with_capacity(rows.len());
        for (source_type, identifier) in rows {
            match source_type.parse::<SourceType>() {
                Ok(source_type) => sources.push(FeedSource {
                    source_type,
                    identifier,
                }),
                Err(e) => {
                    tracing::warn!(feed = %feed_uri, error = %e, "skipping feed source row");
                }
            }
        }
        Ok(sources)
    }

    /// The cached skeleton row for a feed, if one has ever been built.
    pub async fn feed_cache(&self, feed_uri: &str) -> Result<Option<CachedFeed>> {
        let row = sqlx::query_as::<_, CachedFeed>(
            "SELECT response_json, timestamp FROM feed_cache WHERE feed_uri = $1",
        )
        .bind(feed_uri)
        .fetch_optional(self.pool())
        .await?;
        Ok(row)
    }

    /// Overwrite the cached skeleton for a feed.
    pub async fn put_feed_cache(&self, feed_uri: &str, response_json: &str, timestamp: i64) -> Result<()> {
        sqlx::query(
            "INSERT INTO feed_cache (feed_uri, response_json, timestamp)
             VALUES ($1, $2, $3)
             ON CONFLICT (feed_uri) DO UPDATE SET
                 response_json = EXCLUDED.response_json,
                 timestamp = EXCLUDED.timestamp",
        )
        .bind(feed_uri)
        .bind(response_json)
        .bind(timestamp)
        .execute(self.pool())
        .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn source_type_round_trips_through_str() {
        for st in [
            SourceType::AccountPreference,
            SourceType::TopicPreference,
            SourceType::AccountFilter,
            SourceType::TopicFilter,
        ] {
            assert_eq!(st.as_str().parse::<SourceType>().unwrap(), st);
        }
    }

    #[test]
    fn source_type_rejects_unknown() {
        assert!("block_everything".parse::<SourceType>().is_err());
    }

    #[test]
    fn source_type_serde_uses_snake_case() {
        let json = serde_json::to_string(&SourceType::TopicFilter).unwrap();
        assert_eq!(json, "\"topic_filter\"");
        let parsed: SourceType = serde_json::from_str("\"account_preference\"").unwrap();
        assert_eq!(parsed, SourceType::AccountPreference);
    }
}
