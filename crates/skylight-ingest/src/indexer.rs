//! Per-event indexing pipeline.
//!
//! Each qualifying firehose event produces one post insert and one author
//! insert-or-update. Post inserts are append-only; the author path either
//! creates the row (fetching the profile, tolerating a failed lookup) or
//! applies the rolling-window update to the existing one.

use std::sync::Arc;

use chrono::NaiveDateTime;

use skylight_core::{cap_posts_text, AppView, Embedder, NewAuthor, NewPost, Store};

use crate::error::Result;
use crate::event::{extract_text, parse_created_at, PostEvent};

/// Indexes firehose events into the content store.
pub struct Indexer {
    store: Store,
    embedder: Arc<dyn Embedder>,
    appview: AppView,
}

impl Indexer {
    /// Create a new indexer.
    pub fn new(store: Store, embedder: Arc<dyn Embedder>, appview: AppView) -> Self {
        Self {
            store,
            embedder,
            appview,
        }
    }

    /// Index one post-creation event: insert the post, then create or
    /// update its author.
    pub async fn index_post(&self, event: PostEvent) -> Result<()> {
        let text = extract_text(&event.record);
        let created_at = parse_created_at(&event.record);

        let embedding = self.embedder.embed(&text).await?;

        self.store
            .insert_post(NewPost {
                repo: event.did.clone(),
                rkey: event.rkey,
                cid: event.cid,
                text: text.clone(),
                created_at,
                embedding,
                raw: event.record,
            })
            .await?;
        metrics::counter!("ingest_posts_total").increment(1);
        tracing::debug!(repo = %event.did, "inserted post");

        if self.store.author_exists(&event.did).await? {
            self.update_author(&event.did, &text, created_at).await?;
        } else {
            self.create_author(&event.did, &text, created_at).await?;
        }

        Ok(())
    }

    /// First post seen from this author: fetch the profile (proceeding
    /// with defaults when the lookup fails), embed all four author texts
    /// in one batch, and insert.
    async fn create_author(
        &self,
        did: &str,
        text: &str,
        created_at: Option<NaiveDateTime>,
    ) -> Result<()> {
        let profile = self.appview.get_profile(did).await.unwrap_or_default();

        let handle = profile.handle.unwrap_or_else(|| did.to_string());
        let display_name = profile.display_name.unwrap_or_default();
        let description = profile.description.unwrap_or_default();
        let posts_text = cap_posts_text(text);

        let texts = vec![
            display_name.clone(),
            handle.clone(),
            description.clone(),
            posts_text.clone(),
        ];
        let embeddings = self.embedder.embed_batch(&texts).await?;
        let [display_name_embedding, handle_embedding, description_embedding, posts_embedding]: [Vec<f32>; 4] =
            embeddings.try_into().map_err(|_| {
                skylight_core::Error::Embedding("author embedding batch size mismatch".to_string())
            })?;

        self.store
            .insert_author(NewAuthor {
                id: did.to_string(),
                handle: handle.clone(),
                display_name,
                description,
                posts_text,
                display_name_embedding,
                handle_embedding,
                description_embedding,
                posts_embedding,
                followers_count: profile.followers_count,
                follows_count: profile.follows_count,
                posts_count: profile.posts_count,
                updated_at: created_at,
            })
            .await?;
        metrics::counter!("ingest_authors_created_total").increment(1);
        tracing::info!(
            did = %did,
            handle = %handle,
            followers = profile.followers_count,
            "inserted new author"
        );

        Ok(())
    }

    /// Subsequent post from a known author: prepend the capped snippet to
    /// the rolling window, recompute only `posts_embedding`, and advance
    /// `updated_at`.
    async fn update_author(
        &self,
        did: &str,
        text: &str,
        created_at: Option<NaiveDateTime>,
    ) -> Result<()> {
        let snippet = cap_posts_text(text);
        let posts_embedding = self.embedder.embed(&snippet).await?;
        self.store
            .roll_author(did, &snippet, posts_embedding, created_at)
            .await?;
        metrics::counter!("ingest_authors_updated_total").increment(1);
        tracing::debug!(did = %did, "updated author");
        Ok(())
    }
}
