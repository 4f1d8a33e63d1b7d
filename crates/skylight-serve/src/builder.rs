//! Feed skeleton rebuild.
//!
//! A rebuild aggregates candidate post URIs from the feed's preference
//! sources, deduplicates them in first-seen order, hydrates each candidate
//! in list order, drops everything matching the feed's block rules, stops
//! as soon as the requested limit is reached, and persists the resulting
//! skeleton to the feed cache.
//!
//! Preference-source fetches run concurrently; the hydrate-and-filter pass
//! is sequential so truncation at the limit stays deterministic.

use std::collections::HashSet;
use std::future::Future;

use chrono::Utc;
use futures::future::join_all;
use serde::{Deserialize, Serialize};

use skylight_core::{post_uri, FeedSource, PostView, Result, SourceType};

use crate::state::AppState;

/// The feed response shape: an ordered list of post URIs plus a cursor.
///
/// The cursor is the build time as a stringified UNIX timestamp; it is a
/// freshness token, not a pagination handle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Skeleton {
    pub cursor: String,
    pub feed: Vec<SkeletonItem>,
}

/// One entry of a [`Skeleton`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkeletonItem {
    pub post: String,
}

/// A feed's sources, separated into candidate generators and block rules.
pub(crate) struct BuildRules {
    pub prefs: Vec<FeedSource>,
    pub blocked: HashSet<String>,
    pub banned: HashSet<String>,
}

/// Split sources into preference sources and the two filter sets:
/// blocked author DIDs and lower-cased banned keywords.
pub(crate) fn partition_sources(sources: Vec<FeedSource>) -> BuildRules {
    let mut prefs = Vec::new();
    let mut blocked = HashSet::new();
    let mut banned = HashSet::new();

    for source in sources {
        match source.source_type {
            SourceType::AccountPreference | SourceType::TopicPreference => prefs.push(source),
            SourceType::AccountFilter => {
                blocked.insert(source.identifier);
            }
            SourceType::TopicFilter => {
                banned.insert(source.identifier.to_lowercase());
            }
        }
    }

    BuildRules {
        prefs,
        blocked,
        banned,
    }
}

/// Whether a hydrated post is excluded by the block rules: its author is
/// blocked, or any banned keyword occurs anywhere in the lower-cased text
/// (substring match, not word-boundary).
pub(crate) fn should_block(
    post: &PostView,
    blocked: &HashSet<String>,
    banned: &HashSet<String>,
) -> bool {
    if blocked.contains(&post.author.did) {
        return true;
    }
    let text = post.record.text.to_lowercase();
    banned.iter().any(|keyword| text.contains(keyword.as_str()))
}

/// Walk the candidate list in order: dedup by URI (first seen wins),
/// hydrate each survivor, apply block rules, and stop once `limit` posts
/// have been accepted. A candidate whose hydration yields nothing is
/// skipped, never fatal.
pub(crate) async fn select_posts<F, Fut>(
    candidates: Vec<String>,
    blocked: &HashSet<String>,
    banned: &HashSet<String>,
    limit: usize,
    fetch: F,
) -> Vec<String>
where
    F: Fn(String) -> Fut,
    Fut: Future<Output = Option<PostView>>,
{
    let mut seen = HashSet::new();
    let mut picked = Vec::new();

    for uri in candidates {
        if !seen.insert(uri.clone()) {
            continue;
        }

        let Some(post) = fetch(uri.clone()).await else {
            continue;
        };

        if should_block(&post, blocked, banned) {
            continue;
        }

        picked.push(uri);
        if picked.len() >= limit {
            break;
        }
    }

    picked
}

/// Build a fresh skeleton for `feed_uri` and persist it to the feed cache.
pub async fn build_feed(state: &AppState, feed_uri: &str, limit: usize) -> Result<Skeleton> {
    let sources = state.store.sources_for_feed(feed_uri).await?;
    let rules = partition_sources(sources);

    // All preference sources fetch concurrently; a failed source
    // contributes nothing. Order among sources follows their configured
    // order, and order within a source is preserved by the fetch itself.
    let fetches = rules
        .prefs
        .iter()
        .map(|source| fetch_candidates(state, source, limit));
    let collected: Vec<String> = join_all(fetches).await.into_iter().flatten().collect();

    let appview = state.appview.clone();
    let picked = select_posts(collected, &rules.blocked, &rules.banned, limit, |uri| {
        let appview = appview.clone();
        async move { appview.get_post(&uri).await }
    })
    .await;

    let now = Utc::now().timestamp();
    let skeleton = Skeleton {
        cursor: now.to_string(),
        feed: picked
            .into_iter()
            .take(limit)
            .map(|post| SkeletonItem { post })
            .collect(),
    };

    let serialized = serde_json::to_string(&skeleton)?;
    state.store.put_feed_cache(feed_uri, &serialized, now).await?;

    metrics::counter!("feed_builds_total").increment(1);
    tracing::debug!(feed = %feed_uri, entries = skeleton.feed.len(), "rebuilt feed skeleton");

    Ok(skeleton)
}

/// Fetch the ordered candidate URIs contributed by one preference source.
async fn fetch_candidates(state: &AppState, source: &FeedSource, limit: usize) -> Vec<String> {
    match source.source_type {
        SourceType::AccountPreference => {
            state.appview.author_feed(&source.identifier, limit).await
        }
        SourceType::TopicPreference => {
            match topic_candidates(state, &source.identifier, limit).await {
                Ok(uris) => uris,
                Err(e) => {
                    tracing::warn!(topic = %source.identifier, error = %e, "topic search failed");
                    Vec::new()
                }
            }
        }
        // Filters are applied to results, not fetched.
        SourceType::AccountFilter | SourceType::TopicFilter => Vec::new(),
    }
}

/// Similarity search for a topic string: embed the topic, query the store,
/// return candidate URIs in similarity-rank order.
async fn topic_candidates(state: &AppState, topic: &str, limit: usize) -> Result<Vec<String>> {
    let embedding = state.embedder.embed(topic).await?;
    let hits = state
        .store
        .vector_search_posts(&embedding, limit as i64)
        .await?;
    Ok(hits
        .into_iter()
        .map(|hit| post_uri(&hit.repo, &hit.rkey))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use skylight_core::appview::{AuthorRef, PostRecordView};
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn source(source_type: SourceType, identifier: &str) -> FeedSource {
        FeedSource {
            source_type,
            identifier: identifier.to_string(),
        }
    }

    fn post(uri: &str, did: &str, text: &str) -> PostView {
        PostView {
            uri: uri.to_string(),
            author: AuthorRef {
                did: did.to_string(),
            },
            record: PostRecordView {
                text: text.to_string(),
            },
        }
    }

    fn set(items: &[&str]) -> HashSet<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn partition_separates_preferences_from_filters() {
        let rules = partition_sources(vec![
            source(SourceType::AccountPreference, "did:plc:alice"),
            source(SourceType::TopicPreference, "basketball"),
            source(SourceType::AccountFilter, "did:plc:spammer"),
            source(SourceType::TopicFilter, "Politics"),
        ]);

        assert_eq!(rules.prefs.len(), 2);
        assert!(rules.blocked.contains("did:plc:spammer"));
        // Banned keywords are lower-cased at partition time.
        assert!(rules.banned.contains("politics"));
    }

    #[test]
    fn should_block_blocked_author() {
        let blocked = set(&["did:plc:spammer"]);
        let banned = HashSet::new();
        assert!(should_block(
            &post("at://u/1", "did:plc:spammer", "anything"),
            &blocked,
            &banned
        ));
        assert!(!should_block(
            &post("at://u/2", "did:plc:friend", "anything"),
            &blocked,
            &banned
        ));
    }

    #[test]
    fn should_block_keyword_is_case_insensitive_substring() {
        let blocked = HashSet::new();
        let banned = set(&["politics"]);
        assert!(should_block(
            &post("at://u/1", "did:plc:a", "I hate POLITICS today"),
            &blocked,
            &banned
        ));
        // Substring, not word-boundary.
        assert!(should_block(
            &post("at://u/2", "did:plc:a", "geopolitics is fascinating"),
            &blocked,
            &banned
        ));
        assert!(!should_block(
            &post("at://u/3", "did:plc:a", "basketball highlights"),
            &blocked,
            &banned
        ));
    }

    #[tokio::test]
    async fn select_posts_dedups_in_first_seen_order() {
        let candidates = vec![
            "at://u/1".to_string(),
            "at://u/2".to_string(),
            "at://u/1".to_string(),
            "at://u/3".to_string(),
        ];
        let picked = select_posts(candidates, &HashSet::new(), &HashSet::new(), 10, |uri| async move {
            Some(post(&uri, "did:plc:a", "text"))
        })
        .await;
        assert_eq!(picked, vec!["at://u/1", "at://u/2", "at://u/3"]);
    }

    #[tokio::test]
    async fn select_posts_stops_fetching_at_limit() {
        let candidates: Vec<String> = (0..10).map(|i| format!("at://u/{i}")).collect();
        let fetches = AtomicUsize::new(0);
        let picked = select_posts(candidates, &HashSet::new(), &HashSet::new(), 3, |uri| {
            fetches.fetch_add(1, Ordering::SeqCst);
            async move { Some(post(&uri, "did:plc:a", "text")) }
        })
        .await;
        assert_eq!(picked.len(), 3);
        // Candidates past the limit are never evaluated.
        assert_eq!(fetches.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn select_posts_skips_unfetchable_candidates() {
        let candidates = vec!["at://u/gone".to_string(), "at://u/here".to_string()];
        let picked = select_posts(candidates, &HashSet::new(), &HashSet::new(), 10, |uri| async move {
            if uri.ends_with("gone") {
                None
            } else {
                Some(post(&uri, "did:plc:a", "text"))
            }
        })
        .await;
        assert_eq!(picked, vec!["at://u/here"]);
    }

    #[tokio::test]
    async fn basketball_feed_excludes_politics_post() {
        // One topic preference ("basketball") produced five candidates;
        // one of them mentions politics and a topic filter bans it.
        let rules = partition_sources(vec![
            source(SourceType::TopicPreference, "basketball"),
            source(SourceType::TopicFilter, "politics"),
        ]);

        let texts: HashMap<&str, &str> = HashMap::from([
            ("at://u/1", "pickup basketball at the park"),
            ("at://u/2", "basketball and politics don't mix"),
            ("at://u/3", "college basketball rankings"),
            ("at://u/4", "basketball sneaker review"),
            ("at://u/5", "watching basketball tonight"),
        ]);
        let candidates: Vec<String> = (1..=5).map(|i| format!("at://u/{i}")).collect();

        let picked = select_posts(candidates, &rules.blocked, &rules.banned, 10, |uri| {
            let text = texts[uri.as_str()];
            async move { Some(post(&uri, "did:plc:hooper", text)) }
        })
        .await;

        assert_eq!(picked, vec!["at://u/1", "at://u/3", "at://u/4", "at://u/5"]);
    }

    #[test]
    fn skeleton_serializes_to_the_wire_shape() {
        let skeleton = Skeleton {
            cursor: "1700000000".to_string(),
            feed: vec![SkeletonItem {
                post: "at://did:plc:a/app.bsky.feed.post/3k".to_string(),
            }],
        };
        let json = serde_json::to_value(&skeleton).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "cursor": "1700000000",
                "feed": [{"post": "at://did:plc:a/app.bsky.feed.post/3k"}]
            })
        );
    }
}
