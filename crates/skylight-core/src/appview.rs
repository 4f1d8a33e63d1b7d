//! Bluesky AppView HTTP client.
//!
//! Thin client for the public AppView XRPC endpoints the engine depends
//! on: profile lookup during ingestion, author feeds and full-post
//! hydration during feed builds. Every call carries its own deadline and
//! degrades on failure (`None` / empty) rather than surfacing an error:
//! a missing profile or an unfetchable post is never fatal to the caller.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// The public Bluesky AppView.
pub const DEFAULT_APPVIEW_URL: &str = "https://public.api.bsky.app";

const PROFILE_TIMEOUT: Duration = Duration::from_secs(10);
const AUTHOR_FEED_TIMEOUT: Duration = Duration::from_secs(30);
const GET_POSTS_TIMEOUT: Duration = Duration::from_secs(20);

/// Client for the AppView XRPC API.
#[derive(Debug, Clone)]
pub struct AppView {
    client: reqwest::Client,
    base_url: String,
}

/// Author profile attributes, as returned by `app.bsky.actor.getProfile`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Profile {
    pub handle: Option<String>,
    pub display_name: Option<String>,
    pub description: Option<String>,
    pub followers_count: i32,
    pub follows_count: i32,
    pub posts_count: i32,
}

/// A hydrated post view, as returned by `app.bsky.feed.getPosts`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PostView {
    pub uri: String,
    pub author: AuthorRef,
    #[serde(default)]
    pub record: PostRecordView,
}

/// The post author reference inside a [`PostView`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthorRef {
    pub did: String,
}

/// The record fields of a [`PostView`] the engine cares about.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PostRecordView {
    #[serde(default)]
    pub text: String,
}

#[derive(Deserialize)]
struct AuthorFeedResponse {
    #[serde(default)]
    feed: Vec<FeedItem>,
}

#[derive(Deserialize)]
struct FeedItem {
    post: Option<FeedItemPost>,
}

#[derive(Deserialize)]
struct FeedItemPost {
    uri: Option<String>,
}

#[derive(Deserialize)]
struct GetPostsResponse {
    #[serde(default)]
    posts: Vec<PostView>,
}

impl AppView {
    /// Create a new client against the given AppView base URL.
    pub fn new(base_url: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    /// Fetch profile attributes for an author DID.
    ///
    /// Returns `None` on any failure (non-200, transport error, bad body);
    /// callers proceed with default profile fields.
    pub async fn get_profile(&self, did: &str) -> Option<Profile> {
        let url = format!("{}/xrpc/app.bsky.actor.getProfile?actor={}", self.base_url, did);

        let response = match self.client.get(&url).timeout(PROFILE_TIMEOUT).send().await {
            Ok(r) => r,
            Err(e) => {
                tracing::warn!(did = %did, error = %e, "profile fetch failed");
                return None;
            }
        };

        if !response.status().is_success() {
            tracing::warn!(did = %did, status = %response.status(), "profile fetch failed");
            return None;
        }

        match response.json::<Profile>().await {
            Ok(profile) => Some(profile),
            Err(e) => {
                tracing::warn!(did = %did, error = %e, "profile response unreadable");
                None
            }
        }
    }

    /// Fetch the most recent post URIs from an author's feed, newest first.
    ///
    /// Entries that are not well-formed post URIs are skipped; any failure
    /// yields an empty list.
    pub async fn author_feed(&self, did: &str, limit: usize) -> Vec<String> {
        let url = format!(
            "{}/xrpc/app.bsky.feed.getAuthorFeed?actor={}&limit={}",
            self.base_url, did, limit
        );

        let response = match self
            .client
            .get(&url)
            .timeout(AUTHOR_FEED_TIMEOUT)
            .send()
            .await
        {
            Ok(r) if r.status().is_success() => r,
            Ok(r) => {
                tracing::warn!(did = %did, status = %r.status(), "author feed fetch failed");
                return Vec::new();
            }
            Err(e) => {
                tracing::warn!(did = %did, error = %e, "author feed fetch failed");
                return Vec::new();
            }
        };

        let body: AuthorFeedResponse = match response.json().await {
            Ok(b) => b,
            Err(e) => {
                tracing::warn!(did = %did, error = %e, "author feed response unreadable");
                return Vec::new();
            }
        };

        body.feed
            .into_iter()
            .filter_map(|item| item.post.and_then(|p| p.uri))
            .filter_map(|uri| {
                // Re-derive the canonical at-uri so dedup downstream
                // compares like with like.
                parse_at_uri(&uri).map(|(repo, rkey)| post_uri(repo, rkey))
            })
            .collect()
    }

    /// Fetch the full post view for an at-uri.
    ///
    /// Returns `None` if the post cannot be fetched or no longer exists.
    pub async fn get_post(&self, uri: &str) -> Option<PostView> {
        let url = format!("{}/xrpc/app.bsky.feed.getPosts?uris={}", self.base_url, uri);

        let response = match self.client.get(&url).timeout(GET_POSTS_TIMEOUT).send().await {
            Ok(r) if r.status().is_success() => r,
            Ok(r) => {
                tracing::debug!(uri = %uri, status = %r.status(), "full post fetch failed");
                return None;
            }
            Err(e) => {
                tracing::debug!(uri = %uri, error = %e, "full post fetch failed");
                return None;
            }
        };

        match response.json::<GetPostsResponse>().await {
            Ok(body) => body.posts.into_iter().next(),
            Err(e) => {
                tracing::debug!(uri = %uri, error = %e, "full post response unreadable");
                None
            }
        }
    }
}

/// Build the canonical at-uri for a post.
pub fn post_uri(repo: &str, rkey: &str) -> String {
    format!("at://{repo}/app.bsky.feed.post/{rkey}")
}

/// Split an at-uri into `(repo, rkey)`.
///
/// Returns `None` for anything that is not `at://<repo>/<collection>/<rkey>`.
pub fn parse_at_uri(uri: &str) -> Option<(&str, &str)> {
    let rest = uri.strip_prefix("at://")?;
    let mut parts = rest.splitn(3, '/');
    let repo = parts.next()?;
    let _collection = parts.next()?;
    let rkey = parts.next()?;
    if repo.is_empty() || rkey.is_empty() || rkey.contains('/') {
        return None;
    }
    Some((repo, rkey))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_at_uri_round_trips() {
        let uri = post_uri("did:plc:abc123", "3kxyz");
        assert_eq!(uri, "at://did:plc:abc123/app.bsky.feed.post/3kxyz");
        assert_eq!(parse_at_uri(&uri), Some(("did:plc:abc123", "3kxyz")));
    }

    #[test]
    fn parse_at_uri_rejects_malformed() {
        assert_eq!(parse_at_uri("https://example.com/x/y"), None);
        assert_eq!(parse_at_uri("at://only-repo"), None);
        assert_eq!(parse_at_uri("at://repo/collection"), None);
        assert_eq!(parse_at_uri("at:///app.bsky.feed.post/rkey"), None);
        assert_eq!(parse_at_uri("at://repo/coll/rkey/extra"), None);
    }
}
