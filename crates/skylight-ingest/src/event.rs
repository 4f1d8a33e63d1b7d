//! Jetstream wire types and record extraction.
//!
//! The firehose delivers one JSON message per repo event. Only commit
//! events creating a post record qualify for indexing; everything else is
//! discarded. The record payload is kept as raw JSON; it is stored
//! verbatim alongside the extracted fields.

use chrono::{DateTime, NaiveDateTime};
use serde::Deserialize;
use serde_json::Value;

/// The collection of post-creation records.
pub const POST_COLLECTION: &str = "app.bsky.feed.post";

/// A single firehose message.
#[derive(Debug, Clone, Deserialize)]
pub struct JetstreamEvent {
    pub did: String,
    pub commit: Option<Commit>,
}

/// The commit half of a firehose message.
#[derive(Debug, Clone, Deserialize)]
pub struct Commit {
    #[serde(default)]
    pub operation: String,
    #[serde(default)]
    pub collection: String,
    #[serde(default)]
    pub rkey: String,
    pub cid: Option<String>,
    pub record: Option<Value>,
}

/// A qualifying post-creation event, ready for indexing.
#[derive(Debug, Clone)]
pub struct PostEvent {
    pub did: String,
    pub rkey: String,
    pub cid: Option<String>,
    pub record: Value,
}

impl JetstreamEvent {
    /// Narrow this message to a post-creation event, or `None` for every
    /// other collection and operation.
    pub fn into_post_event(self) -> Option<PostEvent> {
        let commit = self.commit?;
        if commit.collection != POST_COLLECTION || commit.operation != "create" {
            return None;
        }
        let record = commit.record?;
        Some(PostEvent {
            did: self.did,
            rkey: commit.rkey,
            cid: commit.cid,
            record,
        })
    }
}

/// Extract the searchable text of a post record: the primary text field
/// plus any alt-text from attached image embeds, space-joined and trimmed.
pub fn extract_text(record: &Value) -> String {
    let text = record.get("text").and_then(Value::as_str).unwrap_or_default();

    let mut alt_texts: Vec<&str> = Vec::new();
    if let Some(embed) = record.get("embed") {
        let is_images = embed
            .get("$type")
            .and_then(Value::as_str)
            .map(|t| t.starts_with("app.bsky.embed.images"))
            .unwrap_or(false);
        if is_images {
            if let Some(images) = embed.get("images").and_then(Value::as_array) {
                for image in images {
                    if let Some(alt) = image.get("alt").and_then(Value::as_str) {
                        if !alt.is_empty() {
                            alt_texts.push(alt);
                        }
                    }
                }
            }
        }
    }

    let combined = format!("{} {}", text, alt_texts.join(" "));
    combined.trim().to_string()
}

/// Parse the record's declared creation time into a timezone-naive UTC
/// timestamp. Malformed or absent values yield `None`; the store tolerates
/// null timestamps.
pub fn parse_created_at(record: &Value) -> Option<NaiveDateTime> {
    let raw = record.get("createdAt").and_then(Value::as_str)?;
    DateTime::parse_from_rfc3339(raw).ok().map(|dt| dt.naive_utc())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn extract_text_plain_post() {
        let record = json!({"text": "  hello world  "});
        assert_eq!(extract_text(&record), "hello world");
    }

    #[test]
    fn extract_text_includes_image_alt_text() {
        let record = json!({
            "text": "sunset",
            "embed": {
                "$type": "app.bsky.embed.images",
                "images": [
                    {"alt": "orange sky"},
                    {"alt": ""},
                    {"alt": "over the bay"}
                ]
            }
        });
        assert_eq!(extract_text(&record), "sunset orange sky over the bay");
    }

    #[test]
    fn extract_text_ignores_non_image_embeds() {
        let record = json!({
            "text": "link post",
            "embed": {
                "$type": "app.bsky.embed.external",
                "external": {"description": "should not appear"}
            }
        });
        assert_eq!(extract_text(&record), "link post");
    }

    #[test]
    fn extract_text_alt_only_post() {
        let record = json!({
            "embed": {
                "$type": "app.bsky.embed.images#view",
                "images": [{"alt": "just a picture"}]
            }
        });
        assert_eq!(extract_text(&record), "just a picture");
    }

    #[test]
    fn parse_created_at_accepts_zulu() {
        let record = json!({"createdAt": "2025-03-01T12:30:00Z"});
        let ts = parse_created_at(&record).unwrap();
        assert_eq!(ts.to_string(), "2025-03-01 12:30:00");
    }

    #[test]
    fn parse_created_at_converts_offsets_to_utc() {
        let record = json!({"createdAt": "2025-03-01T12:30:00+05:00"});
        let ts = parse_created_at(&record).unwrap();
        assert_eq!(ts.to_string(), "2025-03-01 07:30:00");
    }

    #[test]
    fn parse_created_at_tolerates_garbage() {
        assert!(parse_created_at(&json!({"createdAt": "yesterday"})).is_none());
        assert!(parse_created_at(&json!({})).is_none());
    }

    #[test]
    fn into_post_event_filters_collections_and_operations() {
        let message = |collection: &str, operation: &str| {
            json!({
                "did": "did:plc:author",
                "commit": {
                    "operation": operation,
                    "collection": collection,
                    "rkey": "3kabc",
                    "cid": "bafy123",
                    "record": {"text": "hi"}
                }
            })
        };

        let event: JetstreamEvent =
            serde_json::from_value(message(POST_COLLECTION, "create")).unwrap();
        let post = event.into_post_event().unwrap();
        assert_eq!(post.did, "did:plc:author");
        assert_eq!(post.rkey, "3kabc");
        assert_eq!(post.cid.as_deref(), Some("bafy123"));

        let event: JetstreamEvent =
            serde_json::from_value(message(POST_COLLECTION, "delete")).unwrap();
        assert!(event.into_post_event().is_none());

        let event: JetstreamEvent =
            serde_json::from_value(message("app.bsky.feed.like", "create")).unwrap();
        assert!(event.into_post_event().is_none());
    }

    #[test]
    fn into_post_event_requires_commit_and_record() {
        let event: JetstreamEvent =
            serde_json::from_value(json!({"did": "did:plc:x", "kind": "identity"})).unwrap();
        assert!(event.into_post_event().is_none());

        let event: JetstreamEvent = serde_json::from_value(json!({
            "did": "did:plc:x",
            "commit": {"operation": "create", "collection": POST_COLLECTION, "rkey": "r"}
        }))
        .unwrap();
        assert!(event.into_post_event().is_none());
    }
}
