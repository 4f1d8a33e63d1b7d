//! Live firehose event source.
//!
//! Maintains a persistent WebSocket subscription to a Jetstream endpoint
//! and feeds qualifying post-creation events to a handler, one at a time
//! in arrival order.
//!
//! # Reconnect Behavior
//!
//! The connection loop is the daemon's steady state: on any disconnect or
//! connect failure it waits a fixed backoff and reconnects, indefinitely.
//! The only fatal error is a URL that cannot be turned into a client
//! request at all.
//!
//! # Per-Message Isolation
//!
//! A malformed message or a failed handler call is counted and logged,
//! never fatal to the stream.

use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::Message;

use crate::error::{Error, Result};
use crate::event::{JetstreamEvent, PostEvent};

/// Default Jetstream endpoint, subscribed to post records only.
pub const DEFAULT_JETSTREAM_URL: &str =
    "wss://jetstream2.us-east.bsky.network/subscribe?wantedCollections=app.bsky.feed.post";

/// How often to emit a progress line.
const PROGRESS_INTERVAL: usize = 10_000;

/// Configuration for the firehose source.
#[derive(Debug, Clone)]
pub struct FirehoseConfig {
    /// Jetstream subscription URL.
    pub url: String,

    /// Backoff between reconnect attempts.
    pub reconnect_delay: Duration,
}

impl Default for FirehoseConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_JETSTREAM_URL.to_string(),
            reconnect_delay: Duration::from_secs(5),
        }
    }
}

/// Live firehose source.
pub struct Firehose {
    config: FirehoseConfig,
    stats: FirehoseStats,
}

#[derive(Default)]
struct FirehoseStats {
    events_received: AtomicUsize,
    posts_handled: AtomicUsize,
    parse_errors: AtomicUsize,
}

impl Firehose {
    /// Create a new firehose source with the given configuration.
    pub fn new(config: FirehoseConfig) -> Self {
        Self {
            config,
            stats: FirehoseStats::default(),
        }
    }

    /// Run the consume loop, invoking `handler` for each qualifying
    /// post-creation event in arrival order.
    ///
    /// Events are processed sequentially: the next message is not read
    /// until the handler's future resolves, so per-event side effects are
    /// serialized relative to each other. Handler errors are logged and
    /// the stream continues.
    ///
    /// Never returns on a healthy configuration; the reconnect loop runs
    /// forever.
    pub async fn run<F, Fut>(&self, mut handler: F) -> Result<()>
    where
        F: FnMut(PostEvent) -> Fut,
        Fut: Future<Output = Result<()>>,
    {
        // Reject an unusable URL up front; everything after this point is
        // retried rather than surfaced.
        self.config
            .url
            .as_str()
            .into_client_request()
            .map_err(|e| Error::Config(format!("invalid firehose url {}: {}", self.config.url, e)))?;

        loop {
            match connect_async(self.config.url.as_str()).await {
                Ok((stream, _response)) => {
                    tracing::info!(url = %self.config.url, "connected to firehose");
                    let (mut write, mut read) = stream.split();

                    while let Some(message) = read.next().await {
                        match message {
                            Ok(Message::Text(text)) => {
                                self.stats.events_received.fetch_add(1, Ordering::Relaxed);
                                metrics::counter!("ingest_events_total").increment(1);

                                let event: JetstreamEvent = match serde_json::from_str(&text) {
                                    Ok(event) => event,
                                    Err(e) => {
                                        self.stats.parse_errors.fetch_add(1, Ordering::Relaxed);
                                        metrics::counter!("ingest_parse_errors_total").increment(1);
                                        tracing::debug!(error = %e, "discarding unparseable firehose message");
                                        continue;
                                    }
                                };

                                let Some(post) = event.into_post_event() else {
                                    continue;
                                };

                                if let Err(e) = handler(post).await {
                                    metrics::counter!("ingest_index_errors_total").increment(1);
                                    tracing::error!(error = %e, "failed to index event");
                                    continue;
                                }

                                let handled =
                                    self.stats.posts_handled.fetch_add(1, Ordering::Relaxed) + 1;
                                if handled % PROGRESS_INTERVAL == 0 {
                                    tracing::info!(
                                        "indexed {} posts ({} messages received, {} unparseable)",
                                        handled,
                                        self.stats.events_received.load(Ordering::Relaxed),
                                        self.stats.parse_errors.load(Ordering::Relaxed)
                                    );
                                }
                            }

                            Ok(Message::Ping(payload)) => {
                                if let Err(e) = write.send(Message::Pong(payload)).await {
                                    tracing::warn!(error = %e, "failed to answer ping");
                                    break;
                                }
                            }

                            Ok(Message::Close(frame)) => {
                                tracing::warn!(frame = ?frame, "firehose closed the connection");
                                break;
                            }

                            Ok(_) => {}

                            Err(e) => {
                                tracing::warn!(error = %e, "firehose read error");
                                break;
                            }
                        }
                    }

                    tracing::warn!(
                        "firehose stream ended, reconnecting in {:?}",
                        self.config.reconnect_delay
                    );
                }

                Err(e) => {
                    tracing::warn!(
                        error = %e,
                        "firehose connect failed, retrying in {:?}",
                        self.config.reconnect_delay
                    );
                }
            }

            metrics::counter!("ingest_reconnects_total").increment(1);
            tokio::time::sleep(self.config.reconnect_delay).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn run_rejects_malformed_url() {
        let firehose = Firehose::new(FirehoseConfig {
            url: "not a url".to_string(),
            reconnect_delay: Duration::from_millis(1),
        });
        let result = firehose.run(|_event| async { Ok(()) }).await;
        assert!(matches!(result, Err(Error::Config(_))));
    }
}
