//! Skylight ingestion pipeline components.
//!
//! This crate provides the pipeline that turns the live Bluesky firehose
//! into post and author rows in the content store.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────┐
//! │    Firehose     │  Jetstream WebSocket, reconnects forever
//! └────────┬────────┘
//!          │ one post-creation event at a time
//!          ▼
//! ┌─────────────────┐
//! │     Indexer     │  embed text, insert post, upsert author
//! └────────┬────────┘
//!          │
//!          ▼
//! ┌─────────────────┐
//! │  Content Store  │  Postgres + pgvector
//! └─────────────────┘
//! ```
//!
//! Events are consumed sequentially: the single in-flight handler call is
//! what keeps per-author rolling state race-free within one daemon.

pub mod error;
pub mod event;
pub mod firehose;
pub mod indexer;

pub use error::{Error, Result};
pub use event::{extract_text, parse_created_at, Commit, JetstreamEvent, PostEvent, POST_COLLECTION};
pub use firehose::{Firehose, FirehoseConfig, DEFAULT_JETSTREAM_URL};
pub use indexer::Indexer;
