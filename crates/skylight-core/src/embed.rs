//! Embedding oracle client.
//!
//! All text that enters the store (post text, author profile fields, the
//! rolling posts window) is embedded by an external embedding service. The
//! service is consumed as a black box: it accepts a batch of texts and
//! returns one fixed-dimension vector per text. Vectors are normalized to
//! unit length on this side of the wire; a zero-norm vector is passed
//! through unchanged (the divisor is clamped to 1).

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::EMBEDDING_DIM;

/// Per-call deadline for embedding requests.
const EMBED_TIMEOUT: Duration = Duration::from_secs(30);

/// Something that can turn text into unit-normalized embedding vectors.
///
/// The serving layer holds this as a trait object so the feed builder can
/// be exercised against a deterministic embedder in tests.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Embed a batch of texts, one vector per input text, in input order.
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;

    /// Embed a single text.
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let mut vectors = self.embed_batch(&[text.to_string()]).await?;
        vectors
            .pop()
            .ok_or_else(|| Error::Embedding("empty embedding response".to_string()))
    }
}

/// HTTP client for the embedding service.
pub struct HttpEmbedder {
    client: reqwest::Client,
    endpoint: String,
}

#[derive(Serialize)]
struct EmbedRequest<'a> {
    texts: &'a [String],
}

#[derive(Deserialize)]
struct EmbedResponse {
    embeddings: Vec<Vec<f32>>,
}

impl HttpEmbedder {
    /// Create a new client for the service at `endpoint`.
    pub fn new(endpoint: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: endpoint.trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait]
impl Embedder for HttpEmbedder {
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let response = self
            .client
            .post(format!("{}/embed", self.endpoint))
            .timeout(EMBED_TIMEOUT)
            .json(&EmbedRequest { texts })
            .send()
            .await?
            .error_for_status()?;

        let body: EmbedResponse = response.json().await?;

        if body.embeddings.len() != texts.len() {
            return Err(Error::Embedding(format!(
                "expected {} embeddings, got {}",
                texts.len(),
                body.embeddings.len()
            )));
        }

        let mut embeddings = body.embeddings;
        for vector in &mut embeddings {
            if vector.len() != EMBEDDING_DIM {
                return Err(Error::DimensionMismatch {
                    expected: EMBEDDING_DIM,
                    got: vector.len(),
                });
            }
            normalize(vector);
        }

        Ok(embeddings)
    }
}

/// Normalize a vector to unit L2 length in place.
///
/// A zero-norm vector is left untouched: the divisor is clamped to 1 so
/// the all-zero embedding stays all-zero instead of dividing by zero.
pub fn normalize(vector: &mut [f32]) {
    let norm = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
    let divisor = if norm == 0.0 { 1.0 } else { norm };
    for x in vector.iter_mut() {
        *x /= divisor;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn l2_norm(v: &[f32]) -> f32 {
        v.iter().map(|x| x * x).sum::<f32>().sqrt()
    }

    #[test]
    fn normalize_produces_unit_norm() {
        let mut v = vec![3.0, 4.0];
        normalize(&mut v);
        assert!((l2_norm(&v) - 1.0).abs() < 1e-6);
        assert!((v[0] - 0.6).abs() < 1e-6);
        assert!((v[1] - 0.8).abs() < 1e-6);
    }

    #[test]
    fn normalize_leaves_zero_vector_unchanged() {
        let mut v = vec![0.0; 8];
        normalize(&mut v);
        assert!(v.iter().all(|x| *x == 0.0));
    }

    #[test]
    fn normalize_is_idempotent() {
        let mut v = vec![1.0, -2.0, 0.5];
        normalize(&mut v);
        let first = v.clone();
        normalize(&mut v);
        for (a, b) in first.iter().zip(&v) {
            assert!((a - b).abs() < 1e-6);
        }
    }

    struct FixedEmbedder;

    #[async_trait]
    impl Embedder for FixedEmbedder {
        async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
            Ok(texts.iter().map(|_| vec![1.0; EMBEDDING_DIM]).collect())
        }
    }

    #[tokio::test]
    async fn embed_single_uses_batch() {
        let vector = FixedEmbedder.embed("hello").await.unwrap();
        assert_eq!(vector.len(), EMBEDDING_DIM);
    }
}
