//! Embedding providers: the external model behind a narrow async trait.
//!
//! The service never implements its own model; it batches texts out to a
//! provider and treats the returned vectors as opaque. [`HttpEmbeddingProvider`]
//! talks to an OpenAI-compatible `/embeddings` endpoint;
//! [`MockEmbeddingProvider`] produces deterministic hash-derived vectors so
//! tests and offline demos run without credentials.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;

use crate::config::EmbeddingsConfig;
use crate::types::ArchiveError;

/// Batchable embedding interface. Implementations must return one vector per
/// input text, in input order.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Provider label for logs.
    fn name(&self) -> &str;

    /// Dimensionality of produced vectors.
    fn dimensions(&self) -> usize;

    /// Largest batch accepted in a single call.
    fn max_batch(&self) -> usize {
        64
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, ArchiveError>;
}

/// Client for an OpenAI-compatible embeddings endpoint.
pub struct HttpEmbeddingProvider {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
    dimensions: usize,
}

impl HttpEmbeddingProvider {
    pub fn new(config: &EmbeddingsConfig) -> Result<Self, ArchiveError> {
        let client = reqwest::Client::builder().build()?;
        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            model: config.model.clone(),
            dimensions: config.dimensions,
        })
    }
}

#[derive(Deserialize)]
struct EmbeddingsResponse {
    data: Vec<EmbeddingRow>,
}

#[derive(Deserialize)]
struct EmbeddingRow {
    embedding: Vec<f32>,
}

#[async_trait]
impl EmbeddingProvider for HttpEmbeddingProvider {
    fn name(&self) -> &str {
        &self.model
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, ArchiveError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        let url = format!("{}/embeddings", self.base_url);
        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&json!({ "model": self.model, "input": texts }))
            .send()
            .await?
            .error_for_status()?;
        let body: EmbeddingsResponse = response.json().await?;
        if body.data.len() != texts.len() {
            return Err(ArchiveError::Provider(format!(
                "expected {} embeddings, got {}",
                texts.len(),
                body.data.len()
            )));
        }
        Ok(body.data.into_iter().map(|row| row.embedding).collect())
    }
}

/// Deterministic provider for tests and credential-free demos. Identical
/// inputs always produce identical vectors; distinct inputs practically
/// always differ.
#[derive(Debug, Clone)]
pub struct MockEmbeddingProvider {
    dimensions: usize,
}

impl MockEmbeddingProvider {
    pub fn new() -> Self {
        Self { dimensions: 8 }
    }

    pub fn with_dimensions(dimensions: usize) -> Self {
        Self { dimensions }
    }
}

impl Default for MockEmbeddingProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl EmbeddingProvider for MockEmbeddingProvider {
    fn name(&self) -> &str {
        "mock"
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, ArchiveError> {
        Ok(texts
            .iter()
            .map(|text| hash_to_vec(text, self.dimensions))
            .collect())
    }
}

fn hash_to_vec(text: &str, dimensions: usize) -> Vec<f32> {
    use std::collections::hash_map::DefaultHasher;
    use std::hash::{Hash, Hasher};

    let mut hasher = DefaultHasher::new();
    text.hash(&mut hasher);
    let seed = hasher.finish();
    (0..dimensions)
        .map(|i| {
            let bits = seed.rotate_left((i as u32) * 7) ^ ((i as u64) << 17);
            (bits as f32) / (u64::MAX as f32)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn mock_embeddings_are_deterministic() {
        let provider = MockEmbeddingProvider::new();
        let inputs = vec![
            "hello world".to_string(),
            "goodbye world".to_string(),
            "hello world".to_string(),
        ];

        let first = provider.embed_batch(&inputs).await.unwrap();
        let second = provider.embed_batch(&inputs).await.unwrap();

        assert_eq!(first, second);
        assert_eq!(first[0], first[2], "identical text, identical embedding");
        assert_ne!(first[0], first[1], "distinct text, distinct embedding");
        assert!(first.iter().all(|v| v.len() == provider.dimensions()));
    }

    #[tokio::test]
    async fn mock_handles_empty_batch() {
        let provider = MockEmbeddingProvider::with_dimensions(4);
        let vectors = provider.embed_batch(&[]).await.unwrap();
        assert!(vectors.is_empty());
    }
}
