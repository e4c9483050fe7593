//! Gateway mediating all calls to the embedding and vector-store
//! collaborators.
//!
//! The gateway is constructed once at process startup and shared behind
//! `Arc`; there is no ambient global state and no runtime reconfiguration.
//! When its external dependencies cannot be initialized it comes up in
//! degraded mode: writes fail fast with [`ArchiveError::StoreUnavailable`]
//! while queries answer with [`OFFLINE_SENTINEL`] so the read path stays
//! available (if uninformative) for health polling.

use std::sync::Arc;

use tracing::{info, warn};

use crate::config::ArchiveConfig;
use crate::embeddings::{EmbeddingProvider, HttpEmbeddingProvider};
use crate::split::Chunk;
use crate::stores::{SqliteVectorStore, StoredRecord, VectorBackend};
use crate::types::ArchiveError;

/// The single result `query` returns instead of an error while degraded.
pub const OFFLINE_SENTINEL: &str = "Archive is offline. Check vector store credentials.";

struct GatewayInner {
    provider: Arc<dyn EmbeddingProvider>,
    backend: Arc<dyn VectorBackend>,
}

/// Shared handle to the external embedding provider and vector store.
#[derive(Clone)]
pub struct ArchiveGateway {
    inner: Option<Arc<GatewayInner>>,
}

impl ArchiveGateway {
    /// Builds the gateway from configuration, degrading instead of failing:
    /// missing embedding credentials or an unopenable store produce an
    /// offline gateway and a warning, never a startup error.
    pub async fn connect(config: &ArchiveConfig) -> Self {
        let Some(embeddings) = &config.embeddings else {
            warn!("embedding credentials missing; archive will not persist");
            return Self::offline();
        };
        let provider = match HttpEmbeddingProvider::new(embeddings) {
            Ok(provider) => provider,
            Err(err) => {
                warn!(error = %err, "failed to initialize embedding provider");
                return Self::offline();
            }
        };
        match SqliteVectorStore::open(&config.database_path).await {
            Ok(store) => {
                info!(
                    path = %config.database_path.display(),
                    model = provider.name(),
                    "vector store ready"
                );
                Self::online(Arc::new(provider), Arc::new(store))
            }
            Err(err) => {
                warn!(error = %err, "failed to open vector store");
                Self::offline()
            }
        }
    }

    /// Assembles a gateway from explicit collaborators.
    pub fn online(provider: Arc<dyn EmbeddingProvider>, backend: Arc<dyn VectorBackend>) -> Self {
        Self {
            inner: Some(Arc::new(GatewayInner { provider, backend })),
        }
    }

    /// A gateway with no external collaborators.
    pub fn offline() -> Self {
        Self { inner: None }
    }

    /// Readiness signal for the health endpoint.
    pub fn is_ready(&self) -> bool {
        self.inner.is_some()
    }

    /// Embeds `chunks` in provider-sized batches, in the order the splitter
    /// produced them, and appends the records to the store. Returns the
    /// number of chunks written.
    ///
    /// Fails with [`ArchiveError::StoreUnavailable`] before any provider
    /// call when the gateway is offline.
    pub async fn write(&self, chunks: Vec<Chunk>) -> Result<usize, ArchiveError> {
        let inner = self.inner.as_ref().ok_or_else(|| {
            ArchiveError::StoreUnavailable(
                "gateway initialized without store or embedding credentials".to_string(),
            )
        })?;

        let batch_size = inner.provider.max_batch().max(1);
        let mut written = 0usize;
        for batch in chunks.chunks(batch_size) {
            let texts: Vec<String> = batch.iter().map(|chunk| chunk.text.clone()).collect();
            let vectors = inner.provider.embed_batch(&texts).await?;
            if vectors.len() != batch.len() {
                return Err(ArchiveError::Provider(format!(
                    "provider returned {} vectors for {} chunks",
                    vectors.len(),
                    batch.len()
                )));
            }
            let records: Vec<StoredRecord> = batch
                .iter()
                .cloned()
                .zip(vectors)
                .map(|(chunk, embedding)| StoredRecord::new(chunk, embedding))
                .collect();
            written += records.len();
            inner.backend.insert_records(records).await?;
        }
        Ok(written)
    }

    /// Embeds `text` and returns up to `k` chunk texts by descending
    /// similarity. Offline gateways answer with the sentinel instead of an
    /// error; this asymmetry with `write` is deliberate.
    pub async fn query(&self, text: &str, k: usize) -> Result<Vec<String>, ArchiveError> {
        let Some(inner) = self.inner.as_ref() else {
            return Ok(vec![OFFLINE_SENTINEL.to_string()]);
        };
        let vectors = inner.provider.embed_batch(&[text.to_string()]).await?;
        let query_embedding = vectors.into_iter().next().ok_or_else(|| {
            ArchiveError::Provider("provider returned no embedding for query".to_string())
        })?;
        let hits = inner.backend.search_similar(&query_embedding, k).await?;
        Ok(hits.into_iter().map(|(record, _score)| record.content).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Records calls and batch sizes; embeds everything as a constant vector.
    struct CountingProvider {
        calls: AtomicUsize,
        max_batch: usize,
    }

    #[async_trait]
    impl EmbeddingProvider for CountingProvider {
        fn name(&self) -> &str {
            "counting"
        }

        fn dimensions(&self) -> usize {
            2
        }

        fn max_batch(&self) -> usize {
            self.max_batch
        }

        async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, ArchiveError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            assert!(texts.len() <= self.max_batch);
            Ok(texts.iter().map(|_| vec![1.0, 0.0]).collect())
        }
    }

    #[derive(Default)]
    struct MemoryBackend {
        records: Mutex<Vec<StoredRecord>>,
    }

    #[async_trait]
    impl VectorBackend for MemoryBackend {
        async fn insert_records(&self, records: Vec<StoredRecord>) -> Result<(), ArchiveError> {
            self.records.lock().unwrap().extend(records);
            Ok(())
        }

        async fn search_similar(
            &self,
            _query_embedding: &[f32],
            top_k: usize,
        ) -> Result<Vec<(StoredRecord, f32)>, ArchiveError> {
            Ok(self
                .records
                .lock()
                .unwrap()
                .iter()
                .take(top_k)
                .map(|record| (record.clone(), 1.0))
                .collect())
        }

        async fn count(&self) -> Result<usize, ArchiveError> {
            Ok(self.records.lock().unwrap().len())
        }
    }

    fn chunk(text: &str, chunk_index: usize) -> Chunk {
        Chunk {
            text: text.to_string(),
            source_id: "doc.txt".to_string(),
            chunk_index,
        }
    }

    #[tokio::test]
    async fn offline_write_fails_with_store_unavailable() {
        let gateway = ArchiveGateway::offline();
        let err = gateway.write(vec![chunk("text", 0)]).await.unwrap_err();
        assert!(matches!(err, ArchiveError::StoreUnavailable(_)));
    }

    #[tokio::test]
    async fn offline_query_returns_single_sentinel() {
        let gateway = ArchiveGateway::offline();
        let results = gateway.query("anything", 5).await.unwrap();
        assert_eq!(results, vec![OFFLINE_SENTINEL.to_string()]);
        assert!(!gateway.is_ready());
    }

    #[tokio::test]
    async fn write_batches_by_provider_limit_and_preserves_order() {
        let provider = Arc::new(CountingProvider {
            calls: AtomicUsize::new(0),
            max_batch: 2,
        });
        let backend = Arc::new(MemoryBackend::default());
        let gateway = ArchiveGateway::online(provider.clone(), backend.clone());

        let chunks: Vec<Chunk> = (0..5).map(|i| chunk(&format!("chunk {i}"), i)).collect();
        let written = gateway.write(chunks).await.unwrap();

        assert_eq!(written, 5);
        assert_eq!(provider.calls.load(Ordering::SeqCst), 3);
        let stored = backend.records.lock().unwrap();
        let contents: Vec<&str> = stored.iter().map(|r| r.content.as_str()).collect();
        assert_eq!(
            contents,
            vec!["chunk 0", "chunk 1", "chunk 2", "chunk 3", "chunk 4"]
        );
    }

    #[tokio::test]
    async fn query_projects_chunk_texts() {
        let provider = Arc::new(CountingProvider {
            calls: AtomicUsize::new(0),
            max_batch: 8,
        });
        let backend = Arc::new(MemoryBackend::default());
        let gateway = ArchiveGateway::online(provider, backend);

        gateway
            .write(vec![chunk("alpha", 0), chunk("beta", 1)])
            .await
            .unwrap();
        let results = gateway.query("alpha", 5).await.unwrap();
        assert_eq!(results, vec!["alpha".to_string(), "beta".to_string()]);
    }
}
