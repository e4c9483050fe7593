//! Vector storage backends.
//!
//! [`VectorBackend`] abstracts the external vector store behind an async
//! trait so the gateway and tests can work against any implementation.
//! Records are append-only: created on ingest, never updated, deleted only by
//! administrative action outside this service.

pub mod sqlite;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::split::Chunk;
use crate::types::ArchiveError;

pub use sqlite::SqliteVectorStore;

/// The durable persisted form of one chunk: text, vector, and source
/// identity. One row per chunk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredRecord {
    pub id: String,
    pub source_id: String,
    pub chunk_index: usize,
    pub content: String,
    /// Populated on the write path. Backends are not required to rehydrate
    /// it on reads; search results may carry an empty vector.
    pub embedding: Vec<f32>,
}

impl StoredRecord {
    /// Pairs a chunk with its embedding under a fresh id.
    pub fn new(chunk: Chunk, embedding: Vec<f32>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            source_id: chunk.source_id,
            chunk_index: chunk.chunk_index,
            content: chunk.text,
            embedding,
        }
    }
}

/// Uniform interface over vector store implementations.
#[async_trait]
pub trait VectorBackend: Send + Sync {
    /// Appends records to the store. Records are never updated in place.
    async fn insert_records(&self, records: Vec<StoredRecord>) -> Result<(), ArchiveError>;

    /// Returns up to `top_k` records ordered by descending cosine similarity
    /// to `query_embedding`. Equal scores resolve in insertion order.
    async fn search_similar(
        &self,
        query_embedding: &[f32],
        top_k: usize,
    ) -> Result<Vec<(StoredRecord, f32)>, ArchiveError>;

    /// Total number of records in the store.
    async fn count(&self) -> Result<usize, ArchiveError>;
}
