//! archivist: a small knowledge-base service.
//!
//! ```text
//! Upload ──► extract (format dispatch) ──► RawSegment*
//!                                             │
//!                    split (fixed-size, overlapping chunks)
//!                                             │
//! Chunk* ──► ArchiveGateway::write ──► EmbeddingProvider ──► VectorBackend
//!
//! Query ──► retrieve ──► ArchiveGateway::query ──► ranked chunk texts
//! ```
//!
//! Extraction and splitting are pure and stateless; the gateway is the only
//! shared state, built once at startup. When external credentials are
//! missing the gateway runs degraded: ingestion is refused while search
//! stays available with an offline notice.

pub mod config;
pub mod embeddings;
pub mod extract;
pub mod gateway;
pub mod ingest;
pub mod retrieve;
pub mod server;
pub mod split;
pub mod stores;
pub mod types;

pub use extract::{ExtractionStrategy, RawSegment, extract};
pub use gateway::{ArchiveGateway, OFFLINE_SENTINEL};
pub use ingest::{IngestError, IngestStage, ingest_file};
pub use retrieve::retrieve;
pub use split::{Chunk, SplitConfig, split};
pub use types::ArchiveError;
