//! Ingestion orchestration: extract, split, embed, store.
//!
//! One call handles one uploaded document. Writes are append-only and not
//! transactional across the pipeline: a failure after partial writes leaves
//! those records in place, and retrying the same file may store duplicates
//! (dedup is an explicit non-goal). The first error wins and is annotated
//! with its originating stage.

use std::path::Path;

use thiserror::Error;
use tracing::info;

use crate::extract;
use crate::gateway::ArchiveGateway;
use crate::split::{SplitConfig, split};
use crate::types::ArchiveError;

/// Pipeline stage in which an ingestion request failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IngestStage {
    Extract,
    Split,
    Store,
}

impl std::fmt::Display for IngestStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            IngestStage::Extract => "extract",
            IngestStage::Split => "split",
            IngestStage::Store => "store",
        };
        f.write_str(label)
    }
}

/// An ingestion failure annotated with its originating stage and source.
#[derive(Debug, Error)]
#[error("ingestion failed at {stage} stage for '{source_id}': {source}")]
pub struct IngestError {
    pub stage: IngestStage,
    pub source_id: String,
    #[source]
    pub source: ArchiveError,
}

/// Runs the full pipeline for one uploaded document and returns the total
/// number of chunks written.
///
/// The caller owns the on-disk file at `path` for the duration of the call
/// and releases it after return; no reference to it is retained here.
/// Extraction runs on the blocking pool since the format parsers are
/// synchronous; the store and embedding calls are the only suspension
/// points.
pub async fn ingest_file(
    gateway: &ArchiveGateway,
    config: &SplitConfig,
    path: &Path,
    original_filename: &str,
) -> Result<usize, IngestError> {
    let fail = |stage: IngestStage, source: ArchiveError| IngestError {
        stage,
        source_id: original_filename.to_string(),
        source,
    };

    let owned_path = path.to_path_buf();
    let owned_name = original_filename.to_string();
    let segments = tokio::task::spawn_blocking(move || extract::extract(&owned_path, &owned_name))
        .await
        .map_err(|err| {
            fail(
                IngestStage::Extract,
                ArchiveError::Io(format!("extraction task failed: {err}")),
            )
        })?
        .map_err(|err| fail(IngestStage::Extract, err))?;

    let chunks = split(&segments, config);
    info!(
        file = original_filename,
        segments = segments.len(),
        chunks = chunks.len(),
        "split document"
    );

    let written = gateway
        .write(chunks)
        .await
        .map_err(|err| fail(IngestStage::Store, err))?;

    info!(file = original_filename, chunks = written, "stored document");
    Ok(written)
}
