//! Shared error taxonomy for the archivist pipeline.

use thiserror::Error;

/// Errors surfaced by the ingestion and retrieval pipeline.
///
/// The first three variants are the core taxonomy: extraction failures are
/// non-retryable without a different input, `StoreUnavailable` is a checked
/// precondition on writes (and degrades reads instead of failing them), and
/// `Provider` covers transient failures from the embedding or vector-store
/// collaborators during otherwise-valid calls. The remaining variants cover
/// storage plumbing, configuration, and IO around the edges.
#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error("extraction failed for '{source_id}': {reason}")]
    Extraction { source_id: String, reason: String },

    #[error("vector store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("embedding provider call failed: {0}")]
    Provider(String),

    #[error("storage error: {0}")]
    Storage(String),

    #[error("invalid chunking parameters: {0}")]
    InvalidChunking(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("io error: {0}")]
    Io(String),
}

impl ArchiveError {
    /// Builds an [`ArchiveError::Extraction`] for the given source file.
    pub fn extraction(source_id: impl Into<String>, reason: impl ToString) -> Self {
        ArchiveError::Extraction {
            source_id: source_id.into(),
            reason: reason.to_string(),
        }
    }
}

impl From<std::io::Error> for ArchiveError {
    fn from(err: std::io::Error) -> Self {
        ArchiveError::Io(err.to_string())
    }
}

impl From<reqwest::Error> for ArchiveError {
    fn from(err: reqwest::Error) -> Self {
        ArchiveError::Provider(err.to_string())
    }
}
