//! Retrieval orchestration.
//!
//! A thin forward to [`ArchiveGateway::query`] with limit hygiene. No
//! retries: a transient provider failure surfaces to the caller immediately;
//! retry policy, if wanted, belongs to the transport layer.

use crate::gateway::ArchiveGateway;
use crate::types::ArchiveError;

/// Result count used when the caller sends a non-positive limit.
pub const DEFAULT_LIMIT: usize = 5;

/// Upper bound on results per query.
pub const MAX_LIMIT: usize = 50;

/// Returns up to `limit` chunk texts ranked by similarity to `query`.
/// Non-positive limits coerce to [`DEFAULT_LIMIT`]; oversized limits cap at
/// [`MAX_LIMIT`].
pub async fn retrieve(
    gateway: &ArchiveGateway,
    query: &str,
    limit: i64,
) -> Result<Vec<String>, ArchiveError> {
    gateway.query(query, clamp_limit(limit)).await
}

fn clamp_limit(limit: i64) -> usize {
    if limit <= 0 {
        DEFAULT_LIMIT
    } else {
        usize::min(limit as usize, MAX_LIMIT)
    }
}
