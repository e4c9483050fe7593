//! Fixed-size overlapping chunking of extracted segments.
//!
//! Boundaries are greedy: the first chunk is the first `chunk_size`
//! characters of a segment, each subsequent chunk starts
//! `chunk_size - chunk_overlap` characters after the previous chunk's start,
//! and the remainder becomes the final (possibly shorter) chunk. Counting is
//! in characters (Unicode scalar values), never bytes.
//!
//! `split` is a pure function: the same segments and parameters always yield
//! identical chunks.

use serde::{Deserialize, Serialize};

use crate::extract::RawSegment;
use crate::types::ArchiveError;

/// Validated chunking parameters. The constructor enforces
/// `0 <= chunk_overlap < chunk_size`, so the pipeline never sees a
/// non-advancing stride.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SplitConfig {
    chunk_size: usize,
    chunk_overlap: usize,
}

impl SplitConfig {
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Result<Self, ArchiveError> {
        if chunk_size == 0 {
            return Err(ArchiveError::InvalidChunking(
                "chunk_size must be positive".to_string(),
            ));
        }
        if chunk_overlap >= chunk_size {
            return Err(ArchiveError::InvalidChunking(format!(
                "chunk_overlap ({chunk_overlap}) must be smaller than chunk_size ({chunk_size})"
            )));
        }
        Ok(Self {
            chunk_size,
            chunk_overlap,
        })
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    pub fn chunk_overlap(&self) -> usize {
        self.chunk_overlap
    }

    /// Distance between consecutive chunk starts.
    pub fn stride(&self) -> usize {
        self.chunk_size - self.chunk_overlap
    }
}

impl Default for SplitConfig {
    /// 1000-character chunks with a 200-character overlap.
    fn default() -> Self {
        Self {
            chunk_size: 1000,
            chunk_overlap: 200,
        }
    }
}

/// A bounded, overlapping substring of a segment: the unit of embedding and
/// storage. Immutable once produced; ownership flows from the splitter
/// through the orchestrator into the gateway.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    pub text: String,
    pub source_id: String,
    pub chunk_index: usize,
}

/// Splits each segment independently. `chunk_index` starts at 0 within every
/// segment; global ordering across segments is the orchestrator's concern.
pub fn split(segments: &[RawSegment], config: &SplitConfig) -> Vec<Chunk> {
    segments
        .iter()
        .flat_map(|segment| split_segment(segment, config))
        .collect()
}

fn split_segment(segment: &RawSegment, config: &SplitConfig) -> Vec<Chunk> {
    let chars: Vec<char> = segment.text.chars().collect();
    let mut chunks = Vec::new();
    let mut start = 0usize;
    loop {
        let end = usize::min(start + config.chunk_size(), chars.len());
        chunks.push(Chunk {
            text: chars[start..end].iter().collect(),
            source_id: segment.source_id.clone(),
            chunk_index: chunks.len(),
        });
        if end == chars.len() {
            break;
        }
        start += config.stride();
    }
    chunks
}
