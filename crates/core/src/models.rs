use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// One passage of a document, ready for embedding. Maps to exactly one
/// store row once embedded.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Chunk {
    /// Stable document identifier: source file stem, extension stripped.
    pub doc_name: String,
    /// Heuristic display label, not an identifier.
    pub section: String,
    pub page: u32,
    pub content: String,
    /// Position within the whole document, for deterministic ordering.
    pub sequence_index: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddedChunk {
    pub chunk: Chunk,
    pub embedding: Vec<f32>,
}

#[derive(Debug, Clone, Copy)]
pub struct IndexingOptions {
    pub chunking: crate::chunking::ChunkingConfig,
    /// Upper bound on texts per embedding call.
    pub embed_batch_size: usize,
}

impl Default for IndexingOptions {
    fn default() -> Self {
        Self {
            chunking: crate::chunking::ChunkingConfig::default(),
            embed_batch_size: 64,
        }
    }
}

/// Outcome of indexing a single document.
#[derive(Debug, Clone)]
pub struct DocumentReport {
    pub doc_name: String,
    pub pages: usize,
    pub chunks_total: usize,
    /// Rows actually persisted, never the attempted count.
    pub chunks_indexed: usize,
    pub failed_rows: usize,
}

#[derive(Debug)]
pub struct SkippedDocument {
    pub path: PathBuf,
    pub reason: String,
}

/// Summary of a directory run.
#[derive(Debug, Default)]
pub struct BatchSummary {
    pub reports: Vec<DocumentReport>,
    pub skipped: Vec<SkippedDocument>,
}

impl BatchSummary {
    pub fn documents_indexed(&self) -> usize {
        self.reports.len()
    }

    pub fn chunks_indexed(&self) -> usize {
        self.reports.iter().map(|report| report.chunks_indexed).sum()
    }
}
