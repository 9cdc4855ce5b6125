use crate::error::StoreError;
use crate::models::EmbeddedChunk;
use async_trait::async_trait;

/// Boundary to the chunk store: an opaque keyed insert/delete table with a
/// vector column. The delete-before-insert reset per document is the only
/// consistency boundary the pipeline relies on.
#[async_trait]
pub trait ChunkStore {
    /// Removes every row belonging to `doc_name`. Deleting a document with
    /// no rows is a no-op, not an error. Returns the rows removed.
    async fn delete_by_doc(&self, doc_name: &str) -> Result<u64, StoreError>;

    async fn insert_chunk(&self, row: &EmbeddedChunk) -> Result<(), StoreError>;

    /// `doc_name` of every stored row (one entry per row), for
    /// verification tooling.
    async fn list_doc_names(&self) -> Result<Vec<String>, StoreError>;
}
