pub mod chunking;
pub mod embeddings;
pub mod error;
pub mod extractor;
pub mod indexer;
pub mod models;
pub mod store;
pub mod stores;

pub use chunking::{chunk_page, guess_section, normalize_page_text, ChunkingConfig};
pub use embeddings::{
    Embedder, OpenAiEmbedder, DEFAULT_EMBEDDING_DIMENSIONS, DEFAULT_EMBEDDING_MODEL,
    DEFAULT_EMBED_BATCH_LIMIT,
};
pub use error::{EmbeddingError, ExtractError, IndexError, StoreError};
pub use extractor::{LopdfExtractor, PageText, PdfExtractor};
pub use indexer::{discover_pdf_files, resolve_doc_name, Indexer};
pub use models::{
    BatchSummary, Chunk, DocumentReport, EmbeddedChunk, IndexingOptions, SkippedDocument,
};
pub use store::ChunkStore;
pub use stores::{SupabaseStore, DEFAULT_CHUNKS_TABLE};
