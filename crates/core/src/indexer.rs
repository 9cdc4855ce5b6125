use crate::chunking::{chunk_page, guess_section, normalize_page_text};
use crate::embeddings::Embedder;
use crate::error::{ExtractError, IndexError};
use crate::extractor::{PageText, PdfExtractor};
use crate::models::{
    BatchSummary, Chunk, DocumentReport, EmbeddedChunk, IndexingOptions, SkippedDocument,
};
use crate::store::ChunkStore;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

pub fn discover_pdf_files(folder: &Path) -> Vec<PathBuf> {
    let mut files = Vec::new();

    for entry in WalkDir::new(folder)
        .into_iter()
        .filter_map(|item| item.ok())
    {
        if !entry.file_type().is_file() {
            continue;
        }

        let is_pdf = entry
            .path()
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("pdf"));

        if is_pdf {
            files.push(entry.path().to_path_buf());
        }
    }

    files.sort_unstable();
    files
}

/// Document identifier: the source file stem, extension stripped. Stable
/// across re-indexing runs of the same file.
pub fn resolve_doc_name(path: &Path) -> Result<String, ExtractError> {
    path.file_stem()
        .and_then(|stem| stem.to_str())
        .filter(|stem| !stem.is_empty())
        .map(ToString::to_string)
        .ok_or_else(|| {
            ExtractError::MissingFileName(format!("path missing file name: {}", path.display()))
        })
}

/// Drives one document through extract, chunk, embed, and persist, with all
/// collaborators injected so each stage is testable without PDF or network
/// fixtures.
pub struct Indexer<X, E, S> {
    extractor: X,
    embedder: E,
    store: S,
    options: IndexingOptions,
}

impl<X, E, S> Indexer<X, E, S>
where
    X: PdfExtractor + Send + Sync,
    E: Embedder + Send + Sync,
    S: ChunkStore + Send + Sync,
{
    pub fn new(
        extractor: X,
        embedder: E,
        store: S,
        options: IndexingOptions,
    ) -> Result<Self, ExtractError> {
        options.chunking.validate()?;
        if options.embed_batch_size == 0 {
            return Err(ExtractError::InvalidArgument(
                "embed batch size must be positive".to_string(),
            ));
        }

        Ok(Self {
            extractor,
            embedder,
            store,
            options,
        })
    }

    /// Re-indexes a single document. Existing rows for its `doc_name` are
    /// removed before any new row is written, so no stale chunks from a
    /// previous version coexist with new ones. The source is read first: a
    /// missing or unreadable file must not wipe the previous version.
    pub async fn index_document(&self, path: &Path) -> Result<DocumentReport, IndexError> {
        let doc_name = resolve_doc_name(path)?;

        let pages = self.extractor.extract_pages(path)?;

        let removed = self.store.delete_by_doc(&doc_name).await?;
        if removed > 0 {
            info!(doc = %doc_name, removed, "cleared previous chunks");
        }

        let chunks = self.build_chunks(&doc_name, &pages)?;

        // Empty documents are valid; they just produce nothing.
        if chunks.is_empty() {
            info!(doc = %doc_name, pages = pages.len(), "no indexable text");
            return Ok(DocumentReport {
                doc_name,
                pages: pages.len(),
                chunks_total: 0,
                chunks_indexed: 0,
                failed_rows: 0,
            });
        }

        let mut chunks_indexed = 0usize;
        let mut failed_rows = 0usize;

        // Batches run strictly sequentially: all inserts for one batch
        // complete before the next batch is embedded.
        for batch in chunks.chunks(self.options.embed_batch_size) {
            let texts: Vec<String> = batch.iter().map(|chunk| chunk.content.clone()).collect();
            let embeddings = self.embedder.embed_batch(&texts).await?;

            for (chunk, embedding) in batch.iter().zip(embeddings) {
                let row = EmbeddedChunk {
                    chunk: chunk.clone(),
                    embedding,
                };

                match self.store.insert_chunk(&row).await {
                    Ok(()) => chunks_indexed += 1,
                    Err(error) => {
                        failed_rows += 1;
                        warn!(
                            doc = %doc_name,
                            page = row.chunk.page,
                            sequence = row.chunk.sequence_index,
                            %error,
                            "row insert failed"
                        );
                    }
                }
            }

            debug!(
                doc = %doc_name,
                indexed = chunks_indexed,
                total = chunks.len(),
                "batch persisted"
            );
        }

        Ok(DocumentReport {
            doc_name,
            pages: pages.len(),
            chunks_total: chunks.len(),
            chunks_indexed,
            failed_rows,
        })
    }

    /// Indexes every PDF under `folder`, best effort: a document that fails
    /// is recorded and skipped, the rest of the batch continues.
    pub async fn index_directory(&self, folder: &Path) -> Result<BatchSummary, IndexError> {
        let files = discover_pdf_files(folder);

        if files.is_empty() {
            return Err(ExtractError::InvalidArgument(format!(
                "no pdf files found in {}",
                folder.display()
            ))
            .into());
        }

        let mut summary = BatchSummary::default();

        for path in files {
            match self.index_document(&path).await {
                Ok(report) => {
                    info!(
                        doc = %report.doc_name,
                        chunks = report.chunks_indexed,
                        "document indexed"
                    );
                    summary.reports.push(report);
                }
                Err(error) => {
                    warn!(path = %path.display(), %error, "skipped document");
                    summary.skipped.push(SkippedDocument {
                        path,
                        reason: error.to_string(),
                    });
                }
            }
        }

        Ok(summary)
    }

    fn build_chunks(&self, doc_name: &str, pages: &[PageText]) -> Result<Vec<Chunk>, IndexError> {
        let mut chunks = Vec::new();
        let mut sequence_index = 0u64;

        for page in pages {
            let normalized = normalize_page_text(&page.text).map_err(IndexError::Extract)?;

            for content in chunk_page(&normalized, self.options.chunking) {
                chunks.push(Chunk {
                    doc_name: doc_name.to_string(),
                    section: guess_section(&content),
                    page: page.number,
                    content,
                    sequence_index,
                });
                sequence_index = sequence_index.saturating_add(1);
            }
        }

        Ok(chunks)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{EmbeddingError, StoreError};
    use async_trait::async_trait;
    use std::collections::HashSet;
    use std::sync::{Arc, Mutex};

    #[derive(Default, Clone)]
    struct FakeExtractor {
        pages: Vec<(u32, String)>,
        fail: bool,
    }

    impl PdfExtractor for FakeExtractor {
        fn extract_pages(&self, path: &Path) -> Result<Vec<PageText>, ExtractError> {
            if self.fail {
                return Err(ExtractError::PdfParse(format!(
                    "unreadable pdf: {}",
                    path.display()
                )));
            }

            Ok(self
                .pages
                .iter()
                .map(|(number, text)| PageText {
                    number: *number,
                    text: text.clone(),
                })
                .collect())
        }
    }

    /// Distinguishable deterministic vectors: slot 0 carries the char count.
    #[derive(Default, Clone)]
    struct FakeEmbedder {
        batch_sizes: Arc<Mutex<Vec<usize>>>,
        fail: bool,
    }

    #[async_trait]
    impl Embedder for FakeEmbedder {
        fn dimensions(&self) -> usize {
            2
        }

        async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
            if self.fail {
                return Err(EmbeddingError::Provider {
                    status: 429,
                    details: "quota".to_string(),
                });
            }

            self.batch_sizes.lock().unwrap().push(texts.len());
            Ok(texts
                .iter()
                .map(|text| vec![text.chars().count() as f32, 1.0])
                .collect())
        }
    }

    #[derive(Default, Clone)]
    struct FakeStore {
        rows: Arc<Mutex<Vec<EmbeddedChunk>>>,
        fail_sequences: Arc<HashSet<u64>>,
    }

    #[async_trait]
    impl ChunkStore for FakeStore {
        async fn delete_by_doc(&self, doc_name: &str) -> Result<u64, StoreError> {
            let mut rows = self.rows.lock().unwrap();
            let before = rows.len();
            rows.retain(|row| row.chunk.doc_name != doc_name);
            Ok((before - rows.len()) as u64)
        }

        async fn insert_chunk(&self, row: &EmbeddedChunk) -> Result<(), StoreError> {
            if self.fail_sequences.contains(&row.chunk.sequence_index) {
                return Err(StoreError::WriteFailed("disk full".to_string()));
            }
            self.rows.lock().unwrap().push(row.clone());
            Ok(())
        }

        async fn list_doc_names(&self) -> Result<Vec<String>, StoreError> {
            Ok(self
                .rows
                .lock()
                .unwrap()
                .iter()
                .map(|row| row.chunk.doc_name.clone())
                .collect())
        }
    }

    fn options(target_size: usize, overlap_size: usize, embed_batch_size: usize) -> IndexingOptions {
        IndexingOptions {
            chunking: crate::chunking::ChunkingConfig {
                target_size,
                overlap_size,
            },
            embed_batch_size,
        }
    }

    fn two_page_extractor() -> FakeExtractor {
        FakeExtractor {
            pages: vec![
                (1, format!("{}\n\n{}", "a".repeat(400), "b".repeat(400))),
                (2, "short closing page".to_string()),
            ],
            fail: false,
        }
    }

    #[test]
    fn doc_name_is_the_file_stem() {
        let name = resolve_doc_name(Path::new("/data/submission guide.pdf")).unwrap();
        assert_eq!(name, "submission guide");
        assert!(resolve_doc_name(Path::new("/data/..")).is_err());
    }

    #[tokio::test]
    async fn reindexing_the_same_document_does_not_duplicate_rows() {
        let store = FakeStore::default();
        let indexer = Indexer::new(
            two_page_extractor(),
            FakeEmbedder::default(),
            store.clone(),
            options(500, 100, 64),
        )
        .unwrap();

        let first = indexer.index_document(Path::new("guide.pdf")).await.unwrap();
        let after_first = store.rows.lock().unwrap().len();
        let second = indexer.index_document(Path::new("guide.pdf")).await.unwrap();
        let after_second = store.rows.lock().unwrap().len();

        assert_eq!(first.chunks_indexed, second.chunks_indexed);
        assert_eq!(after_first, after_second);
    }

    #[tokio::test]
    async fn rows_keep_page_order_sequence_and_aligned_vectors() {
        let store = FakeStore::default();
        let indexer = Indexer::new(
            two_page_extractor(),
            FakeEmbedder::default(),
            store.clone(),
            options(500, 100, 64),
        )
        .unwrap();

        indexer.index_document(Path::new("guide.pdf")).await.unwrap();

        let rows = store.rows.lock().unwrap();
        assert!(!rows.is_empty());
        for (position, row) in rows.iter().enumerate() {
            assert_eq!(row.chunk.sequence_index, position as u64);
            assert_eq!(row.chunk.doc_name, "guide");
            // the fake embedder tags each vector with its text length
            assert_eq!(row.embedding[0], row.chunk.content.chars().count() as f32);
            assert_eq!(row.chunk.section, crate::chunking::guess_section(&row.chunk.content));
        }
        assert_eq!(rows.last().unwrap().chunk.page, 2);
    }

    #[tokio::test]
    async fn failed_extraction_leaves_prior_rows_intact() {
        let store = FakeStore::default();

        // previous version of the document is already indexed
        let seeded = Indexer::new(
            two_page_extractor(),
            FakeEmbedder::default(),
            store.clone(),
            options(500, 100, 64),
        )
        .unwrap();
        seeded.index_document(Path::new("guide.pdf")).await.unwrap();
        let before = store.rows.lock().unwrap().len();
        assert!(before > 0);

        let broken = Indexer::new(
            FakeExtractor {
                fail: true,
                ..FakeExtractor::default()
            },
            FakeEmbedder::default(),
            store.clone(),
            options(500, 100, 64),
        )
        .unwrap();

        let result = broken.index_document(Path::new("guide.pdf")).await;

        assert!(matches!(result, Err(IndexError::Extract(_))));
        assert_eq!(store.rows.lock().unwrap().len(), before);
    }

    #[tokio::test]
    async fn empty_document_indexes_zero_chunks_without_error() {
        let store = FakeStore::default();
        let indexer = Indexer::new(
            FakeExtractor::default(),
            FakeEmbedder::default(),
            store.clone(),
            options(500, 100, 64),
        )
        .unwrap();

        let report = indexer.index_document(Path::new("empty.pdf")).await.unwrap();

        assert_eq!(report.chunks_total, 0);
        assert_eq!(report.chunks_indexed, 0);
        assert!(store.rows.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn chunks_are_embedded_in_bounded_sequential_batches() {
        let paragraphs: Vec<String> = (0..5).map(|index| format!("paragraph {index} {}", "x".repeat(450))).collect();
        let extractor = FakeExtractor {
            pages: vec![(1, paragraphs.join("\n\n"))],
            fail: false,
        };
        let embedder = FakeEmbedder::default();
        let indexer = Indexer::new(
            extractor,
            embedder.clone(),
            FakeStore::default(),
            options(500, 100, 2),
        )
        .unwrap();

        let report = indexer.index_document(Path::new("doc.pdf")).await.unwrap();

        // each paragraph is close to the target, so each becomes one chunk
        assert_eq!(report.chunks_total, 5);
        let batch_sizes = embedder.batch_sizes.lock().unwrap().clone();
        assert_eq!(batch_sizes, vec![2, 2, 1]);
    }

    #[tokio::test]
    async fn indexed_count_reflects_persisted_rows_only() {
        let store = FakeStore {
            rows: Arc::new(Mutex::new(Vec::new())),
            fail_sequences: Arc::new(HashSet::from([1u64])),
        };
        let indexer = Indexer::new(
            two_page_extractor(),
            FakeEmbedder::default(),
            store.clone(),
            options(500, 100, 64),
        )
        .unwrap();

        let report = indexer.index_document(Path::new("guide.pdf")).await.unwrap();

        assert_eq!(report.failed_rows, 1);
        assert_eq!(report.chunks_indexed, report.chunks_total - 1);
        assert_eq!(store.rows.lock().unwrap().len(), report.chunks_indexed);
    }

    #[tokio::test]
    async fn embedding_failure_is_surfaced_not_swallowed() {
        let embedder = FakeEmbedder {
            fail: true,
            ..FakeEmbedder::default()
        };
        let indexer = Indexer::new(
            two_page_extractor(),
            embedder,
            FakeStore::default(),
            options(500, 100, 64),
        )
        .unwrap();

        let result = indexer.index_document(Path::new("guide.pdf")).await;
        assert!(matches!(result, Err(IndexError::Embedding(_))));
    }

    #[tokio::test]
    async fn directory_batch_skips_unreadable_documents() -> Result<(), Box<dyn std::error::Error>> {
        use crate::extractor::LopdfExtractor;
        use std::fs;
        use tempfile::tempdir;

        let dir = tempdir()?;
        fs::write(dir.path().join("broken.pdf"), b"%PDF-1.4\n%broken")?;

        let indexer = Indexer::new(
            LopdfExtractor,
            FakeEmbedder::default(),
            FakeStore::default(),
            options(500, 100, 64),
        )
        .unwrap();

        let summary = indexer.index_directory(dir.path()).await?;

        assert_eq!(summary.documents_indexed(), 0);
        assert_eq!(summary.skipped.len(), 1);
        assert_eq!(
            summary.skipped[0].path.file_name().and_then(|name| name.to_str()),
            Some("broken.pdf")
        );
        Ok(())
    }

    #[tokio::test]
    async fn empty_directory_is_an_invalid_argument() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempfile::tempdir()?;
        let indexer = Indexer::new(
            FakeExtractor::default(),
            FakeEmbedder::default(),
            FakeStore::default(),
            options(500, 100, 64),
        )
        .unwrap();

        let result = indexer.index_directory(dir.path()).await;
        assert!(matches!(
            result,
            Err(IndexError::Extract(ExtractError::InvalidArgument(_)))
        ));
        Ok(())
    }

    #[test]
    fn discover_pdf_files_is_recursive_and_sorted() -> Result<(), Box<dyn std::error::Error>> {
        use std::fs;
        let dir = tempfile::tempdir()?;
        let nested = dir.path().join("nested");
        fs::create_dir(&nested)?;
        fs::write(dir.path().join("b.pdf"), b"%PDF")?;
        fs::write(nested.join("a.PDF"), b"%PDF")?;
        fs::write(dir.path().join("notes.txt"), b"not a pdf")?;

        let files = discover_pdf_files(dir.path());
        assert_eq!(files.len(), 2);
        assert!(files.windows(2).all(|pair| pair[0] <= pair[1]));
        Ok(())
    }

    #[test]
    fn degenerate_options_are_rejected_up_front() {
        let bad_chunking = Indexer::new(
            FakeExtractor::default(),
            FakeEmbedder::default(),
            FakeStore::default(),
            options(500, 500, 64),
        );
        assert!(bad_chunking.is_err());

        let bad_batch = Indexer::new(
            FakeExtractor::default(),
            FakeEmbedder::default(),
            FakeStore::default(),
            options(500, 100, 0),
        );
        assert!(bad_batch.is_err());
    }
}
