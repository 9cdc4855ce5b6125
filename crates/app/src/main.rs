use anyhow::Context;
use chrono::Utc;
use clap::{Parser, Subcommand};
use pdf_rag_core::{
    ChunkStore, ChunkingConfig, Indexer, IndexingOptions, LopdfExtractor, OpenAiEmbedder,
    SupabaseStore, DEFAULT_CHUNKS_TABLE, DEFAULT_EMBEDDING_DIMENSIONS, DEFAULT_EMBEDDING_MODEL,
    DEFAULT_EMBED_BATCH_LIMIT,
};
use std::collections::BTreeMap;
use std::path::Path;
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "pdf-rag-indexer", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Supabase project URL
    #[arg(long, env = "SUPABASE_URL")]
    supabase_url: String,

    /// Supabase service-role key (server-side only)
    #[arg(long, env = "SUPABASE_SERVICE_ROLE", hide_env_values = true)]
    supabase_service_role: String,

    /// OpenAI API key, required for indexing
    #[arg(long, env = "OPENAI_API_KEY", hide_env_values = true)]
    openai_api_key: Option<String>,

    /// OpenAI-compatible API base URL
    #[arg(long, env = "OPENAI_BASE_URL", default_value = "https://api.openai.com/v1")]
    openai_base_url: String,

    /// Embedding model
    #[arg(long, default_value = DEFAULT_EMBEDDING_MODEL)]
    embedding_model: String,

    /// Embedding dimensions; must match the store's vector column
    #[arg(long, default_value_t = DEFAULT_EMBEDDING_DIMENSIONS)]
    embedding_dimensions: usize,

    /// Table holding the chunk rows
    #[arg(long, default_value = DEFAULT_CHUNKS_TABLE)]
    table: String,

    /// Chunk target size, in characters
    #[arg(long, default_value_t = 900)]
    target_size: usize,

    /// Overlap carried across chunk boundaries, in characters
    #[arg(long, default_value_t = 150)]
    overlap_size: usize,

    /// Texts per embedding call
    #[arg(long, default_value_t = DEFAULT_EMBED_BATCH_LIMIT)]
    batch_size: usize,
}

#[derive(Subcommand)]
enum Command {
    /// Chunk, embed, and index a PDF file or a directory of PDFs.
    Index {
        /// PDF file, or a directory searched recursively.
        #[arg(long)]
        path: String,
    },
    /// Show chunk counts per indexed document.
    Status,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env())
        .with(fmt::layer())
        .init();

    let cli = Cli::parse();

    let store = SupabaseStore::new(&cli.supabase_url, &cli.supabase_service_role, &cli.table)?;

    info!(
        version = env!("CARGO_PKG_VERSION"),
        started_at = %Utc::now().to_rfc3339(),
        "pdf-rag-indexer boot"
    );

    match cli.command {
        Command::Index { path } => {
            let api_key = cli
                .openai_api_key
                .context("OPENAI_API_KEY is not set")?;

            let embedder = OpenAiEmbedder::new(
                cli.openai_base_url.as_str(),
                api_key,
                cli.embedding_model.as_str(),
                cli.embedding_dimensions,
            )
            .with_batch_limit(cli.batch_size);

            let options = IndexingOptions {
                chunking: ChunkingConfig {
                    target_size: cli.target_size,
                    overlap_size: cli.overlap_size,
                },
                embed_batch_size: cli.batch_size,
            };

            let indexer = Indexer::new(LopdfExtractor, embedder, store, options)?;
            let target = Path::new(&path);

            if target.is_dir() {
                let summary = indexer.index_directory(target).await?;

                for report in &summary.reports {
                    println!(
                        "{}: {} chunks indexed ({} pages)",
                        report.doc_name, report.chunks_indexed, report.pages
                    );
                    if report.failed_rows > 0 {
                        warn!(
                            doc = %report.doc_name,
                            failed_rows = report.failed_rows,
                            "some rows were not persisted"
                        );
                    }
                }
                for skipped in &summary.skipped {
                    warn!(
                        path = %skipped.path.display(),
                        reason = %skipped.reason,
                        "skipped document"
                    );
                }

                println!(
                    "{} documents, {} chunks indexed at {}",
                    summary.documents_indexed(),
                    summary.chunks_indexed(),
                    Utc::now().to_rfc3339()
                );
            } else {
                let report = indexer.index_document(target).await?;
                if report.failed_rows > 0 {
                    warn!(
                        doc = %report.doc_name,
                        failed_rows = report.failed_rows,
                        "some rows were not persisted"
                    );
                }
                println!(
                    "{} chunks indexed as '{}' at {}",
                    report.chunks_indexed,
                    report.doc_name,
                    Utc::now().to_rfc3339()
                );
            }
        }
        Command::Status => {
            let names = store.list_doc_names().await?;

            if names.is_empty() {
                println!("no chunks indexed yet");
                return Ok(());
            }

            let mut counts = BTreeMap::<String, usize>::new();
            for name in names {
                *counts.entry(name).or_insert(0) += 1;
            }

            println!("total chunks: {}", counts.values().sum::<usize>());
            for (doc_name, count) in counts {
                println!("  {doc_name}: {count} chunks");
            }
        }
    }

    Ok(())
}
