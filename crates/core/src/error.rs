use thiserror::Error;

#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("pdf parse error: {0}")]
    PdfParse(String),

    #[error("regex error: {0}")]
    Regex(#[from] regex::Error),

    #[error("path has no file name: {0}")]
    MissingFileName(String),

    #[error("invalid chunking config: {0}")]
    InvalidChunkConfig(String),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),
}

#[derive(Debug, Error)]
pub enum EmbeddingError {
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("embedding provider returned {status}: {details}")]
    Provider { status: u16, details: String },

    #[error("provider returned {returned} embeddings for {requested} inputs")]
    CountMismatch { requested: usize, returned: usize },

    #[error("batch of {got} exceeds provider limit {limit}")]
    BatchTooLarge { got: usize, limit: usize },
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("url parse error: {0}")]
    Url(#[from] url::ParseError),

    #[error("invalid response from {backend}: {details}")]
    BackendResponse { backend: String, details: String },

    #[error("row insert failed: {0}")]
    WriteFailed(String),
}

/// Umbrella error for the per-document pipeline.
#[derive(Debug, Error)]
pub enum IndexError {
    #[error(transparent)]
    Extract(#[from] ExtractError),

    #[error(transparent)]
    Embedding(#[from] EmbeddingError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

pub type Result<T, E = IndexError> = std::result::Result<T, E>;
