use crate::error::EmbeddingError;
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

pub const DEFAULT_EMBEDDING_MODEL: &str = "text-embedding-3-small";
pub const DEFAULT_EMBEDDING_DIMENSIONS: usize = 1536;
pub const DEFAULT_EMBED_BATCH_LIMIT: usize = 64;
const DEFAULT_MAX_RETRIES: usize = 3;

/// Boundary to the embedding service. Returned vectors are index-aligned
/// with the input texts; the indexer relies on that alignment to reattach
/// page and section metadata.
#[async_trait]
pub trait Embedder {
    fn dimensions(&self) -> usize;

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError>;
}

/// Client for OpenAI-compatible `/embeddings` endpoints.
///
/// Transient faults (429, 5xx, transport errors) are retried with bounded
/// exponential backoff before the failure is surfaced.
pub struct OpenAiEmbedder {
    client: Client,
    endpoint: String,
    api_key: String,
    model: String,
    dimensions: usize,
    batch_limit: usize,
    max_retries: usize,
}

impl OpenAiEmbedder {
    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        model: impl Into<String>,
        dimensions: usize,
    ) -> Self {
        let base_url = base_url.into();
        Self {
            client: Client::new(),
            endpoint: format!("{}/embeddings", base_url.trim_end_matches('/')),
            api_key: api_key.into(),
            model: model.into(),
            dimensions,
            batch_limit: DEFAULT_EMBED_BATCH_LIMIT,
            max_retries: DEFAULT_MAX_RETRIES,
        }
    }

    pub fn with_batch_limit(mut self, batch_limit: usize) -> Self {
        self.batch_limit = batch_limit.max(1);
        self
    }

    pub fn with_max_retries(mut self, max_retries: usize) -> Self {
        self.max_retries = max_retries.max(1);
        self
    }

    pub fn batch_limit(&self) -> usize {
        self.batch_limit
    }

    async fn request_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        let mut attempt = 0usize;
        loop {
            let request = EmbeddingRequest {
                model: &self.model,
                input: texts,
                dimensions: self.dimensions,
            };

            let response = self
                .client
                .post(&self.endpoint)
                .bearer_auth(&self.api_key)
                .json(&request)
                .send()
                .await;

            match response {
                Ok(response) => {
                    let status = response.status();
                    if status.is_success() {
                        let mut parsed: EmbeddingResponse = response.json().await?;
                        // Providers may return entries out of order.
                        parsed.data.sort_by_key(|entry| entry.index);
                        if parsed.data.len() != texts.len() {
                            return Err(EmbeddingError::CountMismatch {
                                requested: texts.len(),
                                returned: parsed.data.len(),
                            });
                        }
                        return Ok(parsed
                            .data
                            .into_iter()
                            .map(|entry| entry.embedding)
                            .collect());
                    }

                    let details = response.text().await.unwrap_or_default();
                    if is_retryable_status(status) && attempt + 1 < self.max_retries {
                        attempt += 1;
                        debug!(attempt, %status, "retrying embedding request");
                        tokio::time::sleep(retry_backoff(attempt)).await;
                        continue;
                    }
                    return Err(EmbeddingError::Provider {
                        status: status.as_u16(),
                        details,
                    });
                }
                Err(error) => {
                    let retryable =
                        error.is_timeout() || error.is_connect() || error.is_request();
                    if retryable && attempt + 1 < self.max_retries {
                        attempt += 1;
                        debug!(attempt, %error, "retrying embedding request");
                        tokio::time::sleep(retry_backoff(attempt)).await;
                        continue;
                    }
                    return Err(error.into());
                }
            }
        }
    }
}

#[async_trait]
impl Embedder for OpenAiEmbedder {
    fn dimensions(&self) -> usize {
        self.dimensions
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        if texts.len() > self.batch_limit {
            return Err(EmbeddingError::BatchTooLarge {
                got: texts.len(),
                limit: self.batch_limit,
            });
        }

        self.request_batch(texts).await
    }
}

fn is_retryable_status(status: StatusCode) -> bool {
    status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
}

fn retry_backoff(attempt: usize) -> Duration {
    let capped = attempt.min(5) as u32;
    Duration::from_millis(250 * (1 << capped))
}

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a [String],
    dimensions: usize,
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingEntry>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingEntry {
    embedding: Vec<f32>,
    index: usize,
}
