use crate::error::StoreError;
use crate::models::EmbeddedChunk;
use crate::store::ChunkStore;
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder};
use serde::Deserialize;
use serde_json::{json, Value};
use url::Url;

pub const DEFAULT_CHUNKS_TABLE: &str = "rag_chunks";

/// PostgREST client for a Supabase chunks table.
pub struct SupabaseStore {
    client: Client,
    rows_endpoint: Url,
    service_role_key: String,
}

impl SupabaseStore {
    pub fn new(
        base_url: &str,
        service_role_key: impl Into<String>,
        table: &str,
    ) -> Result<Self, StoreError> {
        let base = base_url.trim_end_matches('/');
        let rows_endpoint = Url::parse(&format!("{base}/rest/v1/{table}"))?;

        Ok(Self {
            client: Client::new(),
            rows_endpoint,
            service_role_key: service_role_key.into(),
        })
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        request
            .header("apikey", &self.service_role_key)
            .bearer_auth(&self.service_role_key)
    }
}

#[async_trait]
impl ChunkStore for SupabaseStore {
    async fn delete_by_doc(&self, doc_name: &str) -> Result<u64, StoreError> {
        let request = self
            .client
            .delete(self.rows_endpoint.clone())
            .query(&[("doc_name", format!("eq.{doc_name}"))])
            .header("Prefer", "count=exact");

        let response = self.authorize(request).send().await?;

        if !response.status().is_success() {
            return Err(StoreError::BackendResponse {
                backend: "supabase".to_string(),
                details: response.status().to_string(),
            });
        }

        let deleted = response
            .headers()
            .get("content-range")
            .and_then(|value| value.to_str().ok())
            .and_then(content_range_total)
            .unwrap_or(0);

        Ok(deleted)
    }

    async fn insert_chunk(&self, row: &EmbeddedChunk) -> Result<(), StoreError> {
        let request = self
            .client
            .post(self.rows_endpoint.clone())
            .header("Prefer", "return=minimal")
            .json(&row_body(row));

        let response = self.authorize(request).send().await?;

        let status = response.status();
        if !status.is_success() {
            let details = response.text().await.unwrap_or_default();
            return Err(StoreError::WriteFailed(format!("{status}: {details}")));
        }

        Ok(())
    }

    async fn list_doc_names(&self) -> Result<Vec<String>, StoreError> {
        let request = self
            .client
            .get(self.rows_endpoint.clone())
            .query(&[("select", "doc_name")]);

        let response = self.authorize(request).send().await?;

        if !response.status().is_success() {
            return Err(StoreError::BackendResponse {
                backend: "supabase".to_string(),
                details: response.status().to_string(),
            });
        }

        let rows: Vec<DocNameRow> = response.json().await?;
        Ok(rows.into_iter().map(|row| row.doc_name).collect())
    }
}

/// Durable row contract other systems depend on. Field names and types must
/// not change without a migration.
fn row_body(row: &EmbeddedChunk) -> Value {
    json!({
        "doc_name": row.chunk.doc_name,
        "section": row.chunk.section,
        "page": row.chunk.page,
        "content": row.chunk.content,
        "embedding": row.embedding,
    })
}

/// Total from a PostgREST `Content-Range` header, e.g. `0-24/25` or `*/0`.
fn content_range_total(value: &str) -> Option<u64> {
    value.rsplit('/').next()?.trim().parse().ok()
}

#[derive(Debug, Deserialize)]
struct DocNameRow {
    doc_name: String,
}
