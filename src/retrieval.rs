//! HTTP retrieval backend for Albert-style (OpenAI-flavoured) RAG APIs.
//!
//! | Operation | Request | Success |
//! |-----------|---------|---------|
//! | list | `GET /collections?offset&limit` | 200 `{"data":[{"id","name"}]}` |
//! | create | `POST /collections` `{name, model}` | 201 `{"id"}` |
//! | delete | `DELETE /collections/{id}` | 204 |
//! | upload | `POST /files` multipart `file` + `request` | 201 |
//! | search | `POST /search` `{collections, k, prompt, method, score_threshold}` | 200 |
//!
//! Any other status is a [`ChatError::RetrievalBackend`]. Collection and
//! chunk ids come back as integers from some deployments and strings from
//! others; both are accepted, and collection ids are sent back with the
//! JSON type they arrived with.

use std::path::Path;
use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use rag_chat_core::error::{ChatError, Result};
use rag_chat_core::retrieval::RetrievalBackend;
use rag_chat_core::{CollectionId, CollectionSummary, RetrievedChunk};
use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::config::{api_key_from_env, RetrievalConfig};
use crate::extract::content_type_for;

pub struct AlbertBackend {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
}

#[derive(Deserialize)]
struct DataList<T> {
    data: Vec<T>,
}

#[derive(Deserialize)]
struct CollectionRow {
    id: CollectionId,
    name: String,
}

#[derive(Deserialize)]
struct Created {
    id: CollectionId,
}

#[derive(Deserialize)]
struct SearchHit {
    score: f64,
    chunk: ChunkBody,
}

#[derive(Deserialize)]
struct ChunkBody {
    id: Value,
    content: String,
    #[serde(default)]
    metadata: ChunkMetadata,
}

#[derive(Deserialize, Default)]
struct ChunkMetadata {
    #[serde(default)]
    document_name: String,
}

fn retrieval_err(e: impl std::fmt::Display) -> ChatError {
    ChatError::RetrievalBackend(e.to_string())
}

/// Textual form of an id that may be a JSON number or string.
fn id_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

impl AlbertBackend {
    pub fn new(base_url: &str, api_key: Option<String>, timeout: Duration) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
        })
    }

    pub fn from_config(config: &RetrievalConfig) -> anyhow::Result<Self> {
        let api_key = api_key_from_env(&config.api_key_env);
        if api_key.is_none() {
            tracing::warn!(var = %config.api_key_env, "retrieval API key not set");
        }
        Self::new(&config.base_url, api_key, config.timeout())
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn authorized(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.api_key {
            Some(key) => request.bearer_auth(key),
            None => request,
        }
    }

    /// Send and require `expected`; the body of any other response is
    /// included in the error.
    async fn send(
        &self,
        request: reqwest::RequestBuilder,
        expected: StatusCode,
        what: &str,
    ) -> Result<reqwest::Response> {
        let response = self
            .authorized(request)
            .send()
            .await
            .map_err(|e| retrieval_err(format!("{what}: {e}")))?;
        let status = response.status();
        if status != expected {
            let body = response.text().await.unwrap_or_default();
            return Err(retrieval_err(format!("{what} returned {status}: {body}")));
        }
        Ok(response)
    }
}

#[async_trait]
impl RetrievalBackend for AlbertBackend {
    async fn list_collections(&self, offset: usize, limit: usize) -> Result<Vec<CollectionSummary>> {
        let request = self
            .client
            .get(self.url("/collections"))
            .query(&[("offset", offset), ("limit", limit)]);
        let response = self.send(request, StatusCode::OK, "list collections").await?;
        let page: DataList<CollectionRow> = response.json().await.map_err(retrieval_err)?;
        Ok(page
            .data
            .into_iter()
            .map(|row| CollectionSummary {
                id: row.id,
                name: row.name,
            })
            .collect())
    }

    async fn create_collection(&self, name: &str, embedding_model: &str) -> Result<CollectionId> {
        let request = self
            .client
            .post(self.url("/collections"))
            .json(&json!({ "name": name, "model": embedding_model }));
        let response = self
            .send(request, StatusCode::CREATED, "create collection")
            .await?;
        let created: Created = response.json().await.map_err(retrieval_err)?;
        Ok(created.id)
    }

    async fn delete_collection(&self, id: &CollectionId) -> Result<()> {
        let request = self.client.delete(self.url(&format!("/collections/{id}")));
        self.send(request, StatusCode::NO_CONTENT, "delete collection")
            .await?;
        Ok(())
    }

    async fn upload_document(&self, collection: &CollectionId, path: &Path, name: &str) -> Result<()> {
        let bytes = tokio::fs::read(path)
            .await
            .map_err(|e| retrieval_err(format!("{}: {e}", path.display())))?;
        let mime = content_type_for(path).unwrap_or("application/octet-stream");

        let part = reqwest::multipart::Part::bytes(bytes)
            .file_name(name.to_string())
            .mime_str(mime)
            .map_err(retrieval_err)?;
        let form = reqwest::multipart::Form::new()
            .part("file", part)
            .text("request", json!({ "collection": collection }).to_string());

        let request = self.client.post(self.url("/files")).multipart(form);
        self.send(request, StatusCode::CREATED, "upload document")
            .await?;
        Ok(())
    }

    async fn semantic_search(
        &self,
        collections: &[CollectionId],
        query: &str,
        k: usize,
        score_threshold: f64,
    ) -> Result<Vec<RetrievedChunk>> {
        let body = json!({
            "collections": collections,
            "k": k,
            "prompt": query,
            "method": "semantic",
            "score_threshold": score_threshold,
        });
        let request = self.client.post(self.url("/search")).json(&body);
        let response = self.send(request, StatusCode::OK, "search").await?;
        let hits: DataList<SearchHit> = response.json().await.map_err(retrieval_err)?;
        Ok(hits
            .data
            .into_iter()
            .map(|hit| RetrievedChunk {
                source_document: hit.chunk.metadata.document_name,
                chunk_id: id_text(&hit.chunk.id),
                content: hit.chunk.content,
                relevance_score: hit.score,
            })
            .collect())
    }
}
