//! HTTP-backed [`SearchIndex`] against the hybrid search contract in §6:
//! a single POST carrying both a lexical `search_text` and a
//! `vector_queries` entry, requesting `top` results with an optional
//! `filter` and `semantic_configuration_name`. Grounded on the same
//! `reqwest::Client` + bearer/`api-key` header shape as
//! [`crate::http_completion::OpenAiCompatibleCompleter`] — this corpus's
//! one existing HTTP adapter — generalized from chat completion to a
//! search query/response pair.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;

use cortex_core::types::RetrievalChunk;

use crate::error::AdapterError;
use crate::traits::SearchIndex;

pub struct HttpSearchIndex {
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
    index_name: String,
}

impl HttpSearchIndex {
    pub fn new(endpoint: impl Into<String>, api_key: impl Into<String>, index_name: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: endpoint.into(),
            api_key: api_key.into(),
            index_name: index_name.into(),
        }
    }
}

#[async_trait]
impl SearchIndex for HttpSearchIndex {
    async fn search(
        &self,
        query_text: &str,
        query_embedding: &[f32],
        top_k: usize,
    ) -> Result<Vec<RetrievalChunk>, AdapterError> {
        let url = format!(
            "{}/indexes/{}/docs/search",
            self.endpoint.trim_end_matches('/'),
            self.index_name
        );

        let body = json!({
            "search_text": query_text,
            "vector_queries": [{
                "kind": "vector",
                "fields": ["embedding"],
                "k": top_k,
                "vector": query_embedding,
            }],
            "select": ["id", "document_id", "content", "metadata", "chunk_index"],
            "top": top_k,
        });

        let resp = self
            .client
            .post(&url)
            .header("api-key", &self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    AdapterError::Timeout { ms: 10_000 }
                } else {
                    AdapterError::ConnectionFailed(e.to_string())
                }
            })?;

        let status = resp.status().as_u16();
        if status == 429 {
            return Err(AdapterError::RateLimited);
        }
        if status == 401 || status == 403 {
            return Err(AdapterError::AuthFailed(format!("status {status}")));
        }
        if !resp.status().is_success() {
            let text = resp.text().await.unwrap_or_default();
            return Err(AdapterError::ConnectionFailed(format!("status {status}: {text}")));
        }

        let parsed: SearchResponse = resp
            .json()
            .await
            .map_err(|e| AdapterError::Other(format!("failed to parse search response: {e}")))?;

        Ok(parsed.value.into_iter().map(SearchDocument::into_chunk).collect())
    }
}

#[derive(Deserialize)]
struct SearchResponse {
    #[serde(default)]
    value: Vec<SearchDocument>,
}

#[derive(Deserialize)]
struct SearchDocument {
    id: String,
    #[serde(default)]
    document_id: Option<String>,
    #[serde(default)]
    content: String,
    #[serde(default)]
    chunk_index: u32,
    #[serde(default)]
    metadata: serde_json::Value,
    #[serde(rename = "@search.score", default)]
    search_score: f32,
    #[serde(rename = "@search.reranker_score", default)]
    reranker_score: Option<f32>,
    #[serde(rename = "@search.highlights", default)]
    highlights: Option<serde_json::Value>,
}

impl SearchDocument {
    fn into_chunk(self) -> RetrievalChunk {
        let metadata = self
            .metadata
            .as_object()
            .cloned()
            .map(|m| m.into_iter().collect())
            .unwrap_or_default();

        let page = self
            .metadata
            .get("page")
            .and_then(|v| v.as_u64())
            .map(|v| v as u32);

        let highlights = self
            .highlights
            .and_then(|v| v.as_array().cloned())
            .map(|arr| arr.into_iter().filter_map(|v| v.as_str().map(String::from)).collect())
            .unwrap_or_default();

        RetrievalChunk {
            document_id: self.document_id.unwrap_or(self.id),
            chunk_index: self.chunk_index,
            content: self.content,
            citation: String::new(),
            page,
            score: self.search_score,
            reranker_score: self.reranker_score,
            highlights,
            metadata,
        }
    }
}
