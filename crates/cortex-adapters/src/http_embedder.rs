//! HTTP-backed [`Embedder`] — one call per query, same `reqwest::Client` +
//! bearer-auth shape as the completion client, generalized from "chat
//! completion" to "embedding vector."

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;

use crate::error::AdapterError;
use crate::traits::Embedder;

pub struct HttpEmbedder {
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
    deployment: String,
}

impl HttpEmbedder {
    pub fn new(endpoint: impl Into<String>, api_key: impl Into<String>, deployment: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: endpoint.into(),
            api_key: api_key.into(),
            deployment: deployment.into(),
        }
    }
}

#[async_trait]
impl Embedder for HttpEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, AdapterError> {
        let body = json!({
            "model": self.deployment,
            "input": text,
        });

        let resp = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
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

        let parsed: EmbeddingResponse = resp
            .json()
            .await
            .map_err(|e| AdapterError::Other(format!("failed to parse embedding response: {e}")))?;

        parsed
            .data
            .into_iter()
            .next()
            .map(|d| d.embedding)
            .ok_or_else(|| AdapterError::Other("embedding response carried no vectors".to_string()))
    }
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingDatum>,
}

#[derive(Deserialize)]
struct EmbeddingDatum {
    embedding: Vec<f32>,
}
