//! Completion Client (C6) — a concrete OpenAI-compatible `ChatCompleter`
//! (ported from the teacher's `skynet-agent::openai::OpenAiProvider`: same
//! `reqwest::Client`, same bearer-auth + JSON body, same `retry-after`
//! parsing on 429) plus a generic retrying wrapper grounded on
//! `skynet-agent::router::ProviderRouter`'s try/backoff loop, adapted from
//! "try the next provider" to "retry the same provider with exponential
//! backoff and full jitter."

use std::time::Duration;

use async_trait::async_trait;
use rand::Rng;
use serde::Deserialize;
use tracing::{debug, warn};

use cortex_adapters::{AdapterError, ChatCompleter, CompletionResult, CompletionTurn};
use cortex_core::error::{CortexError, FailureClass, Result};

const MAX_RETRIES: u32 = 3;
const BASE_DELAY_MS: u64 = 1_000;
const CAP_DELAY_MS: u64 = 10_000;

/// A single chat-completion call against any OpenAI-compatible HTTP API.
/// Makes exactly one attempt — retry policy lives one layer up in
/// [`RetryingCompleter`].
pub struct OpenAiCompatibleCompleter {
    client: reqwest::Client,
    api_key: String,
    endpoint: String,
    deployment: String,
}

impl OpenAiCompatibleCompleter {
    pub fn new(endpoint: impl Into<String>, api_key: impl Into<String>, deployment: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key: api_key.into(),
            endpoint: endpoint.into(),
            deployment: deployment.into(),
        }
    }
}

#[async_trait]
impl ChatCompleter for OpenAiCompatibleCompleter {
    async fn complete(
        &self,
        turns: &[CompletionTurn],
        temperature: f32,
    ) -> std::result::Result<CompletionResult, AdapterError> {
        let body = serde_json::json!({
            "model": self.deployment,
            "messages": turns,
            "temperature": temperature,
        });

        debug!(deployment = %self.deployment, "sending completion request");

        let resp = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .header("content-type", "application/json")
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
            let retry_after_ms = resp
                .headers()
                .get("retry-after")
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse::<u64>().ok())
                .map(|s| s * 1000)
                .unwrap_or(5_000);
            warn!(retry_after_ms, "completion endpoint rate limited us");
            return Err(AdapterError::RateLimited);
        }
        if status == 401 || status == 403 {
            return Err(AdapterError::AuthFailed(format!("status {status}")));
        }
        if (400..500).contains(&status) {
            let text = resp.text().await.unwrap_or_default();
            return Err(AdapterError::BadRequest(text));
        }
        if !resp.status().is_success() {
            let text = resp.text().await.unwrap_or_default();
            return Err(AdapterError::ConnectionFailed(format!(
                "status {status}: {text}"
            )));
        }

        let parsed: ApiResponse = resp
            .json()
            .await
            .map_err(|e| AdapterError::Other(format!("failed to parse response: {e}")))?;

        let content = parsed
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .unwrap_or_default();

        Ok(CompletionResult {
            content,
            tokens_in: parsed.usage.as_ref().map(|u| u.prompt_tokens),
            tokens_out: parsed.usage.as_ref().map(|u| u.completion_tokens),
        })
    }
}

#[derive(Deserialize)]
struct ApiResponse {
    choices: Vec<ApiChoice>,
    usage: Option<ApiUsage>,
}

#[derive(Deserialize)]
struct ApiChoice {
    message: ApiMessage,
}

#[derive(Deserialize)]
struct ApiMessage {
    content: String,
}

#[derive(Deserialize)]
struct ApiUsage {
    prompt_tokens: u32,
    completion_tokens: u32,
}

/// Wraps any [`ChatCompleter`] with the retry/backoff policy specified in
/// §4.6: transient errors (network, timeout, 429, 5xx) retried up to
/// [`MAX_RETRIES`] times with exponential backoff (base 1s, cap 10s, full
/// jitter); terminal errors (other 4xx, authentication) surface
/// immediately as [`CortexError::CompletionFailed`].
pub struct RetryingCompleter<C: ChatCompleter> {
    inner: C,
}

impl<C: ChatCompleter> RetryingCompleter<C> {
    pub fn new(inner: C) -> Self {
        Self { inner }
    }

    pub async fn complete(&self, turns: &[CompletionTurn], temperature: f32) -> Result<CompletionResult> {
        let mut attempt = 0u32;
        loop {
            match self.inner.complete(turns, temperature).await {
                Ok(result) => return Ok(result),
                Err(err) => {
                    let class = err.failure_class();
                    if !is_transient(class) || attempt >= MAX_RETRIES {
                        return Err(CortexError::CompletionFailed {
                            class,
                            message: err.to_string(),
                        });
                    }
                    let delay = backoff_with_full_jitter(attempt);
                    warn!(
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %err,
                        "completion call failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
            }
        }
    }
}

fn is_transient(class: FailureClass) -> bool {
    matches!(class, FailureClass::RateLimited | FailureClass::Timeout | FailureClass::Unknown)
}

/// Exponential backoff with full jitter: `delay ~ Uniform(0, min(cap, base * 2^attempt))`.
fn backoff_with_full_jitter(attempt: u32) -> Duration {
    let exp = BASE_DELAY_MS.saturating_mul(1u64 << attempt.min(10));
    let bound = exp.min(CAP_DELAY_MS);
    let jittered = rand::thread_rng().gen_range(0..=bound);
    Duration::from_millis(jittered)
}
