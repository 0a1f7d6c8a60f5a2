use std::sync::Mutex;

use async_trait::async_trait;

use cortex_core::types::RetrievalChunk;

use crate::{
    error::AdapterError,
    traits::{ChatCompleter, Embedder, MessagingPlatform, SearchIndex},
    types::{CompletionResult, CompletionTurn, OutboundMessage},
};

/// Records every message handed to it. Never fails.
#[derive(Default)]
pub struct FakeMessagingPlatform {
    pub sent: Mutex<Vec<OutboundMessage>>,
}

#[async_trait]
impl MessagingPlatform for FakeMessagingPlatform {
    async fn post_message(&self, msg: &OutboundMessage) -> Result<(), AdapterError> {
        self.sent.lock().unwrap().push(msg.clone());
        Ok(())
    }
}

/// Returns a fixed set of chunks regardless of query, unless configured to fail.
pub struct FakeSearchIndex {
    pub chunks: Vec<RetrievalChunk>,
    pub fail_with: Option<String>,
}

impl FakeSearchIndex {
    pub fn with_chunks(chunks: Vec<RetrievalChunk>) -> Self {
        Self {
            chunks,
            fail_with: None,
        }
    }

    pub fn failing(message: &str) -> Self {
        Self {
            chunks: Vec::new(),
            fail_with: Some(message.to_string()),
        }
    }
}

#[async_trait]
impl SearchIndex for FakeSearchIndex {
    async fn search(
        &self,
        _query_text: &str,
        _query_embedding: &[f32],
        top_k: usize,
    ) -> Result<Vec<RetrievalChunk>, AdapterError> {
        if let Some(msg) = &self.fail_with {
            return Err(AdapterError::ConnectionFailed(msg.clone()));
        }
        Ok(self.chunks.iter().take(top_k).cloned().collect())
    }
}

/// Deterministic embedding: maps each byte of the input to a float. Good
/// enough to exercise the retrieval pipeline without a real model.
pub struct FakeEmbedder;

#[async_trait]
impl Embedder for FakeEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, AdapterError> {
        Ok(text.bytes().map(|b| b as f32 / 255.0).collect())
    }
}

/// Echoes back a canned response, optionally failing a fixed number of
/// times first — lets retry tests exercise the real retry loop.
pub struct FakeChatCompleter {
    pub response: String,
    pub fail_times: Mutex<u32>,
    pub fail_with: AdapterErrorKind,
}

/// The flavor of failure `FakeChatCompleter` should simulate before it
/// starts succeeding.
#[derive(Clone, Copy)]
pub enum AdapterErrorKind {
    Timeout,
    RateLimited,
    Auth,
}

impl FakeChatCompleter {
    pub fn always_succeeds(response: &str) -> Self {
        Self {
            response: response.to_string(),
            fail_times: Mutex::new(0),
            fail_with: AdapterErrorKind::Timeout,
        }
    }

    pub fn fails_then_succeeds(response: &str, times: u32, kind: AdapterErrorKind) -> Self {
        Self {
            response: response.to_string(),
            fail_times: Mutex::new(times),
            fail_with: kind,
        }
    }
}

#[async_trait]
impl ChatCompleter for FakeChatCompleter {
    async fn complete(
        &self,
        turns: &[CompletionTurn],
        _temperature: f32,
    ) -> Result<CompletionResult, AdapterError> {
        let mut remaining = self.fail_times.lock().unwrap();
        if *remaining > 0 {
            *remaining -= 1;
            return Err(match self.fail_with {
                AdapterErrorKind::Timeout => AdapterError::Timeout { ms: 1000 },
                AdapterErrorKind::RateLimited => AdapterError::RateLimited,
                AdapterErrorKind::Auth => AdapterError::AuthFailed("invalid key".to_string()),
            });
        }
        let tokens_in = turns.iter().map(|t| t.content.split_whitespace().count()).sum::<usize>() as u32;
        Ok(CompletionResult {
            content: self.response.clone(),
            tokens_in: Some(tokens_in),
            tokens_out: Some(self.response.split_whitespace().count() as u32),
        })
    }
}
