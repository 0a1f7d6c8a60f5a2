use async_trait::async_trait;

use cortex_core::types::RetrievalChunk;

use crate::{
    error::AdapterError,
    types::{CompletionResult, CompletionTurn, OutboundMessage},
};

/// The external messaging platform this gateway answers on behalf of.
///
/// A single implementation is registered per deployment; which platform it
/// is (Slack-shaped, Teams-shaped, a bespoke webchat) is invisible above
/// this trait.
#[async_trait]
pub trait MessagingPlatform: Send + Sync {
    /// Deliver a single outbound message.
    async fn post_message(&self, msg: &OutboundMessage) -> Result<(), AdapterError>;
}

/// The search index backing retrieval (C4). Returns chunks already scored
/// and ordered by relevance, highest first.
#[async_trait]
pub trait SearchIndex: Send + Sync {
    async fn search(
        &self,
        query_text: &str,
        query_embedding: &[f32],
        top_k: usize,
    ) -> Result<Vec<RetrievalChunk>, AdapterError>;
}

/// Turns text into a vector for the search index.
#[async_trait]
pub trait Embedder: Send + Sync {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, AdapterError>;
}

/// A single call to a hosted chat-completion model. Retry/backoff policy
/// lives one layer up, in the pipeline crate — implementations here make
/// exactly one attempt.
#[async_trait]
pub trait ChatCompleter: Send + Sync {
    async fn complete(
        &self,
        turns: &[CompletionTurn],
        temperature: f32,
    ) -> Result<CompletionResult, AdapterError>;
}
