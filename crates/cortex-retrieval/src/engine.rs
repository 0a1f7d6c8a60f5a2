use std::sync::Arc;

use cortex_adapters::{Embedder, SearchIndex};
use cortex_core::config::RELEVANCE_FLOOR;
use cortex_core::error::{CortexError, Result};
use cortex_core::types::RetrievalChunk;

use crate::citations::citation_for;
use crate::followup::enhance_query_with_context;
use crate::preprocess::preprocess_query;

/// Orchestrates query preprocessing, follow-up enhancement, and hybrid
/// search against a single document index.
pub struct RetrievalEngine {
    index: Arc<dyn SearchIndex>,
    embedder: Arc<dyn Embedder>,
}

impl RetrievalEngine {
    pub fn new(index: Arc<dyn SearchIndex>, embedder: Arc<dyn Embedder>) -> Self {
        Self { index, embedder }
    }

    /// Retrieve relevant chunks for `query`. `previous_queries` supplies
    /// the conversation's earlier queries, oldest first, for follow-up
    /// enhancement.
    ///
    /// If the enhanced/preprocessed query returns nothing above the
    /// relevance floor, retries once against the raw, unprocessed query —
    /// preprocessing occasionally over-trims a query down to nothing the
    /// index can match. Only after that second attempt comes up empty is
    /// [`CortexError::RetrievalEmpty`] returned.
    pub async fn retrieve(
        &self,
        query: &str,
        previous_queries: &[String],
        top_k: usize,
    ) -> Result<Vec<RetrievalChunk>> {
        let enhanced = enhance_query_with_context(query, previous_queries);
        let processed = preprocess_query(&enhanced);

        let results = self.search_and_filter(&processed, top_k).await?;
        if !results.is_empty() {
            return Ok(results);
        }

        tracing::debug!(query, "retrieval empty for processed query, retrying with original");
        let fallback = self.search_and_filter(query, top_k).await?;
        if fallback.is_empty() {
            return Err(CortexError::RetrievalEmpty);
        }
        Ok(fallback)
    }

    async fn search_and_filter(&self, query_text: &str, top_k: usize) -> Result<Vec<RetrievalChunk>> {
        let embedding = self
            .embedder
            .embed(query_text)
            .await
            .map_err(|e| CortexError::RetrievalUnavailable(e.to_string()))?;

        let results = self
            .index
            .search(query_text, &embedding, top_k)
            .await
            .map_err(|e| CortexError::RetrievalUnavailable(e.to_string()))?;

        Ok(results
            .into_iter()
            .filter(|chunk| chunk.score >= RELEVANCE_FLOOR)
            .map(|mut chunk| {
                chunk.citation = citation_for(&chunk);
                chunk
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cortex_adapters::fakes::{FakeEmbedder, FakeSearchIndex};
    use std::collections::HashMap;

    fn chunk(document_id: &str, chunk_index: u32, score: f32) -> RetrievalChunk {
        RetrievalChunk {
            document_id: document_id.to_string(),
            chunk_index,
            content: "some content".to_string(),
            citation: String::new(),
            page: None,
            score,
            reranker_score: None,
            highlights: Vec::new(),
            metadata: HashMap::new(),
        }
    }

    #[tokio::test]
    async fn filters_out_results_below_relevance_floor() {
        let index = Arc::new(FakeSearchIndex::with_chunks(vec![
            chunk("doc-1", 0, 0.9),
            chunk("doc-2", 0, 0.1),
        ]));
        let engine = RetrievalEngine::new(index, Arc::new(FakeEmbedder));

        let results = engine.retrieve("deploy a service", &[], 5).await.unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].document_id, "doc-1");
    }

    #[tokio::test]
    async fn empty_results_after_fallback_is_retrieval_empty() {
        let index = Arc::new(FakeSearchIndex::with_chunks(vec![]));
        let engine = RetrievalEngine::new(index, Arc::new(FakeEmbedder));

        let err = engine.retrieve("anything", &[], 5).await.unwrap_err();
        assert!(matches!(err, CortexError::RetrievalEmpty));
    }
}
