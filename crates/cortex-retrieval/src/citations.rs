use cortex_core::types::RetrievalChunk;

/// Citation text for a single chunk: `"Document <id>, Chunk <i>"`, plus the
/// page number when present and the source document's `file_type` when the
/// index surfaced one in the chunk's metadata — a detail the original
/// source's `ContextService.format_context` includes that the distilled
/// spec's citation string omits.
pub fn citation_for(chunk: &RetrievalChunk) -> String {
    let mut out = format!("Document {}, Chunk {}", chunk.document_id, chunk.chunk_index);
    if let Some(page) = chunk.page {
        out.push_str(&format!(", Page {page}"));
    }
    if let Some(file_type) = chunk.metadata.get("file_type").and_then(|v| v.as_str()) {
        out.push_str(&format!(", {file_type}"));
    }
    out
}

/// Render numbered citations (`[1]`, `[2]`, …) in result order, the order
/// the response formatter and prompt templates expect.
pub fn numbered_citations(chunks: &[RetrievalChunk]) -> Vec<String> {
    chunks
        .iter()
        .enumerate()
        .map(|(i, chunk)| format!("[{}] {}", i + 1, citation_for(chunk)))
        .collect()
}

/// A chunk's human-facing title: the index's `title` metadata when present,
/// falling back to the document id. Mirrors the original source's
/// `_format_answer_with_citations`, which lists each source by title rather
/// than by raw document id.
pub fn chunk_title(chunk: &RetrievalChunk) -> String {
    chunk
        .metadata
        .get("title")
        .and_then(|v| v.as_str())
        .map(|s| s.to_string())
        .unwrap_or_else(|| chunk.document_id.clone())
}

/// The "Sources:" block appended to a retrieval-aware reply (§8.4): one
/// numbered line per chunk, `"[n] <title>"`, in the same order as the
/// citation markers embedded in the prompt context. Empty input produces
/// no section at all.
pub fn sources_section(chunks: &[RetrievalChunk]) -> String {
    if chunks.is_empty() {
        return String::new();
    }
    let mut out = String::from("\n\nSources:\n");
    for (i, chunk) in chunks.iter().enumerate() {
        out.push_str(&format!("[{}] {}\n", i + 1, chunk_title(chunk)));
    }
    out.truncate(out.trim_end_matches('\n').len());
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn chunk(document_id: &str, chunk_index: u32) -> RetrievalChunk {
        RetrievalChunk {
            document_id: document_id.to_string(),
            chunk_index,
            content: "x".to_string(),
            citation: String::new(),
            page: None,
            score: 0.5,
            reranker_score: None,
            highlights: Vec::new(),
            metadata: HashMap::new(),
        }
    }

    #[test]
    fn numbers_citations_in_order() {
        let chunks = vec![chunk("doc-1", 0), chunk("doc-2", 3)];
        let out = numbered_citations(&chunks);
        assert_eq!(out[0], "[1] Document doc-1, Chunk 0");
        assert_eq!(out[1], "[2] Document doc-2, Chunk 3");
    }

    #[test]
    fn includes_page_and_file_type_when_present() {
        let mut c = chunk("doc-1", 0);
        c.page = Some(3);
        c.metadata
            .insert("file_type".to_string(), serde_json::json!("pdf"));
        assert_eq!(citation_for(&c), "Document doc-1, Chunk 0, Page 3, pdf");
    }

    #[test]
    fn chunk_title_prefers_metadata_title_over_document_id() {
        let mut c = chunk("doc-1", 0);
        assert_eq!(chunk_title(&c), "doc-1");
        c.metadata
            .insert("title".to_string(), serde_json::json!("Onboarding Handbook"));
        assert_eq!(chunk_title(&c), "Onboarding Handbook");
    }

    #[test]
    fn sources_section_lists_titles_in_order() {
        let mut first = chunk("doc-1", 0);
        first
            .metadata
            .insert("title".to_string(), serde_json::json!("Onboarding Handbook"));
        let mut second = chunk("doc-2", 1);
        second
            .metadata
            .insert("title".to_string(), serde_json::json!("IT Setup Guide"));

        let section = sources_section(&[first, second]);
        assert_eq!(section, "\n\nSources:\n[1] Onboarding Handbook\n[2] IT Setup Guide");
    }

    #[test]
    fn sources_section_empty_for_no_chunks() {
        assert_eq!(sources_section(&[]), "");
    }
}
