use std::collections::BTreeSet;

use crate::preprocess::preprocess_query;

const MAX_PREVIOUS_QUERIES: usize = 2;
const MAX_ADDITIONAL_TERMS: usize = 5;

/// Append up to [`MAX_ADDITIONAL_TERMS`] terms drawn from the last
/// [`MAX_PREVIOUS_QUERIES`] queries in this conversation, so a follow-up
/// like "what about staging?" picks up context from what came before it.
/// Terms already present in `query` are not repeated.
pub fn enhance_query_with_context(query: &str, previous_queries: &[String]) -> String {
    if previous_queries.is_empty() {
        return query.to_string();
    }

    let recent = &previous_queries[previous_queries.len().saturating_sub(MAX_PREVIOUS_QUERIES)..];

    let mut key_terms: BTreeSet<String> = BTreeSet::new();
    for prev in recent {
        for term in preprocess_query(prev).split_whitespace() {
            key_terms.insert(term.to_string());
        }
    }

    let current_terms: BTreeSet<String> = query
        .to_lowercase()
        .split_whitespace()
        .map(String::from)
        .collect();

    let additional: Vec<String> = key_terms
        .difference(&current_terms)
        .take(MAX_ADDITIONAL_TERMS)
        .cloned()
        .collect();

    if additional.is_empty() {
        return query.to_string();
    }

    format!("{query} {}", additional.join(" "))
}
