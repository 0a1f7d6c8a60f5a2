/// Terms preserved verbatim even though they'd otherwise look like filler —
/// dropping them would strip exactly the words a technical query needs.
const TECHNICAL_TERMS: &[&str] = &[
    "api", "sdk", "cli", "ui", "ux", "git", "docker", "kubernetes", "k8s", "azure", "aws", "gcp",
    "cloud", "devops", "pipeline", "llm", "openai", "gpt", "embedding", "vector", "database",
    "storage", "memory", "cache", "index", "search", "authentication", "authorization",
    "security", "encryption", "documentation", "markdown", "chat", "bot", "function", "method",
    "class", "object", "interface", "skill",
];

const QUESTION_WORDS: &[&str] = &[
    "what", "how", "why", "when", "where", "who", "is", "are", "can", "could", "would", "should",
];

const FILLER_WORDS: &[&str] = &[
    "the", "a", "an", "in", "on", "at", "to", "for", "with", "by", "about", "like", "as", "of",
];

/// Keyword -> related terms appended to the query the first time any
/// keyword is found in it. Only the first match applies.
const DOMAIN_EXPANSIONS: &[(&str, &[&str])] = &[
    ("onboarding", &["onboarding process", "new hire", "orientation"]),
    ("new employee", &["onboarding process", "first day", "getting started"]),
    ("getting started", &["onboarding", "setup guide", "initial steps"]),
    ("first day", &["onboarding", "orientation", "welcome"]),
    ("orientation", &["onboarding", "introduction", "welcome"]),
    ("setup", &["configuration", "installation", "environment setup"]),
    ("training", &["learning", "courses", "education", "onboarding"]),
    ("mentor", &["buddy", "coach", "onboarding support"]),
    ("benefits", &["employee benefits", "perks", "hr", "onboarding"]),
    ("handbook", &["employee handbook", "guide", "manual", "policies"]),
];

fn strip_punctuation(word: &str) -> String {
    word.chars().filter(|c| c.is_alphanumeric()).collect()
}

/// Improve a raw user query for hybrid search: lowercase, expand
/// onboarding-domain terms on first match, then drop question/filler words
/// unless they're also a recognized technical term. If more than half the
/// tokens would be dropped, the original query is returned unchanged —
/// better to search on a noisy query than an empty one.
pub fn preprocess_query(query: &str) -> String {
    let mut processed = query.to_lowercase();

    // Match on the keyword that occurs *earliest* in the query, not the
    // first one declared in `DOMAIN_EXPANSIONS`. Several expansions inject
    // a later keyword's trigger word (e.g. "training" appends "...onboarding",
    // "mentor" appends "...onboarding support"), so on a second pass the
    // array-order-first keyword ("onboarding") could out-rank the keyword
    // that actually appears first in the text, cascading into a second,
    // different expansion and breaking idempotence. Leftmost-position
    // matching keeps re-preprocessing an already-expanded query pinned to
    // the same keyword it matched the first time.
    let earliest_match = DOMAIN_EXPANSIONS
        .iter()
        .filter_map(|(keyword, enhancements)| processed.find(keyword).map(|pos| (pos, enhancements)))
        .min_by_key(|(pos, _)| *pos);

    if let Some((_, enhancements)) = earliest_match {
        // Skip the append if every enhancement term is already present —
        // otherwise re-preprocessing an already-expanded query keeps
        // appending the same terms forever (breaks idempotence).
        if !enhancements.iter().all(|e| processed.contains(e)) {
            processed = format!("{processed} {}", enhancements.join(" "));
        }
    }

    let words: Vec<&str> = processed.split_whitespace().collect();
    let mut filtered: Vec<&str> = Vec::with_capacity(words.len());

    for word in &words {
        let clean = strip_punctuation(word);
        if TECHNICAL_TERMS.iter().any(|t| *t == clean) {
            filtered.push(word);
            continue;
        }
        if !QUESTION_WORDS.contains(&clean.as_str()) && !FILLER_WORDS.contains(&clean.as_str()) {
            filtered.push(word);
        }
    }

    if filtered.len() < words.len() / 2 {
        return query.to_string();
    }

    filtered.join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn drops_question_and_filler_words() {
        let out = preprocess_query("What is the API for the search index?");
        assert!(!out.contains("what"));
        assert!(!out.contains("the"));
        assert!(out.contains("api"));
        assert!(out.contains("search"));
    }

    #[test]
    fn expands_onboarding_terms_on_first_match_only() {
        let out = preprocess_query("onboarding benefits handbook");
        assert!(out.contains("new hire"));
        assert!(!out.contains("employee benefits"));
    }

    #[test]
    fn falls_back_to_original_when_too_much_is_dropped() {
        let out = preprocess_query("is a in on at");
        assert_eq!(out, "is a in on at");
    }

    #[test]
    fn preserves_technical_terms_that_look_like_filler() {
        let out = preprocess_query("what is a cache");
        assert!(out.contains("cache"));
    }

    #[test]
    fn is_idempotent() {
        for q in [
            "What is the onboarding process?",
            "onboarding benefits handbook",
            "is a in on at",
            "tell me about the new employee setup",
            "training",
            "mentor",
            "benefits",
        ] {
            let once = preprocess_query(q);
            let twice = preprocess_query(&once);
            assert_eq!(once, twice, "not idempotent for {q:?}");
        }
    }

    #[test]
    fn cross_keyword_cascade_does_not_break_idempotence() {
        // "training" expands to include "onboarding"; a naive array-order
        // match would then let "onboarding" (declared earlier) win on the
        // second pass and append its own enhancements on top.
        let once = preprocess_query("training");
        let twice = preprocess_query(&once);
        assert_eq!(once, twice);
    }

    #[test]
    fn preserves_whitelisted_technical_tokens() {
        let q = "what is the api sdk cli for docker kubernetes";
        let out = preprocess_query(q);
        for t in ["api", "sdk", "cli", "docker", "kubernetes"] {
            assert!(
                out.split_whitespace().any(|w| w == t),
                "expected {t:?} preserved in {out:?}"
            );
        }
    }
}
