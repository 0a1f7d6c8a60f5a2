//! Function selection within a routed skill (§4.2 step 4).
//!
//! Precedence is fixed by the REDESIGN FLAGS / §9 Open Question: the
//! source's two code paths disagreed about whether route-keyword overrides
//! ran before or after question-pattern detection. This implementation
//! applies, in order: route-keyword override → question-pattern →
//! greeting → format → default (`chat`).

use cortex_core::types::SkillDescriptor;

const QUESTION_WORDS: &[&str] = &["what", "how", "why", "when", "where", "who"];
const GREETING_WORDS: &[&str] = &["hello", "hi", "hey", "greetings"];

/// A route-keyword override: utterances containing `keyword` should be
/// routed to `skill_name` outright, bypassing the registry's scoring step.
/// Populated at startup from configuration (e.g. "docs"/"documentation" →
/// the documentation skill, "explain"/"code"/"analyze" → the code skill).
///
/// Backed by an insertion-ordered `Vec` rather than a `HashMap`: when an
/// utterance contains two override keywords mapping to different skills,
/// precedence must be deterministic (registration order), not dependent on
/// hash iteration order, to satisfy the router-determinism property (§8).
pub struct RouteOverrides {
    overrides: Vec<(String, String)>,
}

impl RouteOverrides {
    pub fn new() -> Self {
        Self {
            overrides: Vec::new(),
        }
    }

    pub fn add(&mut self, keyword: impl Into<String>, skill_name: impl Into<String>) {
        self.overrides.push((keyword.into(), skill_name.into()));
    }

    /// First override keyword contained in the lowercased utterance, in
    /// registration order.
    pub fn matching_skill(&self, utterance_lower: &str) -> Option<&str> {
        self.overrides
            .iter()
            .find(|(keyword, _)| utterance_lower.contains(keyword.as_str()))
            .map(|(_, skill)| skill.as_str())
    }
}

impl Default for RouteOverrides {
    fn default() -> Self {
        Self::new()
    }
}

/// Select the function to invoke within `skill` for `utterance`, applying
/// the fixed precedence: question-pattern → greeting → format → `chat`
/// fallback. Route-keyword overrides are resolved one level up, against
/// the registry, before this is called — by the time a skill has been
/// chosen, only function selection within it remains.
pub fn select_function(skill: &SkillDescriptor, utterance: &str) -> &'static str {
    let lower = utterance.to_lowercase();
    let words: Vec<&str> = lower.split_whitespace().collect();

    let has_fn = |name: &str| skill.functions.iter().any(|f| f.name == name);

    let is_question = lower.contains('?')
        || QUESTION_WORDS
            .iter()
            .any(|q| lower.starts_with(q) || words.contains(q));
    if is_question && has_fn("answer_question") {
        return "answer_question";
    }

    let is_greeting = GREETING_WORDS.iter().any(|g| lower.starts_with(g));
    if is_greeting && has_fn("greet") {
        return "greet";
    }

    if lower.contains("format") && lower.contains("bullet") && has_fn("format_as_bullet_list") {
        return "format_as_bullet_list";
    }

    "chat"
}

#[cfg(test)]
mod tests {
    use super::*;
    use cortex_core::types::FunctionDescriptor;

    fn func(name: &str) -> FunctionDescriptor {
        FunctionDescriptor {
            name: name.to_string(),
            description: String::new(),
        }
    }

    fn skill_with(functions: &[&str]) -> SkillDescriptor {
        SkillDescriptor {
            name: "test".to_string(),
            description: String::new(),
            keywords: Vec::new(),
            functions: functions.iter().map(|f| func(f)).collect(),
            retrieval_aware: false,
        }
    }

    #[test]
    fn question_mark_selects_answer_question() {
        let skill = skill_with(&["answer_question", "chat"]);
        assert_eq!(select_function(&skill, "is this right?"), "answer_question");
    }

    #[test]
    fn question_word_selects_answer_question() {
        let skill = skill_with(&["answer_question", "chat"]);
        assert_eq!(
            select_function(&skill, "What is the onboarding process"),
            "answer_question"
        );
    }

    #[test]
    fn greeting_selects_greet_when_present() {
        let skill = skill_with(&["greet", "chat"]);
        assert_eq!(select_function(&skill, "hi Alice"), "greet");
    }

    #[test]
    fn greeting_falls_back_to_chat_without_greet() {
        let skill = skill_with(&["chat"]);
        assert_eq!(select_function(&skill, "hello there"), "chat");
    }

    #[test]
    fn format_bullet_selects_format_function() {
        let skill = skill_with(&["format_as_bullet_list", "chat"]);
        assert_eq!(
            select_function(&skill, "please format this as a bullet list"),
            "format_as_bullet_list"
        );
    }

    #[test]
    fn default_fallback_is_chat() {
        let skill = skill_with(&["chat"]);
        assert_eq!(select_function(&skill, "deploy the service"), "chat");
    }

    #[test]
    fn route_overrides_match_first_contained_keyword() {
        let mut overrides = RouteOverrides::new();
        overrides.add("docs", "documentation");
        overrides.add("documentation", "documentation");
        overrides.add("explain", "code");
        overrides.add("code", "code");
        overrides.add("analyze", "code");

        assert_eq!(
            overrides.matching_skill("show me the docs please"),
            Some("documentation")
        );
        assert_eq!(
            overrides.matching_skill("explain this function"),
            Some("code")
        );
        assert_eq!(overrides.matching_skill("hello there"), None);
    }

    #[test]
    fn route_overrides_precedence_is_registration_order_not_hash_order() {
        let mut overrides = RouteOverrides::new();
        overrides.add("docs", "documentation");
        overrides.add("code", "code");

        // Contains both override keywords; the first-registered one must
        // win deterministically, every time, regardless of hash layout.
        for _ in 0..8 {
            assert_eq!(
                overrides.matching_skill("explain the code in the docs"),
                Some("documentation")
            );
        }
    }
}
