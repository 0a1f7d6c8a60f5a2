//! Prompt/Template Manager (C5) — named system+user template pairs with
//! `{slot}` placeholders, resolved by straightforward string substitution.
//! No templating crate: the teacher's own `SystemPrompt` assembly
//! (`prompt.rs` in the agent lineage) hand-builds prompts with
//! `format!`/`push_str` rather than pulling in a template engine, and this
//! manager follows the same minimal-dependency approach.

use std::collections::HashMap;

use cortex_core::error::{CortexError, Result};
use cortex_core::types::PromptTemplate;

/// Registered named templates, built once at startup.
pub struct PromptManager {
    templates: HashMap<String, PromptTemplate>,
}

impl PromptManager {
    /// Build a manager with the three built-in templates spec.md describes.
    pub fn with_defaults() -> Self {
        let mut manager = Self {
            templates: HashMap::new(),
        };
        manager.register(knowledge_template());
        manager.register(code_template());
        manager.register(chat_template());
        manager
    }

    pub fn register(&mut self, template: PromptTemplate) {
        self.templates.insert(template.name.clone(), template);
    }

    pub fn get(&self, name: &str) -> Option<&PromptTemplate> {
        self.templates.get(name)
    }

    /// Render `name`'s system and user templates, substituting every
    /// `{slot}` occurrence found in `slots`. A placeholder present in the
    /// template but absent from `slots` is a [`CortexError::TemplateSlotMissing`].
    pub fn format(&self, name: &str, slots: &HashMap<&str, &str>) -> Result<RenderedPrompt> {
        let template = self
            .templates
            .get(name)
            .ok_or_else(|| CortexError::TemplateSlotMissing(format!("unknown template '{name}'")))?;

        Ok(RenderedPrompt {
            system: substitute(&template.system, slots)?,
            user: substitute(&template.user, slots)?,
        })
    }
}

impl Default for PromptManager {
    fn default() -> Self {
        Self::with_defaults()
    }
}

/// A rendered `{system, user}` pair ready to hand to the completion client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedPrompt {
    pub system: String,
    pub user: String,
}

/// Replace every `{name}` placeholder in `text` with `slots["name"]`.
/// Errors with `TemplateSlotMissing` the first time a placeholder has no
/// corresponding slot value.
fn substitute(text: &str, slots: &HashMap<&str, &str>) -> Result<String> {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;

    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let after_open = &rest[open + 1..];
        let Some(close) = after_open.find('}') else {
            out.push_str(&rest[open..]);
            rest = "";
            break;
        };
        let slot_name = &after_open[..close];
        let value = slots
            .get(slot_name)
            .ok_or_else(|| CortexError::TemplateSlotMissing(slot_name.to_string()))?;
        out.push_str(value);
        rest = &after_open[close + 1..];
    }
    out.push_str(rest);
    Ok(out)
}

fn knowledge_template() -> PromptTemplate {
    PromptTemplate {
        name: "knowledge".to_string(),
        system: "You are a helpful assistant answering questions using the provided \
                 context. Always cite your sources using the bracketed numbers \
                 given alongside each piece of context (e.g. [1], [2]). If the \
                 context does not contain enough information to answer the \
                 question, say so explicitly instead of guessing."
            .to_string(),
        user: "Context:\n{context}\n\nConversation so far:\n{history}\n\nQuestion: {query}"
            .to_string(),
    }
}

fn code_template() -> PromptTemplate {
    PromptTemplate {
        name: "code".to_string(),
        system: "You are a helpful assistant for software development questions. \
                 Reference specific code examples from the provided context where \
                 relevant, citing them with their bracketed numbers. If the \
                 context is insufficient to answer precisely, say so explicitly \
                 rather than inventing an answer."
            .to_string(),
        user: "Context:\n{context}\n\nConversation so far:\n{history}\n\nQuestion: {query}"
            .to_string(),
    }
}

fn chat_template() -> PromptTemplate {
    PromptTemplate {
        name: "chat".to_string(),
        system: "You are a helpful, friendly assistant for this application. Answer \
                 directly and concisely; there is no retrieved context for this turn."
            .to_string(),
        user: "Conversation so far:\n{history}\n\nMessage: {query}".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_all_three_builtin_templates() {
        let manager = PromptManager::with_defaults();
        for name in ["knowledge", "code", "chat"] {
            assert!(manager.get(name).is_some(), "missing template {name}");
        }
    }

    #[test]
    fn substitutes_named_slots() {
        let manager = PromptManager::with_defaults();
        let mut slots = HashMap::new();
        slots.insert("context", "[1] some fact");
        slots.insert("history", "User: hi\n");
        slots.insert("query", "what is it?");

        let rendered = manager.format("knowledge", &slots).unwrap();
        assert!(rendered.user.contains("[1] some fact"));
        assert!(rendered.user.contains("what is it?"));
    }

    #[test]
    fn missing_slot_is_an_error() {
        let manager = PromptManager::with_defaults();
        let slots = HashMap::new();
        let err = manager.format("chat", &slots).unwrap_err();
        assert!(matches!(err, CortexError::TemplateSlotMissing(_)));
    }

    #[test]
    fn unknown_template_is_an_error() {
        let manager = PromptManager::with_defaults();
        let slots = HashMap::new();
        assert!(manager.format("does-not-exist", &slots).is_err());
    }
}
