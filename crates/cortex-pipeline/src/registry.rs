//! Skill registry (C2) — the explicit, data-driven replacement for the
//! source's annotated-decorator / dependency-injection container. A
//! [`SkillDescriptor`] is built once at registration time; lookup and
//! routing run over plain `HashMap`/`Vec` data, no reflection involved.

use std::collections::{HashMap, HashSet};

use tracing::info;

use cortex_core::types::{FunctionDescriptor, SkillDescriptor};

/// Registered capabilities plus enough bookkeeping to make routing
/// deterministic: an insertion-order list breaks ties between equally
/// scored skills (earlier registration wins), mirroring
/// `skynet-channels::ChannelManager`'s `HashMap` lookup paired with a
/// separately ordered view.
pub struct SkillRegistry {
    skills: HashMap<String, SkillDescriptor>,
    /// Registration order, oldest first — the registry never reorders this
    /// on reregistration, so "replace atomically" (§3 invariant) does not
    /// move a skill to the back of the tie-break queue.
    order: Vec<String>,
    default_skill: Option<String>,
}

impl SkillRegistry {
    pub fn new() -> Self {
        Self {
            skills: HashMap::new(),
            order: Vec::new(),
            default_skill: None,
        }
    }

    /// Register a skill, replacing any existing skill of the same name
    /// atomically (same slot in `order`, not appended again).
    pub fn register(
        &mut self,
        name: impl Into<String>,
        description: impl Into<String>,
        keywords: impl IntoIterator<Item = impl Into<String>>,
        functions: Vec<FunctionDescriptor>,
        retrieval_aware: bool,
    ) {
        let name = name.into();
        let descriptor = SkillDescriptor {
            name: name.clone(),
            description: description.into(),
            keywords: keywords.into_iter().map(Into::into).collect(),
            functions,
            retrieval_aware,
        };

        if !self.skills.contains_key(&name) {
            self.order.push(name.clone());
        }
        info!(skill = %name, "registered skill");
        self.skills.insert(name, descriptor);
    }

    /// Designate which skill the router falls back to when no keyword
    /// scores above zero (§4.2 step 3). Must name an already-registered
    /// skill; this is enforced by the caller at startup, not here.
    pub fn set_default(&mut self, name: impl Into<String>) {
        self.default_skill = Some(name.into());
    }

    pub fn get(&self, name: &str) -> Option<&SkillDescriptor> {
        self.skills.get(name)
    }

    pub fn default_skill(&self) -> Option<&SkillDescriptor> {
        self.default_skill.as_deref().and_then(|n| self.skills.get(n))
    }

    /// Score every registered skill against `utterance` and return the
    /// best match in registration order on ties, falling back to the
    /// default skill when every score is zero (§4.2 steps 1–3).
    pub fn route(&self, utterance: &str) -> Option<&SkillDescriptor> {
        let utterance_lower = utterance.to_lowercase();
        let w: HashSet<&str> = utterance_lower.split_whitespace().collect();

        let mut best: Option<(&SkillDescriptor, usize)> = None;
        for name in &self.order {
            let Some(skill) = self.skills.get(name) else {
                continue;
            };
            let score = skill
                .keywords
                .iter()
                .filter(|k| w.contains(k.as_str()))
                .count();
            match best {
                Some((_, best_score)) if score <= best_score => {}
                _ => best = Some((skill, score)),
            }
        }

        match best {
            Some((skill, score)) if score > 0 => Some(skill),
            _ => self.default_skill(),
        }
    }
}

impl Default for SkillRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn func(name: &str) -> FunctionDescriptor {
        FunctionDescriptor {
            name: name.to_string(),
            description: String::new(),
        }
    }

    fn registry() -> SkillRegistry {
        let mut r = SkillRegistry::new();
        r.register(
            "chat",
            "general chat",
            ["chat", "help"],
            vec![func("chat"), func("greet"), func("answer_question")],
            false,
        );
        r.register(
            "docs",
            "documentation lookup",
            ["docs", "documentation"],
            vec![func("answer_question")],
            true,
        );
        r.set_default("chat");
        r
    }

    #[test]
    fn routes_to_highest_scoring_skill() {
        let r = registry();
        let routed = r.route("show me the documentation").unwrap();
        assert_eq!(routed.name, "docs");
    }

    #[test]
    fn falls_back_to_default_when_no_keyword_matches() {
        let r = registry();
        let routed = r.route("what time is it").unwrap();
        assert_eq!(routed.name, "chat");
    }

    #[test]
    fn reregistering_replaces_atomically_without_moving_tie_break_order() {
        let mut r = registry();
        r.register(
            "chat",
            "general chat v2",
            ["chat", "help", "hi"],
            vec![func("chat")],
            false,
        );
        assert_eq!(r.order.len(), 2);
        assert_eq!(r.get("chat").unwrap().description, "general chat v2");
    }

    #[test]
    fn route_is_deterministic_across_invocations() {
        let r = registry();
        let a = r.route("documentation please").unwrap().name.clone();
        let b = r.route("documentation please").unwrap().name.clone();
        assert_eq!(a, b);
    }
}
