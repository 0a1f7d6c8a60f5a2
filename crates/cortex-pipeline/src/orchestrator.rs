//! Orchestrator (C7) — the top-level state machine binding the gateway,
//! router, retrieval engine, prompt manager, completion client, formatter,
//! conversation store and messaging adapter together.
//!
//! Modeled directly on `skynet-agent::pipeline::process::process_message_non_streaming`'s
//! "load history → build prompt → tools/retrieval → call model → persist →
//! return" shape, generalized from a single LLM+tools loop into the
//! gateway → router → retrieval → prompt → completion → format → persist →
//! post pipeline this system needs.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use cortex_adapters::{ChatCompleter, CompletionTurn, MessageFormat, MessagingPlatform, OutboundMessage};
use cortex_core::error::{CortexError, Result};
use cortex_core::types::{ConversationId, Role, SkillDescriptor};
use cortex_memory::{ContextValue, ConversationStore};
use cortex_retrieval::{numbered_citations, RetrievalEngine};

use crate::completion::RetryingCompleter;
use crate::formatter::{format_error, format_response, to_wire_blocks, FormattedResponse};
use crate::prompt::PromptManager;
use crate::registry::SkillRegistry;
use crate::router::{select_function, RouteOverrides};

/// Messages loaded for prompt context (§4.7: "bounded by the last 20 messages").
const HISTORY_LIMIT: usize = 20;
/// Chunks requested per retrieval call. Not specified numerically by the
/// source; 5 matches the teacher's own default top-k for similar calls.
const RETRIEVAL_TOP_K: usize = 5;

/// Which surface a reply is destined for, carried on the inbound event so
/// `POSTED` can address the right recipient.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelType {
    Direct,
    Channel,
}

/// A validated, classified inbound event — everything the gateway (C1)
/// extracts before handing control to the orchestrator.
#[derive(Debug, Clone)]
pub struct InboundEvent {
    pub user: String,
    pub channel: String,
    pub channel_type: ChannelType,
    pub text: String,
}

/// What happened to a single inbound event.
#[derive(Debug, Clone)]
pub enum OrchestratorOutcome {
    /// The full pipeline ran (possibly ending in an apology) and a reply
    /// was posted to the platform.
    Posted {
        conversation_id: ConversationId,
        text: String,
    },
    /// The conversation store itself could not be reached; an apology was
    /// posted directly with no persistence attempted.
    PostedWithoutPersistence { text: String },
}

/// Tunables that would otherwise come from [`cortex_core::config::RequestConfig`]
/// and [`cortex_core::config::CompletionConfig`] — kept as plain fields here
/// so this crate does not need to depend on the gateway's config loading.
#[derive(Debug, Clone)]
pub struct OrchestratorSettings {
    pub deadline: Duration,
    pub external_call_deadline: Duration,
    pub temperature: f32,
}

impl Default for OrchestratorSettings {
    fn default() -> Self {
        Self {
            deadline: Duration::from_millis(25_000),
            external_call_deadline: Duration::from_millis(10_000),
            temperature: 0.7,
        }
    }
}

pub struct Orchestrator<C: ChatCompleter> {
    registry: Arc<SkillRegistry>,
    overrides: RouteOverrides,
    retrieval: Arc<RetrievalEngine>,
    prompts: PromptManager,
    completer: RetryingCompleter<C>,
    store: Arc<ConversationStore>,
    platform: Arc<dyn MessagingPlatform>,
    settings: OrchestratorSettings,
}

impl<C: ChatCompleter> Orchestrator<C> {
    pub fn new(
        registry: Arc<SkillRegistry>,
        overrides: RouteOverrides,
        retrieval: Arc<RetrievalEngine>,
        prompts: PromptManager,
        completer: RetryingCompleter<C>,
        store: Arc<ConversationStore>,
        platform: Arc<dyn MessagingPlatform>,
        settings: OrchestratorSettings,
    ) -> Self {
        Self {
            registry,
            overrides,
            retrieval,
            prompts,
            completer,
            store,
            platform,
            settings,
        }
    }

    /// Run the full pipeline for one event. Never returns an `Err` that
    /// propagates to the caller — every failure past `CLASSIFIED` is
    /// converted into a user-visible apology (§7) so the caller always has
    /// something to acknowledge the platform's delivery with.
    pub async fn handle(&self, event: InboundEvent) -> OrchestratorOutcome {
        let token = CancellationToken::new();

        let outcome = tokio::select! {
            biased;
            result = self.run_pipeline(&event, &token) => result,
            _ = tokio::time::sleep(self.settings.deadline) => {
                token.cancel();
                Err(CortexError::DeadlineExceeded)
            }
        };

        match outcome {
            Ok((conversation_id, text)) => OrchestratorOutcome::Posted { conversation_id, text },
            Err(err) => self.handle_pipeline_failure(&event, err).await,
        }
    }

    /// CONVERSATION_READY through POSTED, collapsed into one fallible
    /// async function so `handle` can uniformly convert any error into an
    /// apology.
    async fn run_pipeline(
        &self,
        event: &InboundEvent,
        token: &CancellationToken,
    ) -> Result<(ConversationId, String)> {
        let (conversation_id, history) = self.load_conversation(&event.user)?;

        let (skill, function) = self.route(&event.text)?;

        let (prompt_context, citations) = if skill.retrieval_aware {
            self.retrieve_or_degrade(event, &history, token).await?
        } else {
            (String::new(), Vec::new())
        };

        let rendered = self.render_prompt(&skill, function, &event.text, &history, &prompt_context)?;

        let reply_text = self.complete(&rendered.system, &rendered.user, token).await?;
        let reply_text = if citations.is_empty() {
            reply_text
        } else {
            format!("{reply_text}{}", cortex_retrieval::sources_section(&citations))
        };

        let formatted = format_response(&reply_text, true);

        self.persist(&conversation_id, &event.text, &formatted.text, &citations)?;
        self.post(event, &formatted).await?;

        Ok((conversation_id, formatted.text))
    }

    fn load_conversation(&self, owner: &str) -> Result<(ConversationId, Vec<(String, String)>)> {
        let existing = self
            .store
            .get_user_conversations(owner, 1, 0)
            .map_err(|e| CortexError::ConversationStoreUnavailable(e.to_string()))?;

        let conversation = match existing.into_iter().next() {
            Some(c) => c,
            None => self
                .store
                .create_conversation(Some(owner))
                .map_err(|e| CortexError::ConversationStoreUnavailable(e.to_string()))?,
        };

        let context = self
            .store
            .get_context(&conversation.id, HISTORY_LIMIT, cortex_core::types::ContextFormat::Completion)
            .map_err(|e| CortexError::ConversationStoreUnavailable(e.to_string()))?;

        let history = match context {
            ContextValue::Completion(pairs) => pairs,
            _ => Vec::new(),
        };

        Ok((conversation.id, history))
    }

    fn route(&self, utterance: &str) -> Result<(SkillDescriptor, &'static str)> {
        let utterance_lower = utterance.to_lowercase();
        let skill = self
            .overrides
            .matching_skill(&utterance_lower)
            .and_then(|name| self.registry.get(name))
            .or_else(|| self.registry.route(utterance))
            .ok_or(CortexError::NoSkillMatched)?
            .clone();

        let function = select_function(&skill, utterance);
        Ok((skill, function))
    }

    /// Wraps [`Self::retrieve`] with the §7 `RetrievalUnavailable` policy:
    /// every built-in retrieval-aware function tolerates missing context
    /// (the `knowledge`/`code` templates already instruct the model to say
    /// so explicitly), so an index failure degrades to an empty context
    /// instead of aborting the pipeline. Other errors (`RetrievalEmpty`,
    /// `DeadlineExceeded`) propagate unchanged.
    async fn retrieve_or_degrade(
        &self,
        event: &InboundEvent,
        history: &[(String, String)],
        token: &CancellationToken,
    ) -> Result<(String, Vec<cortex_core::types::RetrievalChunk>)> {
        match self.retrieve(event, history, token).await {
            Err(CortexError::RetrievalUnavailable(reason)) => {
                warn!(reason = %reason, "retrieval index unavailable, continuing without retrieved context");
                Ok((String::new(), Vec::new()))
            }
            other => other,
        }
    }

    async fn retrieve(
        &self,
        event: &InboundEvent,
        history: &[(String, String)],
        token: &CancellationToken,
    ) -> Result<(String, Vec<cortex_core::types::RetrievalChunk>)> {
        let previous_queries: Vec<String> = history
            .iter()
            .filter(|(role, _)| role == "user")
            .map(|(_, content)| content.clone())
            .collect();

        let chunks = run_with_deadline(
            token,
            self.settings.external_call_deadline,
            self.retrieval.retrieve(&event.text, &previous_queries, RETRIEVAL_TOP_K),
        )
        .await?;

        let citations = numbered_citations(&chunks);
        let mut context = String::new();
        for (chunk, citation) in chunks.iter().zip(citations.iter()) {
            context.push_str(&chunk.content);
            context.push('\n');
            context.push_str(citation);
            context.push_str(&format!(" (relevance: {:.2})\n\n", chunk.score));
        }

        Ok((context, chunks))
    }

    fn render_prompt(
        &self,
        skill: &SkillDescriptor,
        function: &str,
        query: &str,
        history: &[(String, String)],
        context: &str,
    ) -> Result<crate::prompt::RenderedPrompt> {
        let template_name = select_template(skill, function);

        let history_text = history
            .iter()
            .map(|(role, content)| format!("{role}: {content}\n"))
            .collect::<String>();

        let mut slots = HashMap::new();
        slots.insert("query", query);
        slots.insert("history", history_text.as_str());
        slots.insert("context", context);

        self.prompts.format(template_name, &slots)
    }

    async fn complete(&self, system: &str, user: &str, token: &CancellationToken) -> Result<String> {
        let turns = vec![
            CompletionTurn {
                role: "system".to_string(),
                content: system.to_string(),
            },
            CompletionTurn {
                role: "user".to_string(),
                content: user.to_string(),
            },
        ];

        let result = run_with_deadline(
            token,
            self.settings.external_call_deadline,
            self.completer.complete(&turns, self.settings.temperature),
        )
        .await?;

        Ok(result.content)
    }

    fn persist(
        &self,
        conversation_id: &ConversationId,
        user_text: &str,
        assistant_text: &str,
        citations: &[cortex_core::types::RetrievalChunk],
    ) -> Result<()> {
        self.store
            .add_message(conversation_id, Role::User, user_text, None)
            .map_err(|e| CortexError::ConversationStoreUnavailable(e.to_string()))?;

        let metadata = if citations.is_empty() {
            None
        } else {
            Some(serde_json::json!({
                "citations": numbered_citations(citations),
            }))
        };

        self.store
            .add_message(conversation_id, Role::Assistant, assistant_text, metadata)
            .map_err(|e| CortexError::ConversationStoreUnavailable(e.to_string()))?;

        Ok(())
    }

    async fn post(&self, event: &InboundEvent, formatted: &FormattedResponse) -> Result<()> {
        let recipient_id = match event.channel_type {
            ChannelType::Direct => event.user.clone(),
            ChannelType::Channel => event.channel.clone(),
        };

        let message = OutboundMessage {
            recipient_id,
            content: formatted.text.clone(),
            format: MessageFormat::Markdown,
            in_reply_to: None,
            blocks: formatted.blocks.as_deref().map(to_wire_blocks),
        };

        self.platform
            .post_message(&message)
            .await
            .map_err(|e| CortexError::PlatformPostFailed(e.to_string()))
    }

    /// Turn any pipeline failure into a posted apology (§7), persisting it
    /// when a conversation is reachable and falling back to a direct post
    /// when it is not.
    async fn handle_pipeline_failure(&self, event: &InboundEvent, err: CortexError) -> OrchestratorOutcome {
        warn!(error = %err, code = err.code(), "orchestrator pipeline failed, replying with apology");
        let apology = format_error(&err.user_message());

        match self.load_conversation(&event.user) {
            Ok((conversation_id, _)) => {
                if let Err(persist_err) = self.persist(&conversation_id, &event.text, &apology.text, &[]) {
                    error!(error = %persist_err, "failed to persist apology turn");
                }
                if let Err(post_err) = self.post(event, &apology).await {
                    error!(error = %post_err, "failed to post apology to platform");
                }
                OrchestratorOutcome::Posted {
                    conversation_id,
                    text: apology.text,
                }
            }
            Err(store_err) => {
                error!(error = %store_err, "conversation store unreachable, posting apology without persistence");
                if let Err(post_err) = self.post(event, &apology).await {
                    error!(error = %post_err, "failed to post apology to platform");
                }
                OrchestratorOutcome::PostedWithoutPersistence { text: apology.text }
            }
        }
    }
}

/// Select the template (§4.5) matching a routed function. Not specified
/// as a first-class field on `SkillDescriptor`; resolved here from the
/// skill name and function, the narrowest extension that satisfies "select
/// a template matching the function" (§4.7) without adding a field no
/// other component needs (Open Question, recorded in DESIGN.md).
fn select_template(skill: &SkillDescriptor, function: &str) -> &'static str {
    if !skill.retrieval_aware || function != "answer_question" {
        return "chat";
    }
    if skill.name == "code" {
        "code"
    } else {
        "knowledge"
    }
}

/// Race `fut` against `external_call_deadline`, also yielding early when
/// `token` is already cancelled (the outer request deadline tripped while
/// this call was about to start).
async fn run_with_deadline<T>(
    token: &CancellationToken,
    external_call_deadline: Duration,
    fut: impl std::future::Future<Output = Result<T>>,
) -> Result<T> {
    if token.is_cancelled() {
        return Err(CortexError::DeadlineExceeded);
    }
    match tokio::time::timeout(external_call_deadline, fut).await {
        Ok(result) => result,
        Err(_) => Err(CortexError::DeadlineExceeded),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cortex_adapters::fakes::{FakeChatCompleter, FakeEmbedder, FakeMessagingPlatform, FakeSearchIndex};
    use cortex_core::types::FunctionDescriptor;
    use rusqlite::Connection;

    fn chat_only_registry() -> (Arc<SkillRegistry>, RouteOverrides) {
        let mut registry = SkillRegistry::new();
        registry.register(
            "chat",
            "general chat",
            ["chat"],
            vec![FunctionDescriptor {
                name: "chat".to_string(),
                description: String::new(),
            }],
            false,
        );
        registry.set_default("chat");
        (Arc::new(registry), RouteOverrides::new())
    }

    fn orchestrator_with(
        completer: FakeChatCompleter,
        platform: Arc<FakeMessagingPlatform>,
    ) -> Orchestrator<FakeChatCompleter> {
        let (registry, overrides) = chat_only_registry();
        let conn = Connection::open_in_memory().unwrap();
        cortex_memory::db::init_db(&conn).unwrap();
        let store = Arc::new(ConversationStore::new(conn));
        let retrieval = Arc::new(RetrievalEngine::new(
            Arc::new(FakeSearchIndex::with_chunks(vec![])),
            Arc::new(FakeEmbedder),
        ));

        Orchestrator::new(
            registry,
            overrides,
            retrieval,
            PromptManager::with_defaults(),
            RetryingCompleter::new(completer),
            store,
            platform,
            OrchestratorSettings::default(),
        )
    }

    #[tokio::test]
    async fn happy_path_posts_completion_and_persists_both_turns() {
        let platform = Arc::new(FakeMessagingPlatform::default());
        let orchestrator = orchestrator_with(FakeChatCompleter::always_succeeds("hi there"), platform.clone());

        let event = InboundEvent {
            user: "U1".to_string(),
            channel: "C1".to_string(),
            channel_type: ChannelType::Channel,
            text: "hello".to_string(),
        };

        let outcome = orchestrator.handle(event).await;
        match outcome {
            OrchestratorOutcome::Posted { text, .. } => assert_eq!(text, "hi there"),
            other => panic!("expected Posted, got {other:?}"),
        }
        assert_eq!(platform.sent.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn completion_failure_posts_apology_instead_of_propagating() {
        use cortex_adapters::fakes::AdapterErrorKind;

        let platform = Arc::new(FakeMessagingPlatform::default());
        let completer = FakeChatCompleter::fails_then_succeeds("unreachable", 10, AdapterErrorKind::Auth);
        let orchestrator = orchestrator_with(completer, platform.clone());

        let event = InboundEvent {
            user: "U1".to_string(),
            channel: "C1".to_string(),
            channel_type: ChannelType::Direct,
            text: "hello".to_string(),
        };

        let outcome = orchestrator.handle(event).await;
        match outcome {
            OrchestratorOutcome::Posted { text, .. } => {
                assert!(!text.is_empty());
            }
            other => panic!("expected Posted with an apology, got {other:?}"),
        }
        assert_eq!(platform.sent.lock().unwrap().len(), 1);
    }

    fn retrieval_aware_registry() -> (Arc<SkillRegistry>, RouteOverrides) {
        let mut registry = SkillRegistry::new();
        registry.register(
            "docs",
            "answers questions from the indexed documentation corpus",
            ["docs"],
            vec![FunctionDescriptor {
                name: "answer_question".to_string(),
                description: String::new(),
            }],
            true,
        );
        registry.set_default("docs");
        (Arc::new(registry), RouteOverrides::new())
    }

    fn titled_chunk(
        document_id: &str,
        chunk_index: u32,
        score: f32,
        title: &str,
    ) -> cortex_core::types::RetrievalChunk {
        let mut metadata = HashMap::new();
        metadata.insert("title".to_string(), serde_json::json!(title));
        cortex_core::types::RetrievalChunk {
            document_id: document_id.to_string(),
            chunk_index,
            content: "some indexed content".to_string(),
            citation: String::new(),
            page: None,
            score,
            reranker_score: None,
            highlights: Vec::new(),
            metadata,
        }
    }

    /// §8 scenario 4: two chunks scored 0.9/0.7 for an onboarding question
    /// produce a reply carrying both citation markers and a "Sources:"
    /// section listing the chunk titles.
    #[tokio::test]
    async fn retrieval_aware_reply_includes_citation_markers_and_sources_section() {
        let platform = Arc::new(FakeMessagingPlatform::default());
        let (registry, overrides) = retrieval_aware_registry();
        let conn = Connection::open_in_memory().unwrap();
        cortex_memory::db::init_db(&conn).unwrap();
        let store = Arc::new(ConversationStore::new(conn));

        let chunks = vec![
            titled_chunk("doc-1", 0, 0.9, "Onboarding Handbook"),
            titled_chunk("doc-2", 3, 0.7, "New Hire Orientation Guide"),
        ];
        let index = Arc::new(FakeSearchIndex::with_chunks(chunks));
        let retrieval = Arc::new(RetrievalEngine::new(index, Arc::new(FakeEmbedder)));

        let orchestrator = Orchestrator::new(
            registry,
            overrides,
            retrieval,
            PromptManager::with_defaults(),
            RetryingCompleter::new(FakeChatCompleter::always_succeeds(
                "Here is the onboarding process.",
            )),
            store,
            platform.clone(),
            OrchestratorSettings::default(),
        );

        let event = InboundEvent {
            user: "U1".to_string(),
            channel: "C1".to_string(),
            channel_type: ChannelType::Channel,
            text: "What is the onboarding process?".to_string(),
        };

        let outcome = orchestrator.handle(event).await;
        match outcome {
            OrchestratorOutcome::Posted { text, .. } => {
                assert!(text.contains("[1]"), "missing [1] marker in {text:?}");
                assert!(text.contains("[2]"), "missing [2] marker in {text:?}");
                assert!(text.contains("Sources:"));
                assert!(text.contains("Onboarding Handbook"));
                assert!(text.contains("New Hire Orientation Guide"));
            }
            other => panic!("expected Posted, got {other:?}"),
        }
    }

    /// §7: `RetrievalUnavailable` degrades to completion with empty context
    /// rather than aborting into a generic apology.
    #[tokio::test]
    async fn retrieval_unavailable_degrades_instead_of_aborting() {
        let platform = Arc::new(FakeMessagingPlatform::default());
        let (registry, overrides) = retrieval_aware_registry();
        let conn = Connection::open_in_memory().unwrap();
        cortex_memory::db::init_db(&conn).unwrap();
        let store = Arc::new(ConversationStore::new(conn));

        let index = Arc::new(FakeSearchIndex::failing("index unreachable"));
        let retrieval = Arc::new(RetrievalEngine::new(index, Arc::new(FakeEmbedder)));

        let orchestrator = Orchestrator::new(
            registry,
            overrides,
            retrieval,
            PromptManager::with_defaults(),
            RetryingCompleter::new(FakeChatCompleter::always_succeeds(
                "I don't have specific documentation for that, but generally...",
            )),
            store,
            platform.clone(),
            OrchestratorSettings::default(),
        );

        let event = InboundEvent {
            user: "U1".to_string(),
            channel: "C1".to_string(),
            channel_type: ChannelType::Channel,
            text: "What is the onboarding process?".to_string(),
        };

        let outcome = orchestrator.handle(event).await;
        match outcome {
            OrchestratorOutcome::Posted { text, .. } => {
                assert_eq!(text, "I don't have specific documentation for that, but generally...");
                assert!(!text.contains("Sources:"));
            }
            other => panic!("expected Posted (degraded, not an apology), got {other:?}"),
        }
    }
}
