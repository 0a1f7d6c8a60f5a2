use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use uuid::Uuid;

/// Opaque conversation identifier (UUIDv7 — time-sortable, matches the
/// rest of this codebase's identifier convention).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ConversationId(pub String);

impl ConversationId {
    pub fn new() -> Self {
        Self(Uuid::now_v7().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for ConversationId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ConversationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for ConversationId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for ConversationId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// A conversation record. Owned by the conversation store; lifetime ends on
/// explicit deletion.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Conversation {
    pub id: ConversationId,
    pub owner: Option<String>,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub updated_at: chrono::DateTime<chrono::Utc>,
    #[serde(default)]
    pub metadata: HashMap<String, serde_json::Value>,
}

/// Role of a message author. Internal roles map onto completion-API roles
/// at the point of context projection; unknown internal roles default to
/// `User` there (see `cortex-memory::context`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    User,
    Assistant,
    System,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::User => write!(f, "User"),
            Role::Assistant => write!(f, "Assistant"),
            Role::System => write!(f, "System"),
        }
    }
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
            Role::System => "system",
        }
    }

    pub fn parse(s: &str) -> Role {
        match s {
            "assistant" => Role::Assistant,
            "system" => Role::System,
            _ => Role::User,
        }
    }
}

/// Append-only message within a conversation. Ordering by `created_at` is
/// total and stable; ties are broken by `seq`, an auto-incrementing
/// insertion counter assigned by the durable tier.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub id: i64,
    pub conversation_id: ConversationId,
    pub role: Role,
    pub content: String,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub seq: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<serde_json::Value>,
}

/// A single named entry point within a skill, selected by lexical pattern
/// on the utterance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FunctionDescriptor {
    pub name: String,
    pub description: String,
}

/// A registered capability. Immutable after registration except by
/// replacement-by-reregistration (same name).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SkillDescriptor {
    pub name: String,
    pub description: String,
    pub keywords: Vec<String>,
    pub functions: Vec<FunctionDescriptor>,
    /// Whether any function of this skill consults the retrieval engine.
    /// Used by the orchestrator to decide whether the RETRIEVED transition
    /// runs at all.
    pub retrieval_aware: bool,
}

/// A fragment of an indexed source document returned by the search index.
/// Emitted by retrieval; never persisted by the core.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalChunk {
    pub document_id: String,
    pub chunk_index: u32,
    pub content: String,
    pub citation: String,
    pub page: Option<u32>,
    pub score: f32,
    pub reranker_score: Option<f32>,
    #[serde(default)]
    pub highlights: Vec<String>,
    #[serde(default)]
    pub metadata: HashMap<String, serde_json::Value>,
}

/// Named pair of system/user prompt templates with named `{slot}` placeholders.
#[derive(Debug, Clone)]
pub struct PromptTemplate {
    pub name: String,
    pub system: String,
    pub user: String,
}

/// The tuple used only for redelivery dedup. Ephemeral — retained in a
/// bounded LRU, never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EventFingerprint {
    pub event_id: String,
    pub ts: String,
    pub client_msg_id: String,
    pub user: String,
    pub content_hash: String,
}

/// Shape requested from the conversation store's `get_context` operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContextFormat {
    /// `"{Role}: {content}\n"` lines, oldest first.
    String,
    /// Raw message objects, oldest first.
    Dict,
    /// `{role, content}` pairs with roles mapped onto {user, assistant, system}.
    Completion,
}
