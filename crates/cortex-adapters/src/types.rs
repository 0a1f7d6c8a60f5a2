use serde::{Deserialize, Serialize};

/// A message to be delivered to the messaging platform.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutboundMessage {
    /// Platform-native identifier for the recipient (channel id, user id, …).
    pub recipient_id: String,

    /// Content to deliver.
    pub content: String,

    /// Formatting hint for the target platform.
    pub format: MessageFormat,

    /// Opaque id of the event this message is replying to, when the
    /// platform supports threaded replies.
    pub in_reply_to: Option<String>,

    /// Rich block-kit-style rendering (§6): each element is an object with
    /// `type ∈ {header, section, divider, context}` and, for header/section/
    /// context, a nested `text` object (`type ∈ {plain_text, mrkdwn}`,
    /// `text`). `None` when the caller only produced plain text.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub blocks: Option<Vec<serde_json::Value>>,
}

/// Formatting hint for outbound message content.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageFormat {
    #[default]
    PlainText,
    Markdown,
}

/// A single role/content turn handed to the completion provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletionTurn {
    pub role: String,
    pub content: String,
}

/// Result of a single completion call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletionResult {
    pub content: String,
    pub tokens_in: Option<u32>,
    pub tokens_out: Option<u32>,
}
