use thiserror::Error;

/// Classification attached to a [`CortexError::CompletionFailed`], so the
/// orchestrator can pick a user-visible wording without re-inspecting the
/// underlying transport error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureClass {
    RateLimited,
    Timeout,
    Authentication,
    BadRequest,
    Unknown,
}

/// Top-level error taxonomy for the orchestration pipeline.
///
/// These are *kinds*, not a 1:1 mirror of every adapter's own error type —
/// adapter errors are classified into one of these at the boundary where
/// they cross into the orchestrator (see `cortex-pipeline::orchestrator`).
#[derive(Debug, Error)]
pub enum CortexError {
    #[error("invalid signature")]
    InvalidSignature,

    #[error("malformed request body: {0}")]
    MalformedBody(String),

    #[error("rate limited")]
    RateLimited,

    #[error("no skill matched the utterance")]
    NoSkillMatched,

    #[error("retrieval returned no results")]
    RetrievalEmpty,

    #[error("retrieval index unavailable: {0}")]
    RetrievalUnavailable(String),

    #[error("completion failed: {message}")]
    CompletionFailed {
        class: FailureClass,
        message: String,
    },

    #[error("conversation store unavailable: {0}")]
    ConversationStoreUnavailable(String),

    /// A dependency the request needs is reachable but degraded (e.g. the
    /// durable conversation store fell back to an in-memory connection at
    /// startup). Distinct from the hard per-call failures above: this is
    /// surfaced in logs and health checks, not necessarily to the caller.
    #[error("service degraded: {0}")]
    ServiceDegraded(String),

    #[error("failed to post to platform: {0}")]
    PlatformPostFailed(String),

    #[error("request deadline exceeded")]
    DeadlineExceeded,

    #[error("template slot missing: {0}")]
    TemplateSlotMissing(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl CortexError {
    /// Short stable code used in structured log fields.
    pub fn code(&self) -> &'static str {
        match self {
            CortexError::InvalidSignature => "INVALID_SIGNATURE",
            CortexError::MalformedBody(_) => "MALFORMED_BODY",
            CortexError::RateLimited => "RATE_LIMITED",
            CortexError::NoSkillMatched => "NO_SKILL_MATCHED",
            CortexError::RetrievalEmpty => "RETRIEVAL_EMPTY",
            CortexError::RetrievalUnavailable(_) => "RETRIEVAL_UNAVAILABLE",
            CortexError::CompletionFailed { .. } => "COMPLETION_FAILED",
            CortexError::ConversationStoreUnavailable(_) => "CONVERSATION_STORE_UNAVAILABLE",
            CortexError::ServiceDegraded(_) => "SERVICE_DEGRADED",
            CortexError::PlatformPostFailed(_) => "PLATFORM_POST_FAILED",
            CortexError::DeadlineExceeded => "DEADLINE_EXCEEDED",
            CortexError::TemplateSlotMissing(_) => "TEMPLATE_SLOT_MISSING",
            CortexError::Config(_) => "CONFIG_ERROR",
            CortexError::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// User-visible apology wording (§7): echo the reason for malformed
    /// input, say "timed out" for timeouts, otherwise a generic apology.
    pub fn user_message(&self) -> String {
        match self {
            CortexError::DeadlineExceeded => "That took too long, please try again.".to_string(),
            CortexError::CompletionFailed {
                class: FailureClass::Timeout,
                ..
            } => "That timed out, please try again.".to_string(),
            CortexError::CompletionFailed {
                class: FailureClass::RateLimited,
                ..
            } => "I'm getting rate limited right now, please try again in a moment.".to_string(),
            CortexError::MalformedBody(reason) => reason.clone(),
            CortexError::RetrievalEmpty => {
                "I couldn't find any relevant information for that.".to_string()
            }
            _ => "Please try again or contact support.".to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, CortexError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deadline_exceeded_message() {
        assert!(CortexError::DeadlineExceeded.user_message().contains("too long"));
    }

    #[test]
    fn unknown_errors_get_generic_apology() {
        let e = CortexError::Internal("boom".to_string());
        assert_eq!(e.user_message(), "Please try again or contact support.");
    }
}
