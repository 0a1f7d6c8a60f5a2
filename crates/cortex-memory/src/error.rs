use thiserror::Error;

#[derive(Debug, Error)]
pub enum MemoryError {
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("conversation not found: {0}")]
    NotFound(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl From<MemoryError> for cortex_core::CortexError {
    fn from(e: MemoryError) -> Self {
        cortex_core::CortexError::ConversationStoreUnavailable(e.to_string())
    }
}
