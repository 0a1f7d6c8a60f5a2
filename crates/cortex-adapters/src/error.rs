use thiserror::Error;

use cortex_core::error::FailureClass;

/// Errors that can occur within any external adapter (messaging platform,
/// search index, embedder, or completion provider).
#[derive(Debug, Error)]
pub enum AdapterError {
    /// The underlying transport could not be established or timed out.
    #[error("connection failed: {0}")]
    ConnectionFailed(String),

    /// A message could not be delivered to the remote endpoint.
    #[error("send failed: {0}")]
    SendFailed(String),

    /// The adapter rejected the supplied credentials or token.
    #[error("authentication failed: {0}")]
    AuthFailed(String),

    /// An operation exceeded its allowed time budget.
    #[error("operation timed out after {ms}ms")]
    Timeout { ms: u64 },

    /// The remote service rejected the request as malformed.
    #[error("bad request: {0}")]
    BadRequest(String),

    /// The remote service is throttling this client.
    #[error("rate limited")]
    RateLimited,

    /// The adapter-specific configuration is invalid or missing.
    #[error("configuration error: {0}")]
    ConfigError(String),

    /// Anything else the adapter can't classify more precisely.
    #[error("adapter error: {0}")]
    Other(String),
}

impl AdapterError {
    /// Classify this error for the completion client's retry policy.
    pub fn failure_class(&self) -> FailureClass {
        match self {
            AdapterError::RateLimited => FailureClass::RateLimited,
            AdapterError::Timeout { .. } => FailureClass::Timeout,
            AdapterError::AuthFailed(_) => FailureClass::Authentication,
            AdapterError::BadRequest(_) => FailureClass::BadRequest,
            AdapterError::ConnectionFailed(_) => FailureClass::Timeout,
            AdapterError::SendFailed(_) | AdapterError::ConfigError(_) | AdapterError::Other(_) => {
                FailureClass::Unknown
            }
        }
    }
}
