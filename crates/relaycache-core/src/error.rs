use thiserror::Error;

/// Core error types for relaycache
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("JSON decode error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("MessagePack decode error: {0}")]
    MessagePackError(#[from] rmp_serde::decode::Error),

    #[error("Payload is not a JSON object")]
    NotAnObject,
}

impl CoreError {
    /// Create a new Configuration error
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration(message.into())
    }

    /// Check if this error came from decoding a payload
    pub fn is_decode_error(&self) -> bool {
        matches!(
            self,
            Self::JsonError(_) | Self::MessagePackError(_) | Self::NotAnObject
        )
    }
}

pub type Result<T> = std::result::Result<T, CoreError>;
