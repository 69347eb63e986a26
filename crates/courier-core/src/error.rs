//! Error types for the core crate.

use std::path::PathBuf;
use thiserror::Error;

/// Result alias using [`CoreError`].
pub type Result<T> = std::result::Result<T, CoreError>;

/// Errors surfaced by channel operations.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("Chat not found: {0}")]
    ChatNotFound(String),

    #[error("Message not found: {0}")]
    MessageNotFound(String),

    #[error("Operation not supported: {0}")]
    OperationNotSupported(String),

    #[error("Message type not supported: {0}")]
    MessageTypeNotSupported(String),

    #[error("Reaction not possible: {0}")]
    ReactionNotPossible(String),

    #[error("Delivery failed: {0}")]
    Delivery(String),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Channel-specific failure that does not map onto a common variant.
    #[error("Channel error: {0}")]
    Channel(String),
}

impl CoreError {
    pub fn chat_not_found(uid: impl std::fmt::Display) -> Self {
        CoreError::ChatNotFound(uid.to_string())
    }

    pub fn message_not_found(uid: impl std::fmt::Display) -> Self {
        CoreError::MessageNotFound(uid.to_string())
    }

    pub fn channel(msg: impl Into<String>) -> Self {
        CoreError::Channel(msg.into())
    }
}

/// Errors raised while loading or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Configuration file not found: {0}")]
    NotFound(PathBuf),

    #[error("Failed to parse configuration: {0}")]
    Parse(String),

    #[error("Failed to serialize configuration: {0}")]
    Serialize(String),

    #[error("Invalid configuration: {0}")]
    Validation(String),

    #[error("Could not determine home directory")]
    NoHomeDir,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = CoreError::chat_not_found("12345");
        assert_eq!(err.to_string(), "Chat not found: 12345");

        let err = CoreError::OperationNotSupported("reactions are inbound only".to_string());
        assert_eq!(
            err.to_string(),
            "Operation not supported: reactions are inbound only"
        );
    }

    #[test]
    fn test_config_error_into_core() {
        let err: CoreError = ConfigError::Validation("instance_id must not be empty".to_string()).into();
        assert!(matches!(err, CoreError::Config(_)));
    }
}
