//! Error types for the Messenger channel.

use courier_core::CoreError;
use thiserror::Error;

/// Result alias using [`MessengerError`].
pub type Result<T> = std::result::Result<T, MessengerError>;

/// Errors raised by the Messenger client and channel internals.
#[derive(Debug, Error)]
pub enum MessengerError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Session error: {0}")]
    Session(String),

    #[error("GraphQL error: {0}")]
    GraphQl(String),

    #[error("Thread not found: {0}")]
    ThreadNotFound(String),

    #[error("Message not found: {0}")]
    MessageNotFound(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("API error: {0}")]
    Api(String),
}

impl MessengerError {
    pub fn session(msg: impl Into<String>) -> Self {
        MessengerError::Session(msg.into())
    }

    pub fn graphql(msg: impl Into<String>) -> Self {
        MessengerError::GraphQl(msg.into())
    }

    pub fn invalid_argument(msg: impl Into<String>) -> Self {
        MessengerError::InvalidArgument(msg.into())
    }

    pub fn api(msg: impl Into<String>) -> Self {
        MessengerError::Api(msg.into())
    }
}

impl From<MessengerError> for CoreError {
    fn from(err: MessengerError) -> Self {
        match err {
            MessengerError::ThreadNotFound(uid) => CoreError::ChatNotFound(uid),
            MessengerError::MessageNotFound(uid) => CoreError::MessageNotFound(uid),
            other => CoreError::Channel(other.to_string()),
        }
    }
}
