use thiserror::Error;

use matcha_types::UserId;

pub type Result<T> = std::result::Result<T, ClientError>;

#[derive(Debug, Error)]
pub enum ClientError {
    /// Transport-level failure (connect, timeout, body read)
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Non-2xx response
    #[error("Server returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    /// The peer is a match nobody has written to yet
    #[error("No conversation exists yet with user {0}")]
    NoConversation(UserId),

    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    #[error("Invalid URL: {0}")]
    Url(#[from] url::ParseError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("No conversation is open")]
    NoActiveConversation,
}

impl ClientError {
    /// Failures that the background loops swallow and retry on their next tick.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Http(_) | Self::Status { .. } | Self::WebSocket(_))
    }
}
