//! Error types for telegram-client.

use thiserror::Error;

/// Errors that can occur when talking to the Bot API.
#[derive(Debug, Error)]
pub enum BotError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON serialization/deserialization failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The API answered `ok: false`.
    #[error("API error {code}: {description}")]
    Api { code: i64, description: String },

    /// Invalid configuration.
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// Reading a local file to upload failed.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<BotError> for bot_core::SendError {
    fn from(e: BotError) -> Self {
        match e {
            BotError::Api { code, description } => {
                bot_core::SendError::Rejected(format!("{}: {}", code, description))
            }
            other => bot_core::SendError::Transport(other.to_string()),
        }
    }
}
