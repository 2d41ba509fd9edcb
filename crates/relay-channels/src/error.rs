//! Channel Error Types

use thiserror::Error;

/// Result type alias
pub type Result<T> = std::result::Result<T, ChannelError>;

/// Messaging-channel errors
#[derive(Error, Debug)]
pub enum ChannelError {
    /// Webhook body did not have the expected shape
    #[error("Invalid webhook payload: {0}")]
    InvalidPayload(String),

    /// Webhook signature or secret token did not match
    #[error("Webhook signature invalid: {0}")]
    Signature(String),

    /// Outbound request could not be sent
    #[error("HTTP error: {0}")]
    Http(String),

    /// Channel API answered with a non-success status
    #[error("{channel} API returned {status}: {body}")]
    Api {
        channel: &'static str,
        status: u16,
        body: String,
    },

    /// Missing credentials or settings
    #[error("Configuration error: {0}")]
    Config(String),

    /// JSON serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl ChannelError {
    /// Get user-friendly message
    pub fn user_message(&self) -> &str {
        match self {
            ChannelError::InvalidPayload(_) | ChannelError::Json(_) => {
                "Formato de webhook inválido"
            }
            ChannelError::Signature(_) => "Firma de webhook inválida",
            _ => "Error al enviar el mensaje",
        }
    }
}

impl From<reqwest::Error> for ChannelError {
    fn from(err: reqwest::Error) -> Self {
        ChannelError::Http(err.to_string())
    }
}
