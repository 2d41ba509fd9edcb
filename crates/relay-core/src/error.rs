//! Error Types

use thiserror::Error;

/// Result type alias for agent operations
pub type Result<T> = std::result::Result<T, AgentError>;

/// Agent error types
#[derive(Error, Debug)]
pub enum AgentError {
    /// LLM provider error (bad status, malformed body, API error object)
    #[error("Provider error: {0}")]
    Provider(String),

    /// Provider unreachable
    #[error("Provider unavailable: {0}")]
    ProviderUnavailable(String),

    /// Provider rejected our credentials
    #[error("Authentication failed: {0}")]
    Auth(String),

    /// Provider quota or rate limit hit
    #[error("Rate limited: {0}")]
    RateLimited(String),

    /// Tool handler failed
    #[error("Tool execution error: {0}")]
    ToolExecution(String),

    /// Tool arguments could not be parsed
    #[error("Parse error: {0}")]
    Parse(String),

    /// Vector store / embedding failure outside the search path
    #[error("Knowledge base error: {0}")]
    KnowledgeBase(String),

    /// Invalid agent configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// JSON serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Other/unknown error
    #[error("{0}")]
    Other(String),
}

impl From<anyhow::Error> for AgentError {
    fn from(err: anyhow::Error) -> Self {
        AgentError::Other(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_anyhow_bridge_keeps_context() {
        let err: AgentError = anyhow::anyhow!("disk full").context("saving index").into();
        assert!(matches!(err, AgentError::Other(ref msg) if msg == "saving index"));
    }

    #[test]
    fn test_display_prefixes() {
        let err = AgentError::ToolExecution("boom".into());
        assert_eq!(err.to_string(), "Tool execution error: boom");
    }
}
