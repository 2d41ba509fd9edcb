//! LLM Provider Strategy Pattern
//!
//! Defines a common interface for completion backends (OpenAI-compatible cloud
//! APIs, a local Ollama server, test doubles) so the orchestrator never knows
//! which one it is talking to.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use relay_core::provider::{CompletionRequest, LlmProvider};
//!
//! let provider = OpenAiProvider::new(config)?;
//! let completion = provider.complete(&request).await?;
//! ```

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::message::Message;
use crate::tool::ToolSchema;

/// Everything a backend needs for one completion
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct CompletionRequest {
    /// Model identifier (e.g. "gpt-4-turbo", "llama2")
    pub model: String,

    /// Conversation, system message first
    pub messages: Vec<Message>,

    /// Tool declarations; `None` means the request carries no tools at all
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tools: Option<Vec<ToolSchema>>,

    /// Sampling temperature
    pub temperature: f32,
}

/// A tool invocation requested by the model
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolCallRequest {
    /// Provider-assigned call id, when the backend issues one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    /// Tool name as the model wrote it
    pub name: String,

    /// Unparsed JSON argument text
    pub raw_arguments: String,
}

impl ToolCallRequest {
    pub fn new(name: impl Into<String>, raw_arguments: impl Into<String>) -> Self {
        Self {
            id: None,
            name: name.into(),
            raw_arguments: raw_arguments.into(),
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }
}

/// Response from an LLM completion
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Completion {
    /// Generated text; backends return null when they only request tools
    pub content: Option<String>,

    /// Requested tool invocations in the order the backend listed them
    #[serde(default)]
    pub tool_calls: Vec<ToolCallRequest>,

    /// Token usage statistics (if available)
    #[serde(default)]
    pub usage: Option<TokenUsage>,

    /// Finish reason
    #[serde(default)]
    pub finish_reason: Option<FinishReason>,
}

impl Completion {
    /// Plain text completion
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: Some(content.into()),
            finish_reason: Some(FinishReason::Stop),
            ..Default::default()
        }
    }

    /// Completion that requests the given tool calls
    pub fn with_tool_calls(content: Option<String>, tool_calls: Vec<ToolCallRequest>) -> Self {
        Self {
            content,
            tool_calls,
            finish_reason: Some(FinishReason::ToolUse),
            ..Default::default()
        }
    }

    /// Text content, empty when the backend sent none
    pub fn text_or_empty(&self) -> String {
        self.content.clone().unwrap_or_default()
    }
}

/// Token usage statistics
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

/// Reason for completion finishing
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum FinishReason {
    Stop,
    Length,
    ToolUse,
    ContentFilter,
    Error,
}

impl FinishReason {
    /// Map the wire strings used by OpenAI-compatible backends
    pub fn from_wire(reason: &str) -> Self {
        match reason {
            "stop" => FinishReason::Stop,
            "length" => FinishReason::Length,
            "tool_calls" | "function_call" => FinishReason::ToolUse,
            "content_filter" => FinishReason::ContentFilter,
            _ => FinishReason::Error,
        }
    }
}

/// Information about a model
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ModelInfo {
    pub id: String,
    pub name: String,
}

/// Strategy trait for LLM providers
///
/// Implement this trait to add support for new LLM backends.
/// The orchestrator works exclusively through this interface.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Short backend name for logs and health output
    fn name(&self) -> &str;

    /// Check if the provider is reachable and configured correctly
    async fn health_check(&self) -> Result<bool>;

    /// Generate a completion
    async fn complete(&self, request: &CompletionRequest) -> Result<Completion>;

    /// List available models
    async fn list_models(&self) -> Result<Vec<ModelInfo>> {
        Ok(Vec::new())
    }
}
