//! # relay-core
//!
//! Conversation orchestration for the chat relay: a provider-agnostic LLM
//! abstraction, a context retriever seam, and a registry of tools the model
//! may invoke once per message.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                           Agent                              │
//! │  ┌──────────────────┐  ┌─────────────┐  ┌─────────────────┐  │
//! │  │ ContextRetriever │──│ Orchestrator│──│   LlmProvider   │  │
//! │  │   (optional)     │  │             │  │   (Strategy)    │  │
//! │  └──────────────────┘  └──────┬──────┘  └─────────────────┘  │
//! │                               │                              │
//! │                        ┌──────┴──────┐                       │
//! │                        │ToolRegistry │                       │
//! │                        └─────────────┘                       │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! The `LlmProvider` trait lets the relay switch between a cloud API and a
//! local Ollama server without touching the orchestration flow.

pub mod error;
pub mod message;
pub mod orchestrator;
pub mod provider;
pub mod retriever;
pub mod tool;

pub use error::{AgentError, Result};
pub use message::{Conversation, Message, Role};
pub use orchestrator::{Agent, AgentBuilder, AgentConfig};
pub use provider::{Completion, CompletionRequest, LlmProvider, ToolCallRequest};
pub use retriever::{ContextRetriever, DocumentStore};
pub use tool::{FunctionTool, Tool, ToolRegistry, ToolSchema};
