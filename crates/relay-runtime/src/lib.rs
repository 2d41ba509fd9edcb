//! # relay-runtime
//!
//! Concrete collaborators for the relay orchestrator.
//!
//! ## Providers
//!
//! - **OpenAI** (default backend): chat completions with function calling
//! - **Ollama** (`ollama` feature, on by default): local inference
//!
//! ## Retrieval
//!
//! - **Qdrant**: per-user snippet store used as the `ContextRetriever`
//!
//! ## Usage
//!
//! ```rust,ignore
//! use relay_runtime::{OpenAiConfig, OpenAiProvider, QdrantConfig, QdrantKnowledgeBase};
//!
//! let provider = Arc::new(OpenAiProvider::new(OpenAiConfig { api_key, ..Default::default() })?);
//! let knowledge = Arc::new(QdrantKnowledgeBase::new(QdrantConfig::default(), provider.clone())?);
//! let agent = Agent::builder()
//!     .provider(provider)
//!     .retriever(knowledge)
//!     .build()?;
//! ```

mod http;

pub mod embedding;
pub mod openai;
pub mod qdrant;

#[cfg(feature = "ollama")]
pub mod ollama;

pub use embedding::Embedder;
pub use openai::{OpenAiConfig, OpenAiProvider};
pub use qdrant::{QdrantConfig, QdrantKnowledgeBase};

#[cfg(feature = "ollama")]
pub use ollama::{OllamaConfig, OllamaProvider};

// Re-export core types for convenience
pub use relay_core::{
    Agent, AgentConfig, AgentError, ContextRetriever, DocumentStore, LlmProvider, Message, Result,
    Role, Tool, ToolRegistry,
};
