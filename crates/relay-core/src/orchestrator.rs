//! Conversation Orchestrator
//!
//! Turns one `(user_id, message)` pair into one text reply:
//!
//! ```text
//! persona (+ context) ─▶ provider ─┬─▶ text reply
//!                                  └─▶ first tool call ─▶ handler ─▶ provider ─▶ text reply
//! ```
//!
//! There is no loop: a tool result gets exactly one follow-up completion,
//! and whatever that completion says is the reply.

use std::sync::Arc;

use serde_json::{Value, json};

use crate::error::{AgentError, Result};
use crate::message::{Conversation, Message};
use crate::provider::{Completion, CompletionRequest, LlmProvider, ToolCallRequest};
use crate::retriever::{ContextRetriever, DEFAULT_CONTEXT_LIMIT};
use crate::tool::{Tool, ToolRegistry};

const CONTEXT_PREAMBLE: &str = "\n\nUsa esta información contextual cuando sea relevante: ";

/// Accepted sampling temperature range
pub const TEMPERATURE_RANGE: std::ops::RangeInclusive<f32> = 0.0..=2.0;

/// Persona and model settings, fixed for the lifetime of an [`Agent`]
#[derive(Clone, Debug, PartialEq)]
pub struct AgentConfig {
    /// Persona name used in the system prompt
    pub name: String,

    /// Persona description used in the system prompt
    pub description: String,

    /// Model identifier passed to the provider
    pub model: String,

    /// Sampling temperature
    pub temperature: f32,

    /// Look up per-user context before calling the provider
    pub use_knowledge_base: bool,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            name: "Asistente IA".into(),
            description: "Un asistente inteligente que puede responder preguntas y realizar tareas."
                .into(),
            model: "gpt-4-turbo".into(),
            temperature: 0.7,
            use_knowledge_base: true,
        }
    }
}

impl AgentConfig {
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(AgentError::Config("Agent name must not be empty".into()));
        }
        if self.model.trim().is_empty() {
            return Err(AgentError::Config("Model identifier must not be empty".into()));
        }
        if !TEMPERATURE_RANGE.contains(&self.temperature) {
            return Err(AgentError::Config(format!(
                "Temperature {} outside {:?}",
                self.temperature, TEMPERATURE_RANGE
            )));
        }
        Ok(())
    }

    /// `"Eres {name}, {description}"`
    pub fn persona_prompt(&self) -> String {
        format!("Eres {}, {}", self.name, self.description)
    }
}

/// Text appended to the persona when the retriever found something
pub fn context_block(context: &str) -> String {
    format!(
        "{}Información relevante del cliente: {}\n\n",
        CONTEXT_PREAMBLE, context
    )
}

/// Reply sent when a tool handler fails
pub fn tool_failure_reply(tool_name: &str) -> String {
    format!(
        "Error al ejecutar la herramienta {}. Por favor, inténtalo de nuevo.",
        tool_name
    )
}

/// The conversation orchestrator
pub struct Agent {
    provider: Arc<dyn LlmProvider>,
    retriever: Option<Arc<dyn ContextRetriever>>,
    tools: ToolRegistry,
    config: AgentConfig,
}

impl Agent {
    pub fn builder() -> AgentBuilder {
        AgentBuilder::new()
    }

    /// Append a tool after construction. Call only during startup; lookups
    /// keep resolving to the first tool registered under a name.
    pub fn register_tool<T: Tool + 'static>(&mut self, tool: T) {
        self.tools.register(tool);
    }

    /// Build the system prompt for one message
    pub async fn build_system_prompt(&self, user_id: &str, message: &str) -> String {
        let mut prompt = self.config.persona_prompt();

        if self.config.use_knowledge_base {
            if let Some(retriever) = &self.retriever {
                let context = retriever.search(message, user_id, DEFAULT_CONTEXT_LIMIT).await;
                if !context.is_empty() {
                    tracing::debug!(user_id, bytes = context.len(), "Injecting retrieved context");
                    prompt.push_str(&context_block(&context));
                }
            }
        }

        prompt
    }

    /// Produce a single text reply for one inbound message
    pub async fn process_message(&self, user_id: &str, message: &str) -> Result<String> {
        let mut conversation =
            Conversation::with_system_prompt(self.build_system_prompt(user_id, message).await);
        conversation.push(Message::user(message));

        let tools = if self.tools.is_empty() {
            None
        } else {
            Some(self.tools.schemas())
        };

        let completion = self
            .provider
            .complete(&self.request(&conversation, tools))
            .await
            .inspect_err(|e| tracing::error!(user_id, error = %e, "Completion failed"))?;

        let Some(call) = completion.tool_calls.first() else {
            return Ok(completion.text_or_empty());
        };

        if completion.tool_calls.len() > 1 {
            tracing::debug!(
                requested = completion.tool_calls.len(),
                "Only the first tool call is dispatched"
            );
        }

        self.dispatch_tool(conversation, call, &completion).await
    }

    async fn dispatch_tool(
        &self,
        mut conversation: Conversation,
        call: &ToolCallRequest,
        completion: &Completion,
    ) -> Result<String> {
        let Some(tool) = self.tools.get(&call.name) else {
            tracing::warn!(tool = %call.name, "Model requested an unregistered tool");
            return Ok(completion.text_or_empty());
        };

        let arguments = parse_arguments(&call.raw_arguments)?;
        tracing::debug!(tool = %call.name, "Executing tool");

        let output = match tool.call(arguments).await {
            Ok(output) => output,
            Err(e) => {
                tracing::error!(tool = %call.name, error = %e, "Tool execution failed");
                return Ok(tool_failure_reply(&call.name));
            }
        };

        conversation.push(Message::assistant(""));
        conversation.push(Message::function(&call.name, serde_json::to_string(&output)?));

        let follow_up = self
            .provider
            .complete(&self.request(&conversation, None))
            .await
            .inspect_err(|e| {
                tracing::error!(tool = %call.name, error = %e, "Follow-up completion failed");
            })?;

        Ok(follow_up.text_or_empty())
    }

    fn request(
        &self,
        conversation: &Conversation,
        tools: Option<Vec<crate::tool::ToolSchema>>,
    ) -> CompletionRequest {
        CompletionRequest {
            model: self.config.model.clone(),
            messages: conversation.messages().to_vec(),
            tools,
            temperature: self.config.temperature,
        }
    }

    /// Get the tool registry
    pub fn tools(&self) -> &ToolRegistry {
        &self.tools
    }

    /// Get configuration
    pub fn config(&self) -> &AgentConfig {
        &self.config
    }

    /// The completion backend
    pub fn provider(&self) -> &Arc<dyn LlmProvider> {
        &self.provider
    }
}

/// Tool arguments arrive as JSON text; an empty string means "no arguments"
fn parse_arguments(raw: &str) -> Result<Value> {
    if raw.trim().is_empty() {
        return Ok(json!({}));
    }
    serde_json::from_str(raw)
        .map_err(|e| AgentError::Parse(format!("Invalid tool arguments: {}", e)))
}

/// Builder for [`Agent`]
pub struct AgentBuilder {
    provider: Option<Arc<dyn LlmProvider>>,
    retriever: Option<Arc<dyn ContextRetriever>>,
    tools: Vec<Arc<dyn Tool>>,
    config: AgentConfig,
}

impl Default for AgentBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl AgentBuilder {
    pub fn new() -> Self {
        Self {
            provider: None,
            retriever: None,
            tools: Vec::new(),
            config: AgentConfig::default(),
        }
    }

    pub fn provider(mut self, provider: Arc<dyn LlmProvider>) -> Self {
        self.provider = Some(provider);
        self
    }

    pub fn retriever(mut self, retriever: Arc<dyn ContextRetriever>) -> Self {
        self.retriever = Some(retriever);
        self
    }

    pub fn tool<T: Tool + 'static>(mut self, tool: T) -> Self {
        self.tools.push(Arc::new(tool));
        self
    }

    pub fn tools(mut self, tools: Vec<Arc<dyn Tool>>) -> Self {
        self.tools.extend(tools);
        self
    }

    pub fn config(mut self, config: AgentConfig) -> Self {
        self.config = config;
        self
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.config.name = name.into();
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.config.description = description.into();
        self
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.model = model.into();
        self
    }

    pub fn temperature(mut self, temp: f32) -> Self {
        self.config.temperature = temp;
        self
    }

    pub fn use_knowledge_base(mut self, enabled: bool) -> Self {
        self.config.use_knowledge_base = enabled;
        self
    }

    pub fn build(self) -> Result<Agent> {
        let provider = self
            .provider
            .ok_or_else(|| AgentError::Config("Provider is required".into()))?;

        self.config.validate()?;

        if self.config.use_knowledge_base && self.retriever.is_none() {
            return Err(AgentError::Config(
                "Knowledge base enabled but no context retriever configured".into(),
            ));
        }

        Ok(Agent {
            provider,
            retriever: self.retriever,
            tools: ToolRegistry::from_tools(self.tools)?,
            config: self.config,
        })
    }
}
