//! Tool System
//!
//! Named capabilities offered to the completion provider. Each tool declares a
//! JSON Schema for its arguments and an async handler; the orchestrator
//! invokes at most one of them per message.

use async_trait::async_trait;
use futures::future::{BoxFuture, FutureExt};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::collections::HashSet;
use std::future::Future;
use std::sync::Arc;

use crate::error::{AgentError, Result};

/// Tool declaration sent to the provider for function calling
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ToolSchema {
    /// Unique tool identifier
    pub name: String,

    /// Human-readable description (shown to LLM)
    pub description: String,

    /// JSON Schema object describing the arguments
    pub parameters: Value,
}

impl ToolSchema {
    pub fn new(name: impl Into<String>, description: impl Into<String>, parameters: Value) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            parameters,
        }
    }

    /// Schema for a tool that takes no arguments
    pub fn empty_parameters() -> Value {
        json!({
            "type": "object",
            "properties": {},
            "required": [],
        })
    }
}

/// Tool trait - implement to add new capabilities
#[async_trait]
pub trait Tool: Send + Sync {
    /// Get the tool's schema for LLM function calling
    fn schema(&self) -> ToolSchema;

    /// Run the tool with already-parsed arguments
    async fn call(&self, arguments: Value) -> Result<Value>;
}

/// Boxed async handler used by [`FunctionTool`]
pub type ToolHandler = Arc<dyn Fn(Value) -> BoxFuture<'static, Result<Value>> + Send + Sync>;

/// Tool built from a schema and a closure
#[derive(Clone)]
pub struct FunctionTool {
    schema: ToolSchema,
    handler: ToolHandler,
}

impl FunctionTool {
    pub fn new<F, Fut>(
        name: impl Into<String>,
        description: impl Into<String>,
        parameters: Value,
        handler: F,
    ) -> Self
    where
        F: Fn(Value) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value>> + Send + 'static,
    {
        Self {
            schema: ToolSchema::new(name, description, parameters),
            handler: Arc::new(move |args| handler(args).boxed()),
        }
    }
}

impl std::fmt::Debug for FunctionTool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FunctionTool")
            .field("name", &self.schema.name)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl Tool for FunctionTool {
    fn schema(&self) -> ToolSchema {
        self.schema.clone()
    }

    async fn call(&self, arguments: Value) -> Result<Value> {
        (self.handler)(arguments).await
    }
}

/// Ordered registry of available tools
///
/// Lookups return the first tool registered under a name, so a later
/// duplicate registration never shadows an earlier one.
#[derive(Clone, Default)]
pub struct ToolRegistry {
    tools: Vec<(String, Arc<dyn Tool>)>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a registry from a startup tool list, rejecting duplicate names
    pub fn from_tools(tools: Vec<Arc<dyn Tool>>) -> Result<Self> {
        let mut seen = HashSet::new();
        let mut registry = Self::new();

        for tool in tools {
            let name = tool.schema().name;
            if !seen.insert(name.clone()) {
                return Err(AgentError::Config(format!("Duplicate tool name: {}", name)));
            }
            registry.tools.push((name, tool));
        }

        Ok(registry)
    }

    /// Register a new tool
    pub fn register<T: Tool + 'static>(&mut self, tool: T) {
        self.register_arc(Arc::new(tool));
    }

    /// Register a shared tool
    pub fn register_arc(&mut self, tool: Arc<dyn Tool>) {
        let name = tool.schema().name;
        tracing::debug!(tool = %name, "Registered tool");
        self.tools.push((name, tool));
    }

    /// Get a tool by exact, case-sensitive name
    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools
            .iter()
            .find(|(registered, _)| registered == name)
            .map(|(_, tool)| tool.clone())
    }

    /// Tool schemas in registration order
    pub fn schemas(&self) -> Vec<ToolSchema> {
        self.tools.iter().map(|(_, t)| t.schema()).collect()
    }

    /// Get tool names
    pub fn names(&self) -> Vec<&str> {
        self.tools.iter().map(|(name, _)| name.as_str()).collect()
    }

    /// Number of registered tools
    pub fn len(&self) -> usize {
        self.tools.len()
    }

    /// Check if empty
    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

impl std::fmt::Debug for ToolRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.names()).finish()
    }
}

// ============================================================================
// Built-in Tools
// ============================================================================

/// Current local time
pub struct CurrentTimeTool;

#[async_trait]
impl Tool for CurrentTimeTool {
    fn schema(&self) -> ToolSchema {
        ToolSchema::new(
            "current_time",
            "Get the current time",
            ToolSchema::empty_parameters(),
        )
    }

    async fn call(&self, _arguments: Value) -> Result<Value> {
        let now = chrono::Local::now();
        Ok(json!({ "time": now.format("%d/%m/%Y, %H:%M:%S").to_string() }))
    }
}

/// Customer lookup placeholder until a CRM backend is wired in
pub struct CustomerInfoTool;

#[async_trait]
impl Tool for CustomerInfoTool {
    fn schema(&self) -> ToolSchema {
        ToolSchema::new(
            "search_customer_info",
            "Search for customer information",
            json!({
                "type": "object",
                "properties": {
                    "query": {
                        "type": "string",
                        "description": "Search query",
                    },
                },
                "required": ["query"],
            }),
        )
    }

    async fn call(&self, arguments: Value) -> Result<Value> {
        let query = arguments
            .get("query")
            .and_then(Value::as_str)
            .ok_or_else(|| AgentError::ToolExecution("Missing required parameter: query".into()))?;

        Ok(json!({ "result": format!("Información simulada para: {}", query) }))
    }
}

/// The tools every relay instance starts with
pub fn default_tools() -> Vec<Arc<dyn Tool>> {
    vec![Arc::new(CurrentTimeTool), Arc::new(CustomerInfoTool)]
}
