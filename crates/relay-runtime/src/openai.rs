//! OpenAI-compatible Provider
//!
//! Implementation of `LlmProvider` and `Embedder` for the chat-completions
//! and embeddings endpoints of OpenAI (or any API speaking the same dialect).

use async_trait::async_trait;
use relay_core::{
    AgentError, Message, Result,
    provider::{
        Completion, CompletionRequest, FinishReason, LlmProvider, ModelInfo, TokenUsage,
        ToolCallRequest,
    },
    tool::ToolSchema,
};
use reqwest::Client;
use serde_json::{Value, json};

use crate::embedding::Embedder;
use crate::http::{build_client, json_body, transport_error};

const SERVICE: &str = "OpenAI";

/// OpenAI provider configuration
#[derive(Clone, Debug)]
pub struct OpenAiConfig {
    /// API base URL, without the `/v1` suffix
    pub base_url: String,

    /// Bearer token
    pub api_key: String,

    /// Model used for embeddings
    pub embedding_model: String,

    /// Request timeout in seconds
    pub timeout_secs: u64,
}

impl Default for OpenAiConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.openai.com".into(),
            api_key: String::new(),
            embedding_model: "text-embedding-ada-002".into(),
            timeout_secs: 600,
        }
    }
}

/// OpenAI LLM provider
pub struct OpenAiProvider {
    client: Client,
    config: OpenAiConfig,
}

impl OpenAiProvider {
    pub fn new(config: OpenAiConfig) -> Result<Self> {
        if config.api_key.is_empty() {
            return Err(AgentError::Config("OPENAI_API_KEY is not set".into()));
        }

        Ok(Self {
            client: build_client(config.timeout_secs)?,
            config,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/v1/{}", self.config.base_url.trim_end_matches('/'), path)
    }

    async fn post(&self, path: &str, payload: &Value) -> Result<Value> {
        let response = self
            .client
            .post(self.url(path))
            .bearer_auth(&self.config.api_key)
            .json(payload)
            .send()
            .await
            .map_err(|e| transport_error(SERVICE, &e))?;

        let body = json_body(SERVICE, response).await?;

        if let Some(error) = body.get("error") {
            return Err(AgentError::Provider(format!("{} API error: {}", SERVICE, error)));
        }

        Ok(body)
    }

    fn messages_to_wire(messages: &[Message]) -> Vec<Value> {
        messages
            .iter()
            .map(|m| {
                let mut wire = json!({
                    "role": m.role.to_string(),
                    "content": m.content,
                });
                if let Some(name) = &m.name {
                    wire["name"] = json!(name);
                }
                wire
            })
            .collect()
    }

    fn tools_to_wire(tools: &[ToolSchema]) -> Vec<Value> {
        tools
            .iter()
            .map(|t| {
                json!({
                    "type": "function",
                    "function": {
                        "name": t.name,
                        "description": t.description,
                        "parameters": t.parameters,
                    }
                })
            })
            .collect()
    }

    fn build_payload(request: &CompletionRequest) -> Value {
        let mut payload = json!({
            "model": request.model,
            "messages": Self::messages_to_wire(&request.messages),
            "temperature": request.temperature,
        });

        if let Some(tools) = request.tools.as_deref().filter(|t| !t.is_empty()) {
            payload["tools"] = json!(Self::tools_to_wire(tools));
        }

        payload
    }

    /// Convert a chat-completions response body
    fn parse_completion(body: &Value) -> Result<Completion> {
        let choice = body
            .get("choices")
            .and_then(|c| c.get(0))
            .ok_or_else(|| AgentError::Provider(format!("{}: response has no choices", SERVICE)))?;

        let message = &choice["message"];

        let mut tool_calls: Vec<ToolCallRequest> = message
            .get("tool_calls")
            .and_then(Value::as_array)
            .map(|calls| calls.iter().filter_map(Self::parse_tool_call).collect())
            .unwrap_or_default();

        // Legacy single function_call responses
        if tool_calls.is_empty() {
            if let Some(call) = message.get("function_call").and_then(Self::parse_function) {
                tool_calls.push(call);
            }
        }

        let usage = body.get("usage").map(|u| {
            let count = |key: &str| u.get(key).and_then(Value::as_u64).unwrap_or(0) as u32;
            TokenUsage {
                prompt_tokens: count("prompt_tokens"),
                completion_tokens: count("completion_tokens"),
                total_tokens: count("total_tokens"),
            }
        });

        Ok(Completion {
            content: message.get("content").and_then(Value::as_str).map(str::to_owned),
            tool_calls,
            usage,
            finish_reason: choice
                .get("finish_reason")
                .and_then(Value::as_str)
                .map(FinishReason::from_wire),
        })
    }

    fn parse_tool_call(call: &Value) -> Option<ToolCallRequest> {
        let mut parsed = Self::parse_function(call.get("function")?)?;
        if let Some(id) = call.get("id").and_then(Value::as_str) {
            parsed = parsed.with_id(id);
        }
        Some(parsed)
    }

    fn parse_function(function: &Value) -> Option<ToolCallRequest> {
        let name = function.get("name")?.as_str()?;
        let arguments = match function.get("arguments") {
            Some(Value::String(raw)) => raw.clone(),
            Some(Value::Null) | None => String::new(),
            Some(other) => other.to_string(),
        };
        Some(ToolCallRequest::new(name, arguments))
    }
}

#[async_trait]
impl LlmProvider for OpenAiProvider {
    fn name(&self) -> &str {
        "openai"
    }

    async fn health_check(&self) -> Result<bool> {
        match self.list_models().await {
            Ok(_) => Ok(true),
            Err(e) => {
                tracing::warn!("OpenAI health check failed: {}", e);
                Ok(false)
            }
        }
    }

    async fn complete(&self, request: &CompletionRequest) -> Result<Completion> {
        let payload = Self::build_payload(request);
        tracing::debug!(
            model = %request.model,
            messages = request.messages.len(),
            tools = request.tools.as_ref().map_or(0, Vec::len),
            "OpenAI chat completion"
        );

        let body = self.post("chat/completions", &payload).await?;
        Self::parse_completion(&body)
    }

    async fn list_models(&self) -> Result<Vec<ModelInfo>> {
        let response = self
            .client
            .get(self.url("models"))
            .bearer_auth(&self.config.api_key)
            .send()
            .await
            .map_err(|e| transport_error(SERVICE, &e))?;

        let body = json_body(SERVICE, response).await?;

        Ok(body["data"]
            .as_array()
            .map(|models| {
                models
                    .iter()
                    .filter_map(|m| m.get("id").and_then(Value::as_str))
                    .map(|id| ModelInfo {
                        id: id.to_owned(),
                        name: id.to_owned(),
                    })
                    .collect()
            })
            .unwrap_or_default())
    }
}

#[async_trait]
impl Embedder for OpenAiProvider {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let payload = json!({
            "model": self.config.embedding_model,
            "input": text,
        });

        let body = self.post("embeddings", &payload).await?;

        body["data"][0]["embedding"]
            .as_array()
            .map(|values| values.iter().filter_map(Value::as_f64).map(|v| v as f32).collect())
            .ok_or_else(|| AgentError::Provider(format!("{}: response has no embedding", SERVICE)))
    }
}
