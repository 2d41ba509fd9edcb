//! Ollama LLM Provider
//!
//! Implementation of `LlmProvider` and `Embedder` for a locally hosted
//! Ollama server, speaking its `/api/chat` and `/api/embeddings` endpoints.

use async_trait::async_trait;
use relay_core::{
    AgentError, Message, Result, Role,
    provider::{
        Completion, CompletionRequest, FinishReason, LlmProvider, ModelInfo, TokenUsage,
        ToolCallRequest,
    },
};
use reqwest::Client;
use serde_json::{Value, json};

use crate::embedding::Embedder;
use crate::http::{build_client, json_body, transport_error};

const SERVICE: &str = "Ollama";

/// Ollama provider configuration
#[derive(Clone, Debug)]
pub struct OllamaConfig {
    /// Ollama base URL
    pub base_url: String,

    /// Model used for embeddings
    pub embedding_model: String,

    /// Nucleus sampling passed with every chat request
    pub top_p: f32,

    /// Request timeout in seconds
    pub timeout_secs: u64,
}

impl Default for OllamaConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:11434".into(),
            embedding_model: "llama2".into(),
            top_p: 0.9,
            timeout_secs: 120,
        }
    }
}

/// Ollama LLM provider
pub struct OllamaProvider {
    client: Client,
    config: OllamaConfig,
}

impl OllamaProvider {
    /// Create from configuration
    pub fn from_config(config: OllamaConfig) -> Result<Self> {
        Ok(Self {
            client: build_client(config.timeout_secs)?,
            config,
        })
    }

    /// Create with default localhost settings
    pub fn localhost() -> Result<Self> {
        Self::from_config(OllamaConfig::default())
    }

    fn url(&self, path: &str) -> String {
        format!("{}/api/{}", self.config.base_url.trim_end_matches('/'), path)
    }

    /// Convert messages to Ollama format
    fn convert_messages(messages: &[Message]) -> Vec<Value> {
        messages
            .iter()
            .map(|m| {
                let role = match m.role {
                    Role::System => "system",
                    Role::User => "user",
                    Role::Assistant => "assistant",
                    Role::Function => "tool",
                };
                json!({ "role": role, "content": m.content })
            })
            .collect()
    }

    fn build_payload(&self, request: &CompletionRequest) -> Value {
        let mut payload = json!({
            "model": request.model,
            "messages": Self::convert_messages(&request.messages),
            "stream": false,
            "options": {
                "temperature": request.temperature,
                "top_p": self.config.top_p,
            },
        });

        if let Some(tools) = request.tools.as_deref().filter(|t| !t.is_empty()) {
            payload["tools"] = tools
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
                .collect();
        }

        payload
    }

    /// Convert Ollama response to a completion
    fn convert_completion(body: &Value) -> Result<Completion> {
        let message = body.get("message").ok_or_else(|| {
            AgentError::Provider(format!("{}: unexpected response format", SERVICE))
        })?;

        // Ollama hands back argument objects; the orchestrator expects raw text
        let tool_calls = message
            .get("tool_calls")
            .and_then(Value::as_array)
            .map(|calls| {
                calls
                    .iter()
                    .filter_map(|call| {
                        let function = call.get("function")?;
                        let name = function.get("name")?.as_str()?;
                        let arguments = match function.get("arguments") {
                            Some(Value::String(raw)) => raw.clone(),
                            Some(Value::Null) | None => String::new(),
                            Some(other) => other.to_string(),
                        };
                        Some(ToolCallRequest::new(name, arguments))
                    })
                    .collect::<Vec<_>>()
            })
            .unwrap_or_default();

        let content = message
            .get("content")
            .and_then(Value::as_str)
            .filter(|c| !c.is_empty() || tool_calls.is_empty())
            .map(str::to_owned);

        let count = |key: &str| body.get(key).and_then(Value::as_u64).unwrap_or(0) as u32;
        let usage = body.get("eval_count").map(|_| TokenUsage {
            prompt_tokens: count("prompt_eval_count"),
            completion_tokens: count("eval_count"),
            total_tokens: count("prompt_eval_count") + count("eval_count"),
        });

        let finish_reason = if tool_calls.is_empty() {
            body.get("done_reason")
                .and_then(Value::as_str)
                .map_or(Some(FinishReason::Stop), |r| Some(FinishReason::from_wire(r)))
        } else {
            Some(FinishReason::ToolUse)
        };

        Ok(Completion {
            content,
            tool_calls,
            usage,
            finish_reason,
        })
    }
}

#[async_trait]
impl LlmProvider for OllamaProvider {
    fn name(&self) -> &str {
        "ollama"
    }

    async fn health_check(&self) -> Result<bool> {
        match self.list_models().await {
            Ok(_) => Ok(true),
            Err(e) => {
                tracing::warn!("Ollama health check failed: {}", e);
                Ok(false)
            }
        }
    }

    async fn complete(&self, request: &CompletionRequest) -> Result<Completion> {
        let payload = self.build_payload(request);
        tracing::debug!(model = %request.model, messages = request.messages.len(), "Ollama chat");

        let response = self
            .client
            .post(self.url("chat"))
            .json(&payload)
            .send()
            .await
            .map_err(|e| transport_error(SERVICE, &e))?;

        let body = json_body(SERVICE, response).await?;
        Self::convert_completion(&body)
    }

    async fn list_models(&self) -> Result<Vec<ModelInfo>> {
        let response = self
            .client
            .get(self.url("tags"))
            .send()
            .await
            .map_err(|e| transport_error(SERVICE, &e))?;

        let body = json_body(SERVICE, response).await?;

        Ok(body["models"]
            .as_array()
            .map(|models| {
                models
                    .iter()
                    .filter_map(|m| m.get("name").and_then(Value::as_str))
                    .map(|name| ModelInfo {
                        id: name.to_owned(),
                        name: name.to_owned(),
                    })
                    .collect()
            })
            .unwrap_or_default())
    }
}

#[async_trait]
impl Embedder for OllamaProvider {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let response = self
            .client
            .post(self.url("embeddings"))
            .json(&json!({ "model": self.config.embedding_model, "prompt": text }))
            .send()
            .await
            .map_err(|e| transport_error(SERVICE, &e))?;

        let body = json_body(SERVICE, response).await?;

        body["embedding"]
            .as_array()
            .map(|values| values.iter().filter_map(Value::as_f64).map(|v| v as f32).collect())
            .ok_or_else(|| AgentError::Provider(format!("{}: response has no embedding", SERVICE)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use relay_core::ToolSchema;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn provider(mock_server: &MockServer) -> OllamaProvider {
        OllamaProvider::from_config(OllamaConfig {
            base_url: mock_server.uri(),
            ..Default::default()
        })
        .unwrap()
    }

    fn request(tools: Option<Vec<ToolSchema>>) -> CompletionRequest {
        CompletionRequest {
            model: "llama2".into(),
            messages: vec![
                Message::system("You are helpful."),
                Message::user("Hello"),
                Message::assistant(""),
                Message::function("current_time", "{}"),
            ],
            tools,
            temperature: 0.7,
        }
    }

    #[test]
    fn test_config_defaults() {
        let config = OllamaConfig::default();
        assert_eq!(config.base_url, "http://localhost:11434");
        assert!((config.top_p - 0.9).abs() < f32::EPSILON);
    }

    #[test]
    fn test_message_conversion() {
        let converted = OllamaProvider::convert_messages(&request(None).messages);
        assert_eq!(converted.len(), 4);
        assert_eq!(converted[0]["role"], "system");
        assert_eq!(converted[3]["role"], "tool");
    }

    #[tokio::test]
    async fn test_complete_text() {
        let mock_server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/chat"))
            .and(body_partial_json(json!({
                "model": "llama2",
                "stream": false,
                "options": { "top_p": 0.9 }
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "model": "llama2",
                "message": { "role": "assistant", "content": "Hola" },
                "done": true,
                "done_reason": "stop",
                "prompt_eval_count": 20,
                "eval_count": 4
            })))
            .mount(&mock_server)
            .await;

        let completion = provider(&mock_server).complete(&request(None)).await.unwrap();
        assert_eq!(completion.content.as_deref(), Some("Hola"));
        assert_eq!(completion.usage.unwrap().total_tokens, 24);
        assert_eq!(completion.finish_reason, Some(FinishReason::Stop));
    }

    #[tokio::test]
    async fn test_complete_tool_call_arguments_become_text() {
        let mock_server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/chat"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "message": {
                    "role": "assistant",
                    "content": "",
                    "tool_calls": [
                        {
                            "function": {
                                "name": "search_customer_info",
                                "arguments": { "query": "42" }
                            }
                        }
                    ]
                },
                "done": true
            })))
            .mount(&mock_server)
            .await;

        let tools = vec![ToolSchema::new(
            "search_customer_info",
            "Search for customer information",
            ToolSchema::empty_parameters(),
        )];
        let completion = provider(&mock_server).complete(&request(Some(tools))).await.unwrap();

        assert!(completion.content.is_none());
        assert_eq!(completion.tool_calls.len(), 1);
        assert_eq!(completion.tool_calls[0].name, "search_customer_info");
        let args: Value = serde_json::from_str(&completion.tool_calls[0].raw_arguments).unwrap();
        assert_eq!(args, json!({ "query": "42" }));
    }

    #[tokio::test]
    async fn test_unexpected_format() {
        let mock_server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/chat"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "done": true })))
            .mount(&mock_server)
            .await;

        let err = provider(&mock_server).complete(&request(None)).await.unwrap_err();
        assert!(matches!(err, AgentError::Provider(_)));
    }

    #[tokio::test]
    async fn test_list_models_and_embed() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/tags"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "models": [{ "name": "llama2:latest" }, { "name": "mistral:latest" }]
            })))
            .mount(&mock_server)
            .await;
        Mock::given(method("POST"))
            .and(path("/api/embeddings"))
            .and(body_partial_json(json!({ "model": "llama2", "prompt": "hola" })))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({ "embedding": [0.5, 0.25] })),
            )
            .mount(&mock_server)
            .await;

        let ollama = provider(&mock_server);
        let models = ollama.list_models().await.unwrap();
        assert_eq!(models[0].id, "llama2:latest");
        assert!(ollama.health_check().await.unwrap());
        assert_eq!(ollama.embed("hola").await.unwrap(), vec![0.5, 0.25]);
    }

    #[tokio::test]
    async fn test_unreachable_server_is_unavailable() {
        let ollama = OllamaProvider::from_config(OllamaConfig {
            base_url: "http://127.0.0.1:9".into(),
            timeout_secs: 2,
            ..Default::default()
        })
        .unwrap();

        assert!(!ollama.health_check().await.unwrap());
        let err = ollama.complete(&request(None)).await.unwrap_err();
        assert!(matches!(err, AgentError::ProviderUnavailable(_)));
    }
}
