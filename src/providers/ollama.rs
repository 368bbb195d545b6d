use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde_json::{json, Value};
use tracing::debug;

use super::base::{Provider, ProviderError, Usage};
use super::utils::{messages_to_openai_spec, openai_response_to_message, tools_to_openai_spec};
use crate::config::AgentConfig;
use crate::models::message::Message;
use crate::models::tool::Tool;

pub const OLLAMA_HOST: &str = "http://localhost:11434";
pub const OLLAMA_MODEL: &str = "qwen2.5";

/// Client for a local Ollama server, speaking its openai-compatible
/// chat-completions endpoint.
pub struct OllamaProvider {
    client: Client,
    host: String,
    model: String,
}

impl OllamaProvider {
    pub fn new(host: impl Into<String>, model: impl Into<String>) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(600)) // local models can be slow to load
            .build()?;

        Ok(Self {
            client,
            host: host.into(),
            model: model.into(),
        })
    }

    pub fn from_env() -> Result<Self> {
        let host = std::env::var("OLLAMA_HOST").unwrap_or_else(|_| OLLAMA_HOST.to_string());
        let model = std::env::var("OLLAMA_MODEL").unwrap_or_else(|_| OLLAMA_MODEL.to_string());
        Self::new(host, model)
    }

    fn get_usage(data: &Value) -> Usage {
        let usage = match data.get("usage") {
            Some(usage) => usage,
            None => return Usage::default(),
        };

        let input_tokens = usage
            .get("prompt_tokens")
            .and_then(|v| v.as_i64())
            .map(|v| v as i32);
        let output_tokens = usage
            .get("completion_tokens")
            .and_then(|v| v.as_i64())
            .map(|v| v as i32);
        let total_tokens = usage
            .get("total_tokens")
            .and_then(|v| v.as_i64())
            .map(|v| v as i32)
            .or_else(|| match (input_tokens, output_tokens) {
                (Some(input), Some(output)) => Some(input + output),
                _ => None,
            });

        Usage::new(input_tokens, output_tokens, total_tokens)
    }

    async fn post(&self, payload: Value) -> Result<Value, ProviderError> {
        let url = format!("{}/v1/chat/completions", self.host.trim_end_matches('/'));

        let response = self
            .client
            .post(&url)
            .json(&payload)
            .send()
            .await
            .map_err(|e| ProviderError::Network(e.to_string()))?;

        match response.status() {
            StatusCode::OK => response
                .json()
                .await
                .map_err(|e| ProviderError::MalformedResponse(e.to_string())),
            status => Err(ProviderError::Network(format!(
                "server returned {}",
                status
            ))),
        }
    }
}

#[async_trait]
impl Provider for OllamaProvider {
    async fn complete(
        &self,
        system: &str,
        messages: &[Message],
        tools: &[Tool],
        config: &AgentConfig,
    ) -> Result<(Message, Usage), ProviderError> {
        let mut messages_array = vec![json!({"role": "system", "content": system})];
        messages_array.extend(messages_to_openai_spec(messages));

        let mut payload = json!({
            "model": self.model,
            "messages": messages_array,
            "temperature": config.temperature,
        });

        let tools_spec = tools_to_openai_spec(tools);
        if !tools_spec.is_empty() {
            payload
                .as_object_mut()
                .unwrap()
                .insert("tools".to_string(), json!(tools_spec));
        }

        debug!(model = %self.model, messages = messages_array.len(), "requesting completion");

        let response = self.post(payload).await?;
        let message = openai_response_to_message(&response)?;
        let usage = Self::get_usage(&response);

        Ok((message, usage))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::message::MessageContent;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn setup_mock_server(response_body: Value) -> (MockServer, OllamaProvider) {
        let mock_server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .respond_with(ResponseTemplate::new(200).set_body_json(response_body))
            .mount(&mock_server)
            .await;

        let provider = OllamaProvider::new(mock_server.uri(), OLLAMA_MODEL).unwrap();
        (mock_server, provider)
    }

    #[tokio::test]
    async fn test_complete_basic() {
        let response_body = json!({
            "id": "chatcmpl-123",
            "object": "chat.completion",
            "choices": [{
                "index": 0,
                "message": {
                    "role": "assistant",
                    "content": "Hello! How can I assist you today?",
                    "tool_calls": null
                },
                "finish_reason": "stop"
            }],
            "usage": {
                "prompt_tokens": 12,
                "completion_tokens": 15,
                "total_tokens": 27
            }
        });

        let (_server, provider) = setup_mock_server(response_body).await;
        let messages = vec![Message::user().with_text("Hello?")];

        let (message, usage) = provider
            .complete(
                "You are a helpful assistant.",
                &messages,
                &[],
                &AgentConfig::default(),
            )
            .await
            .unwrap();

        assert_eq!(message.text(), "Hello! How can I assist you today?");
        assert_eq!(usage.input_tokens, Some(12));
        assert_eq!(usage.output_tokens, Some(15));
        assert_eq!(usage.total_tokens, Some(27));
    }

    #[tokio::test]
    async fn test_complete_tool_request() {
        let response_body = json!({
            "choices": [{
                "index": 0,
                "message": {
                    "role": "assistant",
                    "content": null,
                    "tool_calls": [{
                        "id": "call_h5d3s25w",
                        "type": "function",
                        "function": {
                            "name": "file_read",
                            "arguments": "{\"path\":\"test.txt\"}"
                        }
                    }]
                },
                "finish_reason": "tool_calls"
            }],
            "usage": {"prompt_tokens": 63, "completion_tokens": 70, "total_tokens": 133}
        });

        let (_server, provider) = setup_mock_server(response_body).await;
        let messages = vec![Message::user().with_text("Can you read the test.txt file?")];
        let tool = Tool::new(
            "file_read",
            "Read the content of a file",
            json!({
                "type": "object",
                "properties": {
                    "path": {"type": "string", "description": "The file to read"}
                },
                "required": ["path"]
            }),
        );

        let (message, _usage) = provider
            .complete(
                "You are a helpful assistant.",
                &messages,
                &[tool],
                &AgentConfig::default(),
            )
            .await
            .unwrap();

        if let MessageContent::ToolRequest(request) = &message.content[0] {
            let tool_call = request.tool_call.as_ref().unwrap();
            assert_eq!(tool_call.name, "file_read");
            assert_eq!(tool_call.arguments, json!({"path": "test.txt"}));
        } else {
            panic!("Expected ToolRequest content");
        }
    }

    #[tokio::test]
    async fn test_server_error_is_network_failure() {
        let mock_server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&mock_server)
            .await;

        let provider = OllamaProvider::new(mock_server.uri(), OLLAMA_MODEL).unwrap();
        let messages = vec![Message::user().with_text("Hello?")];

        let result = provider
            .complete("system", &messages, &[], &AgentConfig::default())
            .await;

        assert!(matches!(result, Err(ProviderError::Network(_))));
    }

    #[tokio::test]
    async fn test_unparseable_body_is_malformed_response() {
        let mock_server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
            .mount(&mock_server)
            .await;

        let provider = OllamaProvider::new(mock_server.uri(), OLLAMA_MODEL).unwrap();
        let messages = vec![Message::user().with_text("Hello?")];

        let result = provider
            .complete("system", &messages, &[], &AgentConfig::default())
            .await;

        assert!(matches!(result, Err(ProviderError::MalformedResponse(_))));
    }

    #[tokio::test]
    async fn test_unreachable_host_is_network_failure() {
        // Discard port on loopback, connection is refused immediately
        let provider = OllamaProvider::new("http://127.0.0.1:9", OLLAMA_MODEL).unwrap();
        let messages = vec![Message::user().with_text("Hello?")];

        let result = provider
            .complete("system", &messages, &[], &AgentConfig::default())
            .await;

        assert!(matches!(result, Err(ProviderError::Network(_))));
    }
}
