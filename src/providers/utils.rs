use regex::Regex;
use serde_json::{json, Value};
use uuid::Uuid;

use crate::errors::AgentError;
use crate::models::content::Content;
use crate::models::message::{Message, MessageContent};
use crate::models::role::Role;
use crate::models::tool::{Tool, ToolCall};
use crate::providers::base::ProviderError;

/// Convert internal messages to the openai-compatible chat format the local
/// serving endpoint speaks.
pub fn messages_to_openai_spec(messages: &[Message]) -> Vec<Value> {
    let mut messages_spec = Vec::new();

    for message in messages {
        match message.role {
            Role::Assistant => {
                let mut converted = json!({"role": "assistant"});

                for content in &message.content {
                    match content {
                        MessageContent::Text(text) => {
                            if !text.is_empty() {
                                converted["content"] = json!(text);
                            }
                        }
                        // An Err request has no function to render; the error
                        // reaches the model through the tool message dispatch
                        // resolves for the same id
                        MessageContent::ToolRequest(request) => {
                            if let Ok(tool_call) = &request.tool_call {
                                let tool_calls = converted
                                    .as_object_mut()
                                    .unwrap()
                                    .entry("tool_calls")
                                    .or_insert(json!([]));
                                tool_calls.as_array_mut().unwrap().push(json!({
                                    "id": request.id,
                                    "type": "function",
                                    "function": {
                                        "name": sanitize_function_name(&tool_call.name),
                                        "arguments": tool_call.arguments.to_string(),
                                    }
                                }));
                            }
                        }
                        MessageContent::Image { data, mime_type } => {
                            converted["content"] = json!([image_url(data, mime_type)]);
                        }
                        MessageContent::ToolResponse(_) => {}
                    }
                }

                if converted.get("content").is_some() || converted.get("tool_calls").is_some() {
                    messages_spec.push(converted);
                }
            }
            Role::Tool => {
                for content in &message.content {
                    let Some(response) = content.as_tool_response() else {
                        continue;
                    };
                    match &response.tool_result {
                        Ok(contents) => {
                            let mut texts = Vec::new();
                            let mut image_messages = Vec::new();
                            for item in contents {
                                match item {
                                    Content::Text(text) => texts.push(text.text.clone()),
                                    Content::Image(image) => {
                                        // The tool slot only takes text, so the
                                        // image rides in a follow-up user message
                                        texts.push(
                                            "This tool result included an image that is uploaded in the next message."
                                                .to_string(),
                                        );
                                        image_messages.push(json!({
                                            "role": "user",
                                            "content": [image_url(&image.data, &image.mime_type)]
                                        }));
                                    }
                                }
                            }
                            messages_spec.push(json!({
                                "role": "tool",
                                "content": texts.join("\n"),
                                "tool_call_id": response.id
                            }));
                            messages_spec.extend(image_messages);
                        }
                        Err(e) => {
                            // Shown as output so the model can interpret the
                            // error and try a different strategy
                            messages_spec.push(json!({
                                "role": "tool",
                                "content": format!("The tool call returned the following error:\n{}", e),
                                "tool_call_id": response.id
                            }));
                        }
                    }
                }
            }
            Role::User | Role::System => {
                let role = match message.role {
                    Role::System => "system",
                    _ => "user",
                };
                let mut parts = Vec::new();
                for content in &message.content {
                    match content {
                        MessageContent::Text(text) => parts.push(json!({"type": "text", "text": text})),
                        MessageContent::Image { data, mime_type } => {
                            parts.push(image_url(data, mime_type))
                        }
                        _ => {}
                    }
                }
                // Plain text goes through as a bare string, the common case
                let content = match parts.as_slice() {
                    [single] if single["type"] == "text" => single["text"].clone(),
                    _ => json!(parts),
                };
                messages_spec.push(json!({"role": role, "content": content}));
            }
        }
    }

    messages_spec
}

fn image_url(data: &str, mime_type: &str) -> Value {
    json!({
        "type": "image_url",
        "image_url": {
            "url": format!("data:{};base64,{}", mime_type, data)
        }
    })
}

/// Convert tool specs to the openai function-calling format
pub fn tools_to_openai_spec(tools: &[Tool]) -> Vec<Value> {
    tools
        .iter()
        .map(|tool| {
            json!({
                "type": "function",
                "function": {
                    "name": tool.name,
                    "description": tool.description,
                    "parameters": tool.input_schema,
                }
            })
        })
        .collect()
}

/// Parse a chat-completion response body into an assistant message.
///
/// Tool calls with an invalid name or unparseable arguments become `Err`
/// tool requests rather than parse failures: the registry resolves them to
/// error results the model can react to.
pub fn openai_response_to_message(response: &Value) -> Result<Message, ProviderError> {
    let original = response
        .pointer("/choices/0/message")
        .ok_or_else(|| {
            ProviderError::MalformedResponse(format!(
                "no message in response choices: {}",
                response
            ))
        })?;

    let mut content = Vec::new();

    if let Some(text) = original.get("content").and_then(|v| v.as_str()) {
        let text = strip_reasoning_trace(text);
        if !text.is_empty() {
            content.push(MessageContent::text(text));
        }
    }

    if let Some(tool_calls) = original.get("tool_calls").and_then(|v| v.as_array()) {
        for tool_call in tool_calls {
            let id = tool_call["id"]
                .as_str()
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .unwrap_or_else(|| Uuid::new_v4().to_string());
            let function_name = tool_call["function"]["name"]
                .as_str()
                .unwrap_or_default()
                .to_string();

            if !is_valid_function_name(&function_name) {
                let error = AgentError::ToolNotFound(format!(
                    "The provided function name '{}' had invalid characters, it must match [a-zA-Z0-9_-]+",
                    function_name
                ));
                content.push(MessageContent::tool_request(id, Err(error)));
                continue;
            }

            // Arguments arrive as a JSON string per the openai spec, but some
            // local models emit the object directly
            let parsed = match &tool_call["function"]["arguments"] {
                Value::String(raw) => serde_json::from_str::<Value>(raw).map_err(|e| {
                    AgentError::InvalidParameters(format!(
                        "Could not interpret tool arguments for id {}: {}",
                        id, e
                    ))
                }),
                value @ Value::Object(_) => Ok(value.clone()),
                Value::Null => Ok(json!({})),
                other => Err(AgentError::InvalidParameters(format!(
                    "Tool arguments for id {} were neither a string nor an object: {}",
                    id, other
                ))),
            };

            content.push(MessageContent::tool_request(
                id,
                parsed.map(|arguments| ToolCall::new(&function_name, arguments)),
            ));
        }
    }

    Ok(Message {
        role: Role::Assistant,
        created: chrono::Utc::now().timestamp(),
        content,
    })
}

/// Some local models emit a reasoning trace terminated by a fixed marker
/// before their actual answer; only the part after the marker is the reply.
pub fn strip_reasoning_trace(text: &str) -> &str {
    const MARKER: &str = "...done thinking.";
    match text.rfind(MARKER) {
        Some(index) => text[index + MARKER.len()..].trim(),
        None => text.trim(),
    }
}

fn sanitize_function_name(name: &str) -> String {
    let re = Regex::new(r"[^a-zA-Z0-9_-]").unwrap();
    re.replace_all(name, "_").to_string()
}

fn is_valid_function_name(name: &str) -> bool {
    let re = Regex::new(r"^[a-zA-Z0-9_-]+$").unwrap();
    re.is_match(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    const TOOL_USE_RESPONSE: &str = r#"{
        "choices": [{
            "message": {
                "role": "assistant",
                "content": null,
                "tool_calls": [{
                    "id": "call_1",
                    "type": "function",
                    "function": {
                        "name": "file_list",
                        "arguments": "{\"path\": \".\"}"
                    }
                }]
            }
        }]
    }"#;

    #[test]
    fn test_messages_to_openai_spec_text() {
        let message = Message::user().with_text("Hello");
        let spec = messages_to_openai_spec(&[message]);

        assert_eq!(spec.len(), 1);
        assert_eq!(spec[0]["role"], "user");
        assert_eq!(spec[0]["content"], "Hello");
    }

    #[test]
    fn test_round_trip_preserves_call_ids() {
        let response: Value = serde_json::from_str(TOOL_USE_RESPONSE).unwrap();
        let assistant = openai_response_to_message(&response).unwrap();
        let request = assistant.tool_requests()[0].clone();

        let tool_message =
            Message::tool().with_tool_response(request.id.clone(), Ok(vec![Content::text("ok")]));

        let spec = messages_to_openai_spec(&[assistant.clone(), tool_message]);
        assert_eq!(spec.len(), 2);
        assert_eq!(spec[0]["tool_calls"][0]["id"], json!(request.id));
        assert_eq!(spec[1]["tool_call_id"], json!(request.id));
        assert_eq!(spec[1]["role"], "tool");
    }

    #[test]
    fn test_tool_error_fed_back_as_output() {
        let tool_message = Message::tool().with_tool_response(
            "call-9",
            Err(AgentError::ToolNotFound("delete_universe".into())),
        );

        let spec = messages_to_openai_spec(&[tool_message]);
        assert_eq!(spec.len(), 1);
        assert_eq!(spec[0]["role"], "tool");
        assert_eq!(spec[0]["tool_call_id"], "call-9");
        assert!(spec[0]["content"]
            .as_str()
            .unwrap()
            .contains("delete_universe"));
    }

    #[test]
    fn test_unparseable_request_yields_single_tool_entry() {
        // The Err request renders nothing on the assistant side; the error
        // response dispatched for the same id is the one tool entry
        let assistant = Message::assistant().with_tool_request(
            "bad-1",
            Err(AgentError::InvalidParameters("not json".into())),
        );
        let tool = Message::tool().with_tool_response(
            "bad-1",
            Err(AgentError::InvalidParameters("not json".into())),
        );

        let spec = messages_to_openai_spec(&[assistant, tool]);
        assert_eq!(spec.len(), 1);
        assert_eq!(spec[0]["role"], "tool");
        assert_eq!(spec[0]["tool_call_id"], "bad-1");
    }

    #[test]
    fn test_response_with_text() {
        let response = json!({
            "choices": [{"message": {"role": "assistant", "content": "Hi there"}}]
        });

        let message = openai_response_to_message(&response).unwrap();
        assert_eq!(message.role, Role::Assistant);
        assert_eq!(message.text(), "Hi there");
    }

    #[test]
    fn test_response_without_message_is_malformed() {
        let response = json!({"error": "loading model"});
        assert!(matches!(
            openai_response_to_message(&response),
            Err(ProviderError::MalformedResponse(_))
        ));
    }

    #[test]
    fn test_response_tool_call_with_object_arguments() {
        let response = json!({
            "choices": [{"message": {
                "role": "assistant",
                "tool_calls": [{
                    "id": "c1",
                    "function": {"name": "file_read", "arguments": {"path": "notes.txt"}}
                }]
            }}]
        });

        let message = openai_response_to_message(&response).unwrap();
        let call = message.tool_requests()[0].tool_call.clone().unwrap();
        assert_eq!(call.name, "file_read");
        assert_eq!(call.arguments, json!({"path": "notes.txt"}));
    }

    #[test]
    fn test_response_invalid_function_name() {
        let response = json!({
            "choices": [{"message": {
                "role": "assistant",
                "tool_calls": [{
                    "id": "c1",
                    "function": {"name": "not a name", "arguments": "{}"}
                }]
            }}]
        });

        let message = openai_response_to_message(&response).unwrap();
        assert!(matches!(
            message.tool_requests()[0].tool_call,
            Err(AgentError::ToolNotFound(_))
        ));
    }

    #[test]
    fn test_response_unparseable_arguments() {
        let response = json!({
            "choices": [{"message": {
                "role": "assistant",
                "tool_calls": [{
                    "id": "c1",
                    "function": {"name": "file_read", "arguments": "not json {"}
                }]
            }}]
        });

        let message = openai_response_to_message(&response).unwrap();
        assert!(matches!(
            message.tool_requests()[0].tool_call,
            Err(AgentError::InvalidParameters(_))
        ));
    }

    #[test]
    fn test_missing_call_id_gets_generated() {
        let response = json!({
            "choices": [{"message": {
                "role": "assistant",
                "tool_calls": [{"function": {"name": "file_list", "arguments": "{}"}}]
            }}]
        });

        let message = openai_response_to_message(&response).unwrap();
        assert!(!message.tool_requests()[0].id.is_empty());
    }

    #[test]
    fn test_strip_reasoning_trace() {
        assert_eq!(
            strip_reasoning_trace("Let me think......done thinking. The answer is 4."),
            "The answer is 4."
        );
        assert_eq!(strip_reasoning_trace("plain answer"), "plain answer");
    }

    #[test]
    fn test_tools_to_openai_spec() {
        let tool = Tool::new(
            "file_read",
            "Read the content of a file",
            json!({"type": "object", "properties": {"path": {"type": "string"}}}),
        );

        let spec = tools_to_openai_spec(&[tool]);
        assert_eq!(spec.len(), 1);
        assert_eq!(spec[0]["type"], "function");
        assert_eq!(spec[0]["function"]["name"], "file_read");
    }
}
