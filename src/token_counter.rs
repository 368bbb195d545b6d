use crate::models::message::{Message, MessageContent};
use crate::models::tool::Tool;

// Overhead applied per message for role/framing tokens, in line with the
// openai chat format accounting.
const TOKENS_PER_MESSAGE: usize = 4;

/// Estimates token counts for context-budget enforcement.
///
/// The local serving endpoint bills in model tokens we cannot reproduce
/// exactly without shipping its tokenizer data, so this uses the standard
/// four-characters-per-token approximation. The estimate only has to be
/// consistent, not exact: truncation compares estimates against the same
/// estimator.
pub struct TokenCounter;

impl TokenCounter {
    pub fn new() -> Self {
        TokenCounter
    }

    pub fn count_tokens(&self, text: &str) -> usize {
        text.chars().count().div_ceil(4)
    }

    fn count_content(&self, content: &MessageContent) -> usize {
        match content {
            MessageContent::Text(text) => self.count_tokens(text),
            MessageContent::Image { data, .. } => self.count_tokens(data),
            MessageContent::ToolRequest(request) => {
                let call = serde_json::to_string(&request.tool_call).unwrap_or_default();
                self.count_tokens(&request.id) + self.count_tokens(&call)
            }
            MessageContent::ToolResponse(response) => {
                let result = serde_json::to_string(&response.tool_result).unwrap_or_default();
                self.count_tokens(&response.id) + self.count_tokens(&result)
            }
        }
    }

    pub fn count_message_tokens(&self, message: &Message) -> usize {
        TOKENS_PER_MESSAGE
            + message
                .content
                .iter()
                .map(|content| self.count_content(content))
                .sum::<usize>()
    }

    /// Estimate the full size of a completion request: system prompt,
    /// conversation and advertised tool schemas.
    pub fn count_chat_tokens(&self, system: &str, messages: &[Message], tools: &[Tool]) -> usize {
        let system_count = TOKENS_PER_MESSAGE + self.count_tokens(system);
        let messages_count: usize = messages
            .iter()
            .map(|message| self.count_message_tokens(message))
            .sum();
        let tools_count: usize = tools
            .iter()
            .map(|tool| {
                let schema = serde_json::to_string(&tool.input_schema).unwrap_or_default();
                self.count_tokens(&tool.name)
                    + self.count_tokens(&tool.description)
                    + self.count_tokens(&schema)
            })
            .sum();

        system_count + messages_count + tools_count
    }
}

impl Default for TokenCounter {
    fn default() -> Self {
        Self::new()
    }
}
