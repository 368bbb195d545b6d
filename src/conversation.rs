use tracing::debug;

use crate::models::message::Message;
use crate::models::role::Role;
use crate::models::tool::Tool;
use crate::token_counter::TokenCounter;

/// Ordered message history for one session. Append-only during a turn and
/// owned by exactly one session, so no locking is needed.
///
/// The system prompt lives in [`AgentConfig`](crate::config::AgentConfig),
/// not here, which keeps it exempt from truncation.
#[derive(Debug, Clone, Default)]
pub struct Conversation {
    messages: Vec<Message>,
}

impl Conversation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, message: Message) {
        self.messages.push(message);
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn last(&self) -> Option<&Message> {
        self.messages.last()
    }

    /// Drop the oldest messages until the estimated request size fits inside
    /// `context_limit`. The most recent message always survives. A tool
    /// response whose request was dropped is dropped with it so the
    /// transcript never opens with a dangling call id.
    ///
    /// Returns how many messages were removed.
    pub fn truncate_to_fit(&mut self, system: &str, tools: &[Tool], context_limit: usize) -> usize {
        let counter = TokenCounter::new();
        let mut dropped = 0;

        while self.messages.len() > 1
            && counter.count_chat_tokens(system, &self.messages, tools) > context_limit
        {
            self.messages.remove(0);
            dropped += 1;

            while self.messages.len() > 1 && self.messages[0].role == Role::Tool {
                self.messages.remove(0);
                dropped += 1;
            }
        }

        if dropped > 0 {
            debug!(dropped, remaining = self.messages.len(), "truncated conversation to fit context");
        }
        dropped
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::AgentResult;
    use crate::models::content::Content;
    use crate::models::tool::ToolCall;
    use serde_json::json;

    fn ok_result(text: &str) -> AgentResult<Vec<Content>> {
        Ok(vec![Content::text(text)])
    }

    #[test]
    fn test_no_truncation_under_budget() {
        let mut conversation = Conversation::new();
        conversation.push(Message::user().with_text("hello"));
        conversation.push(Message::assistant().with_text("hi"));

        let dropped = conversation.truncate_to_fit("system", &[], 4096);
        assert_eq!(dropped, 0);
        assert_eq!(conversation.len(), 2);
    }

    #[test]
    fn test_oldest_messages_dropped_first() {
        let mut conversation = Conversation::new();
        conversation.push(Message::user().with_text(&"x".repeat(4000)));
        conversation.push(Message::assistant().with_text(&"y".repeat(4000)));
        conversation.push(Message::user().with_text("latest question"));

        conversation.truncate_to_fit("system", &[], 1024);

        assert!(conversation.len() < 3);
        assert_eq!(conversation.last().unwrap().text(), "latest question");
    }

    #[test]
    fn test_most_recent_message_always_kept() {
        let mut conversation = Conversation::new();
        conversation.push(Message::user().with_text(&"z".repeat(100_000)));

        // Budget far below the single message size
        let dropped = conversation.truncate_to_fit("system", &[], 512);
        assert_eq!(dropped, 0);
        assert_eq!(conversation.len(), 1);
    }

    #[test]
    fn test_orphaned_tool_response_dropped_with_its_request() {
        let mut conversation = Conversation::new();
        conversation.push(
            Message::assistant()
                .with_text(&"pad".repeat(2000))
                .with_tool_request("call-1", Ok(ToolCall::new("file_list", json!({})))),
        );
        conversation.push(Message::tool().with_tool_response("call-1", ok_result("listing")));
        conversation.push(Message::user().with_text("next"));

        conversation.truncate_to_fit("system", &[], 512);

        // The request was dropped for size, so the response must not survive it
        assert!(conversation
            .messages()
            .iter()
            .all(|m| m.role != Role::Tool));
        assert_eq!(conversation.last().unwrap().text(), "next");
    }
}
