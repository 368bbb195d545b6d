use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;

use super::base::{Provider, ProviderError, Usage};
use crate::config::AgentConfig;
use crate::models::message::Message;
use crate::models::tool::Tool;

/// A provider that plays back a scripted sequence of replies, for testing
/// the orchestration loop without a model server.
pub struct MockProvider {
    replies: Mutex<VecDeque<Result<Message, ProviderError>>>,
}

impl MockProvider {
    /// Script a sequence of successful responses
    pub fn new(responses: Vec<Message>) -> Self {
        Self {
            replies: Mutex::new(responses.into_iter().map(Ok).collect()),
        }
    }

    /// Script a mixed sequence of responses and failures
    pub fn from_replies(replies: Vec<Result<Message, ProviderError>>) -> Self {
        Self {
            replies: Mutex::new(replies.into()),
        }
    }
}

#[async_trait]
impl Provider for MockProvider {
    async fn complete(
        &self,
        _system: &str,
        _messages: &[Message],
        _tools: &[Tool],
        _config: &AgentConfig,
    ) -> Result<(Message, Usage), ProviderError> {
        let mut replies = self.replies.lock().unwrap();
        match replies.pop_front() {
            // Keep answering with an empty message once the script runs out
            None => Ok((Message::assistant().with_text(""), Usage::default())),
            Some(reply) => reply.map(|message| (message, Usage::default())),
        }
    }
}
