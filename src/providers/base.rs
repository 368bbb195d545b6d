use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::AgentConfig;
use crate::models::message::Message;
use crate::models::tool::Tool;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Usage {
    pub input_tokens: Option<i32>,
    pub output_tokens: Option<i32>,
    pub total_tokens: Option<i32>,
}

impl Usage {
    pub fn new(
        input_tokens: Option<i32>,
        output_tokens: Option<i32>,
        total_tokens: Option<i32>,
    ) -> Self {
        Self {
            input_tokens,
            output_tokens,
            total_tokens,
        }
    }
}

/// Failure modes of a completion request. The orchestrator retries both
/// kinds, then surfaces them as terminal turn errors.
#[derive(Error, Debug)]
pub enum ProviderError {
    /// The serving endpoint could not be reached or refused the request
    #[error("network failure reaching inference service: {0}")]
    Network(String),

    /// The endpoint answered with content that does not parse as a completion
    #[error("inference service returned a malformed response: {0}")]
    MalformedResponse(String),
}

/// Boundary to the model-serving endpoint.
///
/// Implementations hold connection configuration only; everything
/// session-specific (system prompt, temperature, history) arrives per call
/// so concurrent sessions cannot interfere through the client.
#[async_trait]
pub trait Provider: Send + Sync {
    /// Request the next assistant message for the given conversation state
    async fn complete(
        &self,
        system: &str,
        messages: &[Message],
        tools: &[Tool],
        config: &AgentConfig,
    ) -> Result<(Message, Usage), ProviderError>;
}
