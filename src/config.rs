use std::time::Duration;

use indoc::indoc;
use serde::{Deserialize, Serialize};

use crate::errors::{AgentError, AgentResult};

pub const TEMPERATURE_RANGE: (f32, f32) = (0.0, 2.0);
pub const CONTEXT_LIMIT_RANGE: (usize, usize) = (512, 8192);

const DEFAULT_SYSTEM_PROMPT: &str = indoc! {"
    You are a helpful AI assistant with access to tools.

    Use the tools that are available to you when they help with the task.
    After receiving a tool result, summarize it for the user. Do not call
    another tool unless it is necessary to finish the task. If the task is
    complete, respond normally without calling a tool.
"};

/// Per-turn configuration for a session. Values are treated as immutable for
/// the duration of a turn; the UI layer may hand in a different config on the
/// next one.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    /// System prompt prepended to every completion request
    pub system_prompt: String,
    /// Sampling temperature, 0.0 to 2.0
    pub temperature: f32,
    /// Token budget for the conversation sent to the model
    pub context_limit: usize,
    /// Maximum completion round trips per user turn
    pub max_iterations: usize,
    /// Deadline for a single tool call
    pub tool_timeout: Duration,
    /// How many times a failed completion request is retried
    pub max_retries: usize,
    /// Base delay between completion retries, doubled per attempt
    pub retry_backoff: Duration,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
            temperature: 0.7,
            context_limit: 4096,
            max_iterations: 10,
            tool_timeout: Duration::from_secs(30),
            max_retries: 2,
            retry_backoff: Duration::from_millis(500),
        }
    }
}

impl AgentConfig {
    /// Check that all values are inside their allowed ranges. Run at the
    /// start of each turn so a bad config fails loudly instead of producing
    /// a confusing model request.
    pub fn validate(&self) -> AgentResult<()> {
        let (temp_min, temp_max) = TEMPERATURE_RANGE;
        if !(temp_min..=temp_max).contains(&self.temperature) {
            return Err(AgentError::InvalidParameters(format!(
                "temperature {} outside {}..={}",
                self.temperature, temp_min, temp_max
            )));
        }
        let (ctx_min, ctx_max) = CONTEXT_LIMIT_RANGE;
        if !(ctx_min..=ctx_max).contains(&self.context_limit) {
            return Err(AgentError::InvalidParameters(format!(
                "context_limit {} outside {}..={}",
                self.context_limit, ctx_min, ctx_max
            )));
        }
        if self.max_iterations == 0 {
            return Err(AgentError::InvalidParameters(
                "max_iterations must be at least 1".into(),
            ));
        }
        if self.tool_timeout.is_zero() {
            return Err(AgentError::InvalidParameters(
                "tool_timeout must be non-zero".into(),
            ));
        }
        Ok(())
    }
}
