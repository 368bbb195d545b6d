use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors that can occur while driving a turn. Tool-level variants are fed
/// back into the conversation as data; inference and control variants end
/// the turn.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Deserialize, Serialize)]
pub enum AgentError {
    #[error("Tool not found: {0}")]
    ToolNotFound(String),

    #[error("Invalid parameters: {0}")]
    InvalidParameters(String),

    #[error("Tool execution failed: {0}")]
    ExecutionError(String),

    #[error("Tool call timed out: {0}")]
    ToolTimeout(String),

    #[error("Inference request failed: {0}")]
    InferenceNetwork(String),

    #[error("Inference response could not be parsed: {0}")]
    MalformedResponse(String),

    #[error("Turn was cancelled")]
    Cancelled,

    #[error("Internal error: {0}")]
    Internal(String),
}

pub type AgentResult<T> = Result<T, AgentError>;
