use async_trait::async_trait;
use serde_json::Value;

use crate::errors::AgentResult;
use crate::models::content::Content;
use crate::models::tool::Tool;

pub mod filesystem;
pub mod grading;
pub mod screen;

/// A local capability the model can operate. One implementation per tool
/// name, registered in a [`ToolRegistry`](crate::registry::ToolRegistry).
///
/// `execute` is invoked with model-supplied JSON and must do its own shape
/// validation: a hallucinated or malicious argument payload yields a typed
/// error, never a crash. Side effects are the capability's own business; the
/// contract only guarantees one result per call.
#[async_trait]
pub trait Capability: Send + Sync {
    /// The spec advertised to the model
    fn spec(&self) -> &Tool;

    /// Run the tool against the given arguments
    async fn execute(&self, arguments: Value) -> AgentResult<Vec<Content>>;
}

/// Pull a required string argument out of a model-supplied payload
pub(crate) fn required_str<'a>(arguments: &'a Value, key: &str) -> AgentResult<&'a str> {
    arguments
        .get(key)
        .and_then(|v| v.as_str())
        .ok_or_else(|| {
            crate::errors::AgentError::InvalidParameters(format!(
                "'{}' string parameter required",
                key
            ))
        })
}
