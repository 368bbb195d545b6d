use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};

use crate::capabilities::Capability;
use crate::errors::{AgentError, AgentResult};
use crate::models::message::{ToolRequest, ToolResponse};
use crate::models::tool::Tool;

/// Maps tool names to capability implementations and routes calls to them.
///
/// Dispatch never raises past this boundary: unknown names, timeouts,
/// panics and tool failures all come back as an error [`ToolResponse`].
#[derive(Default)]
pub struct ToolRegistry {
    capabilities: HashMap<String, Arc<dyn Capability>>,
    // registration order, which is the order specs are advertised in
    order: Vec<String>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a capability under its spec name. Fails if the name is taken.
    pub fn register(&mut self, capability: Arc<dyn Capability>) -> AgentResult<()> {
        let name = capability.spec().name.clone();
        if self.capabilities.contains_key(&name) {
            return Err(AgentError::Internal(format!(
                "tool '{}' is already registered",
                name
            )));
        }
        self.order.push(name.clone());
        self.capabilities.insert(name, capability);
        Ok(())
    }

    /// All tool specs in registration order, for advertising to the model
    pub fn specs(&self) -> Vec<Tool> {
        self.order
            .iter()
            .filter_map(|name| self.capabilities.get(name))
            .map(|capability| capability.spec().clone())
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.capabilities.is_empty()
    }

    /// Route one requested call to its implementation under a deadline.
    ///
    /// A request that already failed to parse is resolved with its own
    /// error; the registry does not second-guess argument shapes beyond
    /// that, per the contract that validation belongs to the tool.
    pub async fn dispatch(&self, request: &ToolRequest, timeout: Duration) -> ToolResponse {
        let call = match &request.tool_call {
            Ok(call) => call.clone(),
            Err(e) => return ToolResponse {
                id: request.id.clone(),
                tool_result: Err(e.clone()),
            },
        };

        let Some(capability) = self.capabilities.get(&call.name).cloned() else {
            warn!(tool = %call.name, "dispatch requested for unregistered tool");
            return ToolResponse {
                id: request.id.clone(),
                tool_result: Err(AgentError::ToolNotFound(call.name)),
            };
        };

        debug!(tool = %call.name, id = %request.id, "dispatching tool call");

        // Run on its own task so a panicking or timed-out capability can be
        // abandoned without touching sibling calls. The guard aborts the task
        // when dispatch is abandoned, so it cannot keep running afterwards.
        let name = call.name.clone();
        let mut task = AbortOnDrop(tokio::spawn(async move {
            capability.execute(call.arguments).await
        }));

        let tool_result = match tokio::time::timeout(timeout, &mut task.0).await {
            Err(_) => {
                warn!(tool = %name, timeout_ms = timeout.as_millis() as u64, "tool call timed out");
                Err(AgentError::ToolTimeout(name))
            }
            Ok(Err(join_error)) => Err(AgentError::ExecutionError(format!(
                "tool '{}' aborted: {}",
                name, join_error
            ))),
            Ok(Ok(result)) => result,
        };

        ToolResponse {
            id: request.id.clone(),
            tool_result,
        }
    }
}

/// Aborts the held task when dropped. Covers the timeout path and a caller
/// dropping dispatch mid-flight, e.g. on turn cancellation.
struct AbortOnDrop<T>(tokio::task::JoinHandle<T>);

impl<T> Drop for AbortOnDrop<T> {
    fn drop(&mut self) {
        self.0.abort();
    }
}
