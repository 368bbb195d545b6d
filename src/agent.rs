use tokio::sync::watch;
use tracing::{debug, warn};

use crate::config::AgentConfig;
use crate::conversation::Conversation;
use crate::errors::{AgentError, AgentResult};
use crate::models::message::{Message, MessageContent, ToolRequest};
use crate::models::tool::Tool;
use crate::providers::base::{Provider, ProviderError, Usage};
use crate::registry::ToolRegistry;

/// How a turn ended when it did not fail outright
#[derive(Debug, Clone, PartialEq)]
pub enum TurnOutcome {
    /// The model produced a final answer
    Complete(String),
    /// The iteration cap was hit first; `partial` is the best available
    /// answer so far and the caller should surface the limitation
    IterationLimit { partial: String },
}

/// The orchestration loop: requests completions, routes requested tool
/// calls through the registry, feeds results back, and stops on a final
/// answer, a terminal error, cancellation, or the iteration cap.
pub struct Agent {
    provider: Box<dyn Provider>,
    registry: ToolRegistry,
}

impl Agent {
    pub fn new(provider: Box<dyn Provider>, registry: ToolRegistry) -> Self {
        Self { provider, registry }
    }

    pub fn registry(&self) -> &ToolRegistry {
        &self.registry
    }

    /// Drive one turn over the given conversation. The user message is
    /// expected to have been appended already.
    ///
    /// Every tool call the model issues is resolved with exactly one tool
    /// message before the next completion request, on every path out of
    /// this function, so the transcript never carries a dangling call id.
    pub async fn run_turn(
        &self,
        conversation: &mut Conversation,
        config: &AgentConfig,
        mut stop: watch::Receiver<bool>,
    ) -> AgentResult<TurnOutcome> {
        config.validate()?;

        let tools = self.registry.specs();
        let mut round_trips = 0;
        let mut last_answer = String::new();

        loop {
            if round_trips >= config.max_iterations {
                warn!(round_trips, "iteration limit reached without a final answer");
                conversation.push(Message::system().with_text(format!(
                    "Stopped after {} iterations without a final answer.",
                    round_trips
                )));
                return Ok(TurnOutcome::IterationLimit {
                    partial: last_answer,
                });
            }

            conversation.truncate_to_fit(&config.system_prompt, &tools, config.context_limit);

            let (response, _usage) = tokio::select! {
                biased;
                _ = stop_requested(&mut stop) => {
                    // Nothing is in flight at this point, the transcript is
                    // already consistent
                    return Err(AgentError::Cancelled);
                }
                result = self.complete_with_retries(conversation, &tools, config) => result?,
            };
            round_trips += 1;

            conversation.push(response.clone());

            let text = response.text();
            if !text.is_empty() {
                last_answer = text;
            }

            let requests: Vec<ToolRequest> =
                response.tool_requests().into_iter().cloned().collect();
            if requests.is_empty() {
                debug!(round_trips, "turn complete");
                return Ok(TurnOutcome::Complete(last_answer));
            }

            self.dispatch_requests(conversation, &requests, config, &mut stop)
                .await?;
        }
    }

    /// Dispatch all requested calls concurrently and append one tool message
    /// per request, in request order regardless of completion order.
    async fn dispatch_requests(
        &self,
        conversation: &mut Conversation,
        requests: &[ToolRequest],
        config: &AgentConfig,
        stop: &mut watch::Receiver<bool>,
    ) -> AgentResult<()> {
        let dispatches = requests
            .iter()
            .map(|request| self.registry.dispatch(request, config.tool_timeout));

        let responses = tokio::select! {
            biased;
            _ = stop_requested(stop) => {
                warn!(pending = requests.len(), "turn cancelled while tool calls were in flight");
                // Abandon the in-flight calls but still resolve each id so
                // the model is never left waiting on an open call
                for request in requests {
                    conversation.push(
                        Message::tool()
                            .with_tool_response(request.id.clone(), Err(AgentError::Cancelled)),
                    );
                }
                return Err(AgentError::Cancelled);
            }
            outputs = futures::future::join_all(dispatches) => outputs,
        };

        for response in responses {
            conversation.push(Message::tool().with_content(MessageContent::ToolResponse(response)));
        }
        Ok(())
    }

    async fn complete_with_retries(
        &self,
        conversation: &Conversation,
        tools: &[Tool],
        config: &AgentConfig,
    ) -> AgentResult<(Message, Usage)> {
        let mut attempt = 0;
        loop {
            let result = self
                .provider
                .complete(
                    &config.system_prompt,
                    conversation.messages(),
                    tools,
                    config,
                )
                .await;

            match result {
                Ok(ok) => return Ok(ok),
                Err(e) if attempt < config.max_retries => {
                    let backoff = config.retry_backoff * 2u32.saturating_pow(attempt as u32);
                    warn!(attempt, backoff_ms = backoff.as_millis() as u64, error = %e, "completion failed, retrying");
                    tokio::time::sleep(backoff).await;
                    attempt += 1;
                }
                Err(ProviderError::Network(m)) => return Err(AgentError::InferenceNetwork(m)),
                Err(ProviderError::MalformedResponse(m)) => {
                    return Err(AgentError::MalformedResponse(m))
                }
            }
        }
    }
}

/// Resolves once a stop has been requested on the watch channel. Pends
/// forever if the channel closes without one.
async fn stop_requested(stop: &mut watch::Receiver<bool>) {
    loop {
        if *stop.borrow_and_update() {
            return;
        }
        if stop.changed().await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}
