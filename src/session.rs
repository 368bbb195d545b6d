use tokio::sync::watch;

use crate::agent::{Agent, TurnOutcome};
use crate::config::AgentConfig;
use crate::conversation::Conversation;
use crate::errors::AgentResult;
use crate::models::message::Message;

/// Cancels the turn currently running on the session it was taken from.
/// Clonable so the UI layer can wire it to a stop control.
#[derive(Clone)]
pub struct StopHandle {
    sender: watch::Sender<bool>,
}

impl StopHandle {
    pub fn stop(&self) {
        let _ = self.sender.send(true);
    }
}

/// One user's isolated conversation and orchestrator. Sessions share no
/// mutable state with each other, so one session is one unit of isolation
/// and no locking is involved.
pub struct Session {
    agent: Agent,
    conversation: Conversation,
    stop: watch::Sender<bool>,
}

impl Session {
    pub fn new(agent: Agent) -> Self {
        let (stop, _) = watch::channel(false);
        Self {
            agent,
            conversation: Conversation::new(),
            stop,
        }
    }

    /// Handle for cancelling the in-flight turn from another task
    pub fn stop_handle(&self) -> StopHandle {
        StopHandle {
            sender: self.stop.clone(),
        }
    }

    /// The transcript so far. Preserved across failed turns so a session
    /// can be resumed after an error.
    pub fn conversation(&self) -> &Conversation {
        &self.conversation
    }

    /// Run one turn: append the user message and drive the loop until a
    /// final answer, the iteration cap, cancellation, or a terminal error.
    /// The config is treated as immutable for the duration of the turn.
    pub async fn reply(&mut self, text: &str, config: &AgentConfig) -> AgentResult<TurnOutcome> {
        // Clear any stop left over from a previous turn
        self.stop.send_replace(false);
        let stop_rx = self.stop.subscribe();

        self.conversation.push(Message::user().with_text(text));
        self.agent
            .run_turn(&mut self.conversation, config, stop_rx)
            .await
    }
}
