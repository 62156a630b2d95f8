//! Effects produced by state transitions

use crate::conversation::{MessageContent, MessageDraft};
use crate::protocol::{ExecuteRequest, InputSchema};

/// Effects to be executed after state transition
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    /// Append a message to the log
    AppendMessage { draft: MessageDraft },

    /// Lock the form of the prompt owning this execution
    MarkSubmitted { execution_id: String },

    /// Issue a transport call; its outcome comes back as an event
    Execute { request: ExecuteRequest },

    /// Notify subscribers of the new state
    NotifyStateChange,

    /// Notify subscribers that the turn is over
    NotifySettled,
}

impl Effect {
    pub fn append_user(text: impl Into<String>) -> Self {
        Effect::AppendMessage {
            draft: MessageDraft::user(text),
        }
    }

    pub fn append_agent(content: MessageContent) -> Self {
        Effect::AppendMessage {
            draft: MessageDraft::agent(content),
        }
    }

    pub fn append_system(text: impl Into<String>) -> Self {
        Effect::AppendMessage {
            draft: MessageDraft::system(text),
        }
    }

    pub fn append_prompt(
        text: impl Into<String>,
        execution_id: Option<String>,
        input_schema: Option<InputSchema>,
    ) -> Self {
        Effect::AppendMessage {
            draft: MessageDraft::await_prompt(text, execution_id, input_schema),
        }
    }

    pub fn execute(request: ExecuteRequest) -> Self {
        Effect::Execute { request }
    }
}
