//! Conversation state types

use serde::{Deserialize, Serialize};

/// What the in-flight request is doing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PendingAction {
    /// Fresh query sent by the user
    Query,
    /// Form values submitted for a paused execution
    Resume { execution_id: String },
}

/// Conversation state
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ConvState {
    /// Ready for user input, no request in flight
    #[default]
    Idle,

    /// Exactly one request is in flight
    AwaitingResponse { pending: PendingAction },

    /// Ready for input; the newest message owns an open form
    AwaitingFormInput { execution_id: String },
}

impl ConvState {
    /// Check if a request is in flight
    pub fn is_busy(&self) -> bool {
        matches!(self, ConvState::AwaitingResponse { .. })
    }

    /// Execution id of the form opened by the latest response, if any
    pub fn open_execution_id(&self) -> Option<&str> {
        match self {
            ConvState::AwaitingFormInput { execution_id } => Some(execution_id),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            ConvState::Idle => "idle",
            ConvState::AwaitingResponse { .. } => "awaiting_response",
            ConvState::AwaitingFormInput { .. } => "awaiting_form_input",
        }
    }
}
