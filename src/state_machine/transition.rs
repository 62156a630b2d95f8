//! Pure state transition function
//!
//! Given the same state, log and event, `transition` always produces the same
//! result and performs no I/O. Every accepted turn appends exactly one message
//! when it resolves.

use super::{ConvState, Effect, Event, PendingAction};
use crate::conversation::{LogError, MessageContent, MessageLog};
use crate::protocol::{ExecuteRequest, ExecuteResponse, Outcome, Output};
use thiserror::Error;

pub(crate) const FALLBACK_FAILED: &str = "Something went wrong.";
pub(crate) const FALLBACK_PROMPT: &str = "Please provide more details.";
pub(crate) const FALLBACK_COMPLETED: &str = "Task completed.";
pub(crate) const QUERY_FAULT: &str = "Error: Failed to connect to Aegis Agent.";
pub(crate) const SUBMIT_FAULT: &str = "Error submitting form data.";

/// Result of a state transition
#[derive(Debug)]
pub struct TransitionResult {
    pub new_state: ConvState,
    pub effects: Vec<Effect>,
}

impl TransitionResult {
    pub fn new(state: ConvState) -> Self {
        Self {
            new_state: state,
            effects: vec![],
        }
    }

    #[must_use]
    pub fn with_effect(mut self, effect: Effect) -> Self {
        self.effects.push(effect);
        self
    }
}

/// Errors that can occur during transition
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransitionError {
    #[error("Message is empty")]
    EmptyQuery,
    #[error("Agent is busy, wait for the current request to finish")]
    Busy,
    #[error("No open form for execution {0}")]
    UnknownExecution(String),
    #[error("Input for execution {0} was already submitted")]
    AlreadySubmitted(String),
    #[error("Invalid transition: {0}")]
    InvalidTransition(String),
}

impl From<LogError> for TransitionError {
    fn from(e: LogError) -> Self {
        match e {
            LogError::UnknownExecution(id) => TransitionError::UnknownExecution(id),
            LogError::AlreadySubmitted(id) => TransitionError::AlreadySubmitted(id),
        }
    }
}

/// Pure transition function
pub fn transition(
    state: &ConvState,
    log: &MessageLog,
    event: Event,
) -> Result<TransitionResult, TransitionError> {
    match (state, event) {
        // ============================================================
        // User actions
        // ============================================================

        // One request at a time
        (ConvState::AwaitingResponse { .. }, Event::SendQuery { .. } | Event::SubmitForm { .. }) => {
            Err(TransitionError::Busy)
        }

        (ConvState::Idle | ConvState::AwaitingFormInput { .. }, Event::SendQuery { text }) => {
            if text.trim().is_empty() {
                return Err(TransitionError::EmptyQuery);
            }
            Ok(TransitionResult::new(ConvState::AwaitingResponse {
                pending: PendingAction::Query,
            })
            .with_effect(Effect::append_user(text.clone()))
            .with_effect(Effect::NotifyStateChange)
            .with_effect(Effect::execute(ExecuteRequest::query(text))))
        }

        (
            ConvState::Idle | ConvState::AwaitingFormInput { .. },
            Event::SubmitForm {
                execution_id,
                values,
            },
        ) => {
            log.check_submittable(&execution_id)?;
            Ok(TransitionResult::new(ConvState::AwaitingResponse {
                pending: PendingAction::Resume {
                    execution_id: execution_id.clone(),
                },
            })
            .with_effect(Effect::MarkSubmitted {
                execution_id: execution_id.clone(),
            })
            .with_effect(Effect::NotifyStateChange)
            .with_effect(Effect::execute(ExecuteRequest::resume(execution_id, values))))
        }

        // ============================================================
        // Transport results
        // ============================================================
        (ConvState::AwaitingResponse { .. }, Event::ResponseReceived { response }) => {
            Ok(handle_response(response))
        }

        (ConvState::AwaitingResponse { pending }, Event::TransportFault { .. }) => {
            let text = match pending {
                PendingAction::Query => QUERY_FAULT,
                PendingAction::Resume { .. } => SUBMIT_FAULT,
            };
            Ok(settle(ConvState::Idle, Effect::append_system(text)))
        }

        // ============================================================
        // Invalid Transitions
        // ============================================================
        (state, event) => Err(TransitionError::InvalidTransition(format!(
            "No transition from {} with event {event:?}",
            state.name()
        ))),
    }
}

/// Dispatch purely on the response status
fn handle_response(response: ExecuteResponse) -> TransitionResult {
    match response.outcome {
        Outcome::Failed { error } => {
            let text = non_empty(error).unwrap_or_else(|| FALLBACK_FAILED.to_string());
            settle(
                ConvState::Idle,
                Effect::append_agent(MessageContent::Text(text)),
            )
        }

        Outcome::WaitingForInput {
            execution_id,
            await_message,
            input_schema,
        } => {
            let text = non_empty(await_message).unwrap_or_else(|| FALLBACK_PROMPT.to_string());
            // A form needs both an execution to resume and fields to fill in
            let next = match (&execution_id, &input_schema) {
                (Some(id), Some(_)) => ConvState::AwaitingFormInput {
                    execution_id: id.clone(),
                },
                _ => ConvState::Idle,
            };
            settle(next, Effect::append_prompt(text, execution_id, input_schema))
        }

        Outcome::Completed { output } => {
            let content = match output {
                Some(Output::Text(text)) if text.is_empty() => None,
                other => other.map(MessageContent::from),
            }
            .unwrap_or_else(|| MessageContent::Text(FALLBACK_COMPLETED.to_string()));
            settle(ConvState::Idle, Effect::append_agent(content))
        }
    }
}

fn settle(state: ConvState, append: Effect) -> TransitionResult {
    TransitionResult::new(state)
        .with_effect(append)
        .with_effect(Effect::NotifyStateChange)
        .with_effect(Effect::NotifySettled)
}

fn non_empty(text: Option<String>) -> Option<String> {
    text.filter(|t| !t.is_empty())
}
