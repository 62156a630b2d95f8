//! Append-only message log

use super::{Message, MessageDraft};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LogError {
    #[error("No prompt owns execution {0}")]
    UnknownExecution(String),
    #[error("Input for execution {0} was already submitted")]
    AlreadySubmitted(String),
}

/// Ordered message history.
///
/// Messages are only ever appended. The one in-place change allowed is
/// locking the form of a prompt once its input has been submitted.
#[derive(Debug, Clone, Default)]
pub struct MessageLog {
    messages: Vec<Message>,
}

impl MessageLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn append(&mut self, draft: MessageDraft) -> &Message {
        self.messages.push(draft.into_message());
        &self.messages[self.messages.len() - 1]
    }

    /// Lock the newest prompt owning `execution_id`
    pub(crate) fn mark_submitted(&mut self, execution_id: &str) -> Result<&Message, LogError> {
        self.check_submittable(execution_id)?;
        let index = self.prompt_index(execution_id)?;
        let message = &mut self.messages[index];
        if let Some(prompt) = message.prompt.as_mut() {
            prompt.has_submitted = true;
        }
        Ok(&*message)
    }

    /// Check that a submission against `execution_id` would be accepted
    pub fn check_submittable(&self, execution_id: &str) -> Result<&Message, LogError> {
        let message = &self.messages[self.prompt_index(execution_id)?];
        match &message.prompt {
            Some(prompt) if prompt.has_submitted => {
                Err(LogError::AlreadySubmitted(execution_id.to_string()))
            }
            // Without a schema there is no form to submit
            Some(prompt) if prompt.input_schema.is_some() => Ok(message),
            _ => Err(LogError::UnknownExecution(execution_id.to_string())),
        }
    }

    /// Servers may reuse execution ids across flows, so the newest prompt wins.
    fn prompt_index(&self, execution_id: &str) -> Result<usize, LogError> {
        self.messages
            .iter()
            .rposition(|m| m.execution_id() == Some(execution_id))
            .ok_or_else(|| LogError::UnknownExecution(execution_id.to_string()))
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }
}
