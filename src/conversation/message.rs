//! Message types

use crate::protocol::{Block, Document, InputSchema, Output};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Agent,
    System,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeliveryStatus {
    Sending,
    #[allow(dead_code)] // Wire value; the client never marks a message sent
    Sent,
    #[allow(dead_code)]
    Error,
}

/// Body of a message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MessageContent {
    Text(String),
    Document(Document),
    /// Non-document payload returned by a completed execution
    Opaque(Value),
}

impl MessageContent {
    #[cfg(test)]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            MessageContent::Text(text) => Some(text),
            _ => None,
        }
    }
}

impl From<Output> for MessageContent {
    fn from(output: Output) -> Self {
        match output {
            Output::Document(doc) => MessageContent::Document(doc),
            Output::Text(text) => MessageContent::Text(text),
            Output::Opaque(value) => MessageContent::Opaque(value),
        }
    }
}

/// Await-prompt data on an agent message that asks for more input
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FormPrompt {
    pub execution_id: Option<String>,
    pub input_schema: Option<InputSchema>,
    pub has_submitted: bool,
}

impl FormPrompt {
    /// True while the prompt still offers a form the user can submit
    pub fn has_open_form(&self) -> bool {
        !self.has_submitted && self.execution_id.is_some() && self.input_schema.is_some()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: Uuid,
    pub role: Role,
    pub content: MessageContent,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<DeliveryStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompt: Option<FormPrompt>,
}

impl Message {
    pub fn execution_id(&self) -> Option<&str> {
        self.prompt.as_ref()?.execution_id.as_deref()
    }

    pub fn has_open_form(&self) -> bool {
        self.prompt.as_ref().is_some_and(FormPrompt::has_open_form)
    }
}

/// A message that has not been stamped with an id and timestamp yet.
///
/// The state machine produces drafts; the log turns them into messages on
/// append.
#[derive(Debug, Clone, PartialEq)]
pub struct MessageDraft {
    pub role: Role,
    pub content: MessageContent,
    pub status: Option<DeliveryStatus>,
    pub prompt: Option<FormPrompt>,
}

const WELCOME_TEXT: &str = "# Welcome to Aegis Chat\n\n\
I am your intelligent assistant. I can help you generate reports, analyze data, and visualize trends.\n\n\
**Try asking:**\n\
- *\"Generate a sales report\"* (multi-turn flow)\n\
- *\"Show me market analysis\"* (charts)";

impl MessageDraft {
    fn new(role: Role, content: MessageContent) -> Self {
        Self {
            role,
            content,
            status: None,
            prompt: None,
        }
    }

    pub fn user(text: impl Into<String>) -> Self {
        Self {
            status: Some(DeliveryStatus::Sending),
            ..Self::new(Role::User, MessageContent::Text(text.into()))
        }
    }

    pub fn agent(content: MessageContent) -> Self {
        Self::new(Role::Agent, content)
    }

    pub fn system(text: impl Into<String>) -> Self {
        Self::new(Role::System, MessageContent::Text(text.into()))
    }

    pub fn await_prompt(
        text: impl Into<String>,
        execution_id: Option<String>,
        input_schema: Option<InputSchema>,
    ) -> Self {
        Self {
            prompt: Some(FormPrompt {
                execution_id,
                input_schema,
                has_submitted: false,
            }),
            ..Self::new(Role::Agent, MessageContent::Text(text.into()))
        }
    }

    /// Greeting shown before the first turn
    pub fn welcome() -> Self {
        Self::agent(MessageContent::Document(Document::new(vec![
            Block::paragraph(WELCOME_TEXT),
        ])))
    }

    pub(crate) fn into_message(self) -> Message {
        Message {
            id: Uuid::new_v4(),
            role: self.role,
            content: self.content,
            timestamp: Utc::now(),
            status: self.status,
            prompt: self.prompt,
        }
    }
}
