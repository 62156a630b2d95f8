//! Execute response, tagged by `status`

use super::{Document, InputSchema};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Response to an execute request.
///
/// Each status carries its own payload; fields that belong to another status
/// are never parsed, so they can never be consulted by mistake.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecuteResponse {
    #[serde(flatten)]
    pub outcome: Outcome,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub skill_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub intent: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<u64>,
    #[serde(default)]
    pub success: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Outcome {
    Completed {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        output: Option<Output>,
    },
    #[serde(rename_all = "camelCase")]
    WaitingForInput {
        #[serde(default)]
        execution_id: Option<String>,
        #[serde(default)]
        await_message: Option<String>,
        #[serde(default)]
        input_schema: Option<InputSchema>,
    },
    Failed {
        #[serde(default)]
        error: Option<String>,
    },
}

/// Payload of a completed execution
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Output {
    Document(Document),
    Text(String),
    /// Anything else the agent returned, kept verbatim
    Opaque(Value),
}

/// Bare status, for logging and assertions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseStatus {
    Completed,
    WaitingForInput,
    Failed,
}

impl fmt::Display for ResponseStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ResponseStatus::Completed => "COMPLETED",
            ResponseStatus::WaitingForInput => "WAITING_FOR_INPUT",
            ResponseStatus::Failed => "FAILED",
        })
    }
}

impl ExecuteResponse {
    fn with_outcome(outcome: Outcome, success: bool) -> Self {
        Self {
            outcome,
            skill_id: None,
            intent: None,
            duration_ms: None,
            success,
        }
    }

    pub fn completed(output: impl Into<Output>) -> Self {
        Self::with_outcome(
            Outcome::Completed {
                output: Some(output.into()),
            },
            true,
        )
    }

    pub fn waiting_for_input(
        execution_id: impl Into<String>,
        await_message: impl Into<String>,
        input_schema: InputSchema,
    ) -> Self {
        Self::with_outcome(
            Outcome::WaitingForInput {
                execution_id: Some(execution_id.into()),
                await_message: Some(await_message.into()),
                input_schema: Some(input_schema),
            },
            true,
        )
    }

    /// A FAILED response as produced locally by the transport
    pub fn failed(error: impl Into<String>) -> Self {
        Self::with_outcome(
            Outcome::Failed {
                error: Some(error.into()),
            },
            false,
        )
        .with_duration_ms(0)
    }

    #[must_use]
    pub fn with_skill(mut self, skill_id: impl Into<String>, intent: impl Into<String>) -> Self {
        self.skill_id = Some(skill_id.into());
        self.intent = Some(intent.into());
        self
    }

    #[must_use]
    pub fn with_duration_ms(mut self, duration_ms: u64) -> Self {
        self.duration_ms = Some(duration_ms);
        self
    }

    pub fn status(&self) -> ResponseStatus {
        match self.outcome {
            Outcome::Completed { .. } => ResponseStatus::Completed,
            Outcome::WaitingForInput { .. } => ResponseStatus::WaitingForInput,
            Outcome::Failed { .. } => ResponseStatus::Failed,
        }
    }
}

impl From<Document> for Output {
    fn from(doc: Document) -> Self {
        Output::Document(doc)
    }
}

impl From<String> for Output {
    fn from(text: String) -> Self {
        Output::Text(text)
    }
}

impl From<&str> for Output {
    fn from(text: &str) -> Self {
        Output::Text(text.to_string())
    }
}
