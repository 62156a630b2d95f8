//! Execute request body for `POST /api/agent/execute`

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Flat field key → value map submitted for a paused execution
pub type UserInput = Map<String, Value>;

/// Either a fresh query or the resumption of a paused execution.
///
/// The two shapes never mix on the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ExecuteRequest {
    #[serde(rename_all = "camelCase")]
    Resume {
        execution_id: String,
        user_input: UserInput,
    },
    #[serde(rename_all = "camelCase")]
    Query {
        query: String,
        /// Structured inputs passed alongside the query
        #[serde(default, skip_serializing_if = "Option::is_none")]
        inputs: Option<Map<String, Value>>,
        /// Backend adapter selection
        #[serde(default, skip_serializing_if = "Option::is_none")]
        adapter: Option<String>,
    },
}

impl ExecuteRequest {
    pub fn query(text: impl Into<String>) -> Self {
        ExecuteRequest::Query {
            query: text.into(),
            inputs: None,
            adapter: None,
        }
    }

    pub fn resume(execution_id: impl Into<String>, user_input: UserInput) -> Self {
        ExecuteRequest::Resume {
            execution_id: execution_id.into(),
            user_input,
        }
    }

    pub fn execution_id(&self) -> Option<&str> {
        match self {
            ExecuteRequest::Resume { execution_id, .. } => Some(execution_id),
            ExecuteRequest::Query { .. } => None,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            ExecuteRequest::Resume { .. } => "resume",
            ExecuteRequest::Query { .. } => "query",
        }
    }
}
