//! Form state for a schema-declared input request
//!
//! A `DynamicForm` holds what the user typed for each declared field,
//! validates locally, and produces the flat `userInput` map sent back with a
//! resume request.

use crate::conversation::Message;
use crate::protocol::{FieldSpec, FieldType, InputSchema, UserInput};
use serde_json::{Number, Value};
use std::collections::{BTreeMap, HashMap};
use thiserror::Error;

pub const REQUIRED_ERROR: &str = "This field is required";
pub const NUMBER_ERROR: &str = "Must be a number";

/// Input control for one field
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlKind {
    Text,
    Number,
    Toggle,
}

impl From<FieldType> for ControlKind {
    fn from(field_type: FieldType) -> Self {
        match field_type {
            FieldType::String => ControlKind::Text,
            FieldType::Number => ControlKind::Number,
            FieldType::Boolean => ControlKind::Toggle,
        }
    }
}

/// Raw value as entered
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldValue {
    Text(String),
    Toggle(bool),
}

/// Read-only view of one field for rendering
#[derive(Debug, Clone, PartialEq)]
pub struct Control<'a> {
    pub key: &'a str,
    pub kind: ControlKind,
    /// Description when declared, else the key
    pub label: &'a str,
    pub required: bool,
    pub value: Option<&'a FieldValue>,
    pub error: Option<&'a str>,
}

/// Why a submission was refused
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FormRejection {
    #[error("This input was already submitted")]
    Locked,
    #[error("A submission is already in progress")]
    Submitting,
    #[error("{} field(s) need attention", .0.len())]
    Invalid(BTreeMap<String, String>),
}

/// Misuse of a setter
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FieldError {
    #[error("Unknown field '{0}'")]
    UnknownField(String),
    #[error("Field '{key}' expects a {expected:?} control")]
    KindMismatch { key: String, expected: ControlKind },
}

#[derive(Debug, Clone)]
pub struct DynamicForm {
    schema: InputSchema,
    execution_id: Option<String>,
    values: HashMap<String, FieldValue>,
    errors: BTreeMap<String, String>,
    locked: bool,
}

impl DynamicForm {
    pub fn new(schema: InputSchema) -> Self {
        Self {
            schema,
            execution_id: None,
            values: HashMap::new(),
            errors: BTreeMap::new(),
            locked: false,
        }
    }

    /// Form for a prompt message. `None` unless the message declares both an
    /// execution id and a schema.
    pub fn for_message(message: &Message) -> Option<Self> {
        let prompt = message.prompt.as_ref()?;
        let execution_id = prompt.execution_id.clone()?;
        let schema = prompt.input_schema.clone()?;
        Some(Self {
            execution_id: Some(execution_id),
            locked: prompt.has_submitted,
            ..Self::new(schema)
        })
    }

    pub fn execution_id(&self) -> Option<&str> {
        self.execution_id.as_deref()
    }

    pub fn schema(&self) -> &InputSchema {
        &self.schema
    }

    /// One control per field, in declaration order
    pub fn controls(&self) -> Vec<Control<'_>> {
        self.schema
            .iter()
            .map(|(key, spec)| Control {
                key,
                kind: spec.field_type.into(),
                label: spec.description.as_deref().unwrap_or(key),
                required: spec.required,
                value: self.values.get(key),
                error: self.errors.get(key).map(String::as_str),
            })
            .collect()
    }

    /// Store raw text for a string or number field
    pub fn set_text(&mut self, key: &str, raw: impl Into<String>) -> Result<(), FieldError> {
        let kind = self.control_kind(key)?;
        if kind == ControlKind::Toggle {
            return Err(FieldError::KindMismatch {
                key: key.to_string(),
                expected: kind,
            });
        }
        self.store(key, FieldValue::Text(raw.into()));
        Ok(())
    }

    pub fn set_toggle(&mut self, key: &str, on: bool) -> Result<(), FieldError> {
        let kind = self.control_kind(key)?;
        if kind != ControlKind::Toggle {
            return Err(FieldError::KindMismatch {
                key: key.to_string(),
                expected: kind,
            });
        }
        self.store(key, FieldValue::Toggle(on));
        Ok(())
    }

    /// Validate and build the submission. `submitting` is whether the owner
    /// already has a submission in flight.
    pub fn submit(&mut self, submitting: bool) -> Result<UserInput, FormRejection> {
        if self.locked {
            return Err(FormRejection::Locked);
        }
        if submitting {
            return Err(FormRejection::Submitting);
        }

        self.errors.clear();
        let mut input = UserInput::new();
        for (key, spec) in self.schema.iter() {
            match coerce(spec, self.values.get(key)) {
                Ok(Some(value)) => {
                    input.insert(key.to_string(), value);
                }
                Ok(None) if spec.required => {
                    self.errors.insert(key.to_string(), REQUIRED_ERROR.to_string());
                }
                Ok(None) => {}
                Err(message) => {
                    self.errors.insert(key.to_string(), message.to_string());
                }
            }
        }

        if self.errors.is_empty() {
            Ok(input)
        } else {
            tracing::debug!(errors = ?self.errors, "Form validation failed");
            Err(FormRejection::Invalid(self.errors.clone()))
        }
    }

    /// Freeze the form after its values were sent
    pub fn lock(&mut self) {
        self.locked = true;
    }

    pub fn locked(&self) -> bool {
        self.locked
    }

    pub fn submit_visible(&self) -> bool {
        !self.locked
    }

    fn control_kind(&self, key: &str) -> Result<ControlKind, FieldError> {
        self.schema
            .get(key)
            .map(|spec| spec.field_type.into())
            .ok_or_else(|| FieldError::UnknownField(key.to_string()))
    }

    fn store(&mut self, key: &str, value: FieldValue) {
        if self.locked {
            tracing::debug!(key, "Ignoring edit of a submitted form");
            return;
        }
        self.errors.remove(key);
        self.values.insert(key.to_string(), value);
    }
}

/// Wire value for one field. `Ok(None)` means absent.
fn coerce(spec: &FieldSpec, value: Option<&FieldValue>) -> Result<Option<Value>, &'static str> {
    let Some(value) = value else {
        return Ok(None);
    };
    match (spec.field_type, value) {
        (_, FieldValue::Toggle(on)) => Ok(Some(Value::Bool(*on))),
        (_, FieldValue::Text(text)) if text.is_empty() => Ok(None),
        (FieldType::Number, FieldValue::Text(text)) => parse_number(text).map(Some),
        (_, FieldValue::Text(text)) => Ok(Some(Value::String(text.clone()))),
    }
}

/// Integers stay integers on the wire
fn parse_number(text: &str) -> Result<Value, &'static str> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Err(NUMBER_ERROR);
    }
    if let Ok(int) = trimmed.parse::<i64>() {
        return Ok(Value::Number(int.into()));
    }
    trimmed
        .parse::<f64>()
        .ok()
        .and_then(Number::from_f64)
        .map(Value::Number)
        .ok_or(NUMBER_ERROR)
}
