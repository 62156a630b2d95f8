//! Dynamic input schema declared by a paused execution

use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

/// Value type of a single form field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    String,
    Boolean,
    Number,
}

/// Declaration of one input field
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldSpec {
    #[serde(rename = "type")]
    pub field_type: FieldType,
    #[serde(default)]
    pub required: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl FieldSpec {
    pub fn new(field_type: FieldType, required: bool) -> Self {
        Self {
            field_type,
            required,
            description: None,
        }
    }

    pub fn string(required: bool) -> Self {
        Self::new(FieldType::String, required)
    }

    pub fn boolean(required: bool) -> Self {
        Self::new(FieldType::Boolean, required)
    }

    #[cfg(test)]
    pub fn number(required: bool) -> Self {
        Self::new(FieldType::Number, required)
    }

    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

/// Field key → spec, in the order the server declared them.
///
/// JSON objects are unordered in principle, but the display order of a form
/// follows the declaration, so the wire order is kept instead of sorting.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct InputSchema {
    fields: Vec<(String, FieldSpec)>,
}

impl InputSchema {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a field. Redeclaring a key replaces its spec but keeps its position.
    #[must_use]
    pub fn with_field(mut self, key: impl Into<String>, spec: FieldSpec) -> Self {
        self.insert(key.into(), spec);
        self
    }

    fn insert(&mut self, key: String, spec: FieldSpec) {
        match self.fields.iter_mut().find(|(k, _)| *k == key) {
            Some((_, existing)) => *existing = spec,
            None => self.fields.push((key, spec)),
        }
    }

    pub fn get(&self, key: &str) -> Option<&FieldSpec> {
        self.fields
            .iter()
            .find_map(|(k, spec)| (k == key).then_some(spec))
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &FieldSpec)> {
        self.fields.iter().map(|(k, spec)| (k.as_str(), spec))
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }
}

impl Serialize for InputSchema {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.fields.len()))?;
        for (key, spec) in &self.fields {
            map.serialize_entry(key, spec)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for InputSchema {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct SchemaVisitor;

        impl<'de> Visitor<'de> for SchemaVisitor {
            type Value = InputSchema;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a map of field names to field specs")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Self::Value, A::Error> {
                let mut schema = InputSchema::new();
                while let Some((key, spec)) = access.next_entry::<String, FieldSpec>()? {
                    schema.insert(key, spec);
                }
                Ok(schema)
            }
        }

        deserializer.deserialize_map(SchemaVisitor)
    }
}
