//! Versioned structured document format (`type: "document"`, `version: "v1"`)

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use thiserror::Error;

/// The only document version this client knows how to render
pub const DOCUMENT_VERSION_V1: &str = "v1";

/// Discriminator for the `type` field. Having a single variant makes any
/// object whose `type` is not `"document"` fail to parse as a [`Document`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
enum DocumentKind {
    Document,
}

/// A document: ordered blocks plus a schema version
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    #[serde(rename = "type")]
    kind: DocumentKind,
    /// Kept as the raw string so unknown versions survive a round trip
    pub version: String,
    #[serde(deserialize_with = "lenient_blocks")]
    pub blocks: Vec<Block>,
}

impl Document {
    pub fn new(blocks: Vec<Block>) -> Self {
        Self {
            kind: DocumentKind::Document,
            version: DOCUMENT_VERSION_V1.to_string(),
            blocks,
        }
    }

    #[must_use]
    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = version.into();
        self
    }

    pub fn is_supported(&self) -> bool {
        self.version == DOCUMENT_VERSION_V1
    }
}

/// One block of a document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Block {
    /// Markdown text
    Paragraph { text: String },
    Chart { chart: ChartSpec },
    /// Any block type this client does not understand
    #[serde(other)]
    Unknown,
}

impl Block {
    pub fn paragraph(text: impl Into<String>) -> Self {
        Block::Paragraph { text: text.into() }
    }

    pub fn chart(chart: ChartSpec) -> Self {
        Block::Chart { chart }
    }
}

/// A malformed block must not take the whole document down with it.
fn lenient_blocks<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<Block>, D::Error> {
    let raw = Vec::<Value>::deserialize(deserializer)?;
    Ok(raw
        .into_iter()
        .map(|value| {
            serde_json::from_value(value).unwrap_or_else(|e| {
                tracing::debug!(error = %e, "Treating malformed document block as unknown");
                Block::Unknown
            })
        })
        .collect())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChartType {
    Bar,
    Line,
}

/// Category-indexed chart: `series[s].data[i]` belongs to category `x[i]`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChartSpec {
    #[serde(rename = "type")]
    pub chart_type: ChartType,
    #[serde(default)]
    pub title: String,
    pub x: Vec<String>,
    pub series: Vec<Series>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Series {
    pub name: String,
    pub data: Vec<f64>,
}

impl Series {
    pub fn new(name: impl Into<String>, data: Vec<f64>) -> Self {
        Self {
            name: name.into(),
            data,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChartError {
    #[error("series '{series}' has {actual} points for {expected} categories")]
    SeriesLengthMismatch {
        series: String,
        expected: usize,
        actual: usize,
    },
}

impl ChartSpec {
    pub fn new(chart_type: ChartType, title: impl Into<String>, x: Vec<String>) -> Self {
        Self {
            chart_type,
            title: title.into(),
            x,
            series: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_series(mut self, series: Series) -> Self {
        self.series.push(series);
        self
    }

    /// Check that every series has exactly one point per category
    pub fn validate(&self) -> Result<(), Vec<ChartError>> {
        let errors: Vec<ChartError> = self
            .series
            .iter()
            .filter(|s| s.data.len() != self.x.len())
            .map(|s| ChartError::SeriesLengthMismatch {
                series: s.name.clone(),
                expected: self.x.len(),
                actual: s.data.len(),
            })
            .collect();
        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}
