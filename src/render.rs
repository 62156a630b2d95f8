//! Documents and messages to view trees
//!
//! Rendering is pure: a view is derived from its source and can be turned
//! back into the document it came from. The terminal printer consumes views.

mod chart;
mod markdown;
pub mod terminal;

pub use chart::{chart_rows, max_magnitude, ChartRow};
pub use markdown::{parse_markdown, Line, LineKind, SpanStyle};

use crate::conversation::{Message, MessageContent, Role};
use crate::protocol::{Block, ChartSpec, Document};
use chrono::{DateTime, Utc};

/// A paragraph block parsed into lines
#[derive(Debug, Clone, PartialEq)]
pub struct MarkdownView {
    pub source: String,
    pub lines: Vec<Line>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ChartView {
    pub spec: ChartSpec,
    pub rows: Vec<ChartRow>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum BlockView {
    Markdown(MarkdownView),
    Chart(ChartView),
}

#[derive(Debug, Clone, PartialEq)]
pub struct DocumentView {
    pub version: String,
    pub blocks: Vec<BlockView>,
    /// Set when the document could not be rendered
    pub notice: Option<String>,
}

impl DocumentView {
    /// The document this view renders, minus any blocks it skipped
    #[allow(dead_code)] // Inverse of render_document, held to it by the round-trip tests
    pub fn to_document(&self) -> Document {
        let blocks = self
            .blocks
            .iter()
            .map(|block| match block {
                BlockView::Markdown(view) => Block::paragraph(view.source.clone()),
                BlockView::Chart(view) => Block::chart(view.spec.clone()),
            })
            .collect();
        Document::new(blocks).with_version(self.version.clone())
    }
}

/// Render blocks in order. Unknown blocks are skipped; a document of an
/// unknown version renders as a notice only.
pub fn render_document(document: &Document) -> DocumentView {
    if !document.is_supported() {
        tracing::warn!(version = %document.version, "Unsupported document version");
        return DocumentView {
            version: document.version.clone(),
            blocks: Vec::new(),
            notice: Some(format!(
                "Unsupported document version '{}'.",
                document.version
            )),
        };
    }

    let blocks = document
        .blocks
        .iter()
        .filter_map(|block| match block {
            Block::Paragraph { text } => Some(markdown_view(text)),
            Block::Chart { chart } => Some(BlockView::Chart(ChartView {
                spec: chart.clone(),
                rows: chart_rows(chart),
            })),
            Block::Unknown => {
                tracing::debug!("Skipping unknown block type");
                None
            }
        })
        .collect();

    DocumentView {
        version: document.version.clone(),
        blocks,
        notice: None,
    }
}

fn markdown_view(text: &str) -> BlockView {
    BlockView::Markdown(MarkdownView {
        source: text.to_string(),
        lines: parse_markdown(text),
    })
}

#[derive(Debug, Clone, PartialEq)]
pub enum MessageBody {
    Document(DocumentView),
    /// Pretty-printed payload that is neither text nor a document
    Json(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct MessageView {
    pub role: Role,
    pub timestamp: DateTime<Utc>,
    pub body: MessageBody,
    /// Prompt whose form is still open
    pub awaiting_input: bool,
}

/// Render any message. Text is treated as markdown.
pub fn render_message(message: &Message) -> MessageView {
    let body = match &message.content {
        MessageContent::Text(text) => MessageBody::Document(DocumentView {
            version: crate::protocol::DOCUMENT_VERSION_V1.to_string(),
            blocks: vec![markdown_view(text)],
            notice: None,
        }),
        MessageContent::Document(document) => MessageBody::Document(render_document(document)),
        MessageContent::Opaque(value) => MessageBody::Json(
            serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string()),
        ),
    };

    MessageView {
        role: message.role,
        timestamp: message.timestamp,
        body,
        awaiting_input: message.has_open_form(),
    }
}
