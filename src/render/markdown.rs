//! Markdown paragraph text to styled lines

use pulldown_cmark::{Event, HeadingLevel, Options, Parser, Tag};

/// Inline styling of a run of text
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[allow(clippy::struct_excessive_bools)]
pub struct SpanStyle {
    pub strong: bool,
    pub emphasis: bool,
    pub code: bool,
    pub strikethrough: bool,
    pub link: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Span {
    pub text: String,
    pub style: SpanStyle,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LineKind {
    Paragraph,
    Heading(u8),
    /// First line of a list item; `marker` is a bullet or `N.`
    ListItem { marker: String },
    CodeBlock,
    Rule,
}

/// One visual line of rendered markdown
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Line {
    pub kind: LineKind,
    /// List nesting depth
    pub indent: usize,
    /// Block quote nesting depth
    pub quote_depth: usize,
    pub spans: Vec<Span>,
}

impl Line {
    /// Plain text of the line without styling
    pub fn text(&self) -> String {
        self.spans.iter().map(|s| s.text.as_str()).collect()
    }
}

/// Open container, mirrored from the parser's start/end events
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Container {
    Block,
    BlockQuote,
    CodeBlock,
    List,
    Item,
    Emphasis,
    Strong,
    Strikethrough,
    Link,
    Other,
}

#[derive(Default)]
struct LineBuilder {
    lines: Vec<Line>,
    current: Option<Line>,
    stack: Vec<Container>,
    /// Next number for each open list; `None` for bullet lists
    lists: Vec<Option<u64>>,
    quote_depth: usize,
}

/// Parse markdown into lines
pub fn parse_markdown(source: &str) -> Vec<Line> {
    let mut builder = LineBuilder::default();
    let options = Options::ENABLE_STRIKETHROUGH;

    for event in Parser::new_ext(source, options) {
        match event {
            Event::Start(tag) => builder.start(tag),
            Event::End(_) => builder.end(),
            Event::Text(text) => builder.text(&text),
            Event::Code(code) => builder.push_span(&code, SpanStyle {
                code: true,
                ..builder.style()
            }),
            Event::SoftBreak => builder.push_span(" ", builder.style()),
            Event::HardBreak => builder.break_line(),
            Event::Rule => {
                builder.flush();
                builder.lines.push(Line {
                    kind: LineKind::Rule,
                    indent: 0,
                    quote_depth: builder.quote_depth,
                    spans: Vec::new(),
                });
            }
            Event::TaskListMarker(done) => {
                builder.push_span(if done { "[x] " } else { "[ ] " }, builder.style());
            }
            Event::Html(html) | Event::InlineHtml(html) => builder.text(&html),
            _ => {}
        }
    }

    builder.flush();
    builder.lines
}

impl LineBuilder {
    fn start(&mut self, tag: Tag<'_>) {
        let container = match tag {
            Tag::Paragraph => {
                // A loose list item wraps its text in a paragraph; keep the marker line
                let item_line_open = self
                    .current
                    .as_ref()
                    .is_some_and(|l| matches!(l.kind, LineKind::ListItem { .. }) && l.spans.is_empty());
                if !item_line_open {
                    self.open(LineKind::Paragraph, self.lists.len());
                }
                Container::Block
            }
            Tag::Heading { level, .. } => {
                self.open(LineKind::Heading(heading_level(level)), 0);
                Container::Block
            }
            Tag::BlockQuote(_) => {
                self.flush();
                self.quote_depth += 1;
                Container::BlockQuote
            }
            Tag::CodeBlock(_) => {
                self.flush();
                Container::CodeBlock
            }
            Tag::List(start) => {
                self.flush();
                self.lists.push(start);
                Container::List
            }
            Tag::Item => {
                let marker = match self.lists.last_mut() {
                    Some(Some(n)) => {
                        let marker = format!("{n}.");
                        *n += 1;
                        marker
                    }
                    _ => "•".to_string(),
                };
                let indent = self.lists.len().saturating_sub(1);
                self.open(LineKind::ListItem { marker }, indent);
                Container::Item
            }
            Tag::Emphasis => Container::Emphasis,
            Tag::Strong => Container::Strong,
            Tag::Strikethrough => Container::Strikethrough,
            Tag::Link { .. } => Container::Link,
            _ => Container::Other,
        };
        self.stack.push(container);
    }

    fn end(&mut self) {
        match self.stack.pop() {
            Some(Container::Block | Container::Item | Container::CodeBlock) => self.flush(),
            Some(Container::BlockQuote) => {
                self.flush();
                self.quote_depth = self.quote_depth.saturating_sub(1);
            }
            Some(Container::List) => {
                self.flush();
                self.lists.pop();
            }
            _ => {}
        }
    }

    fn text(&mut self, text: &str) {
        if self.stack.contains(&Container::CodeBlock) {
            for line in text.lines() {
                self.open(LineKind::CodeBlock, self.lists.len());
                self.push_span(line, SpanStyle {
                    code: true,
                    ..SpanStyle::default()
                });
                self.flush();
            }
            return;
        }
        self.push_span(text, self.style());
    }

    fn style(&self) -> SpanStyle {
        let mut style = SpanStyle::default();
        for container in &self.stack {
            match container {
                Container::Emphasis => style.emphasis = true,
                Container::Strong => style.strong = true,
                Container::Strikethrough => style.strikethrough = true,
                Container::Link => style.link = true,
                _ => {}
            }
        }
        style
    }

    fn push_span(&mut self, text: &str, style: SpanStyle) {
        if text.is_empty() {
            return;
        }
        if self.current.is_none() {
            self.open(LineKind::Paragraph, self.lists.len());
        }
        let Some(line) = self.current.as_mut() else {
            return;
        };
        match line.spans.last_mut() {
            Some(last) if last.style == style => last.text.push_str(text),
            _ => line.spans.push(Span {
                text: text.to_string(),
                style,
            }),
        }
    }

    /// Hard break: continue on a new line of the same block
    fn break_line(&mut self) {
        let indent = self.current.as_ref().map_or(self.lists.len(), |l| match l.kind {
            LineKind::ListItem { .. } => l.indent + 1,
            _ => l.indent,
        });
        let kind = match self.current.as_ref().map(|l| &l.kind) {
            Some(LineKind::Heading(level)) => LineKind::Heading(*level),
            _ => LineKind::Paragraph,
        };
        self.flush();
        self.open(kind, indent);
    }

    fn open(&mut self, kind: LineKind, indent: usize) {
        self.flush();
        self.current = Some(Line {
            kind,
            indent,
            quote_depth: self.quote_depth,
            spans: Vec::new(),
        });
    }

    /// Finish the current line. Empty paragraphs are dropped; empty list
    /// items and code lines are kept.
    fn flush(&mut self) {
        if let Some(line) = self.current.take() {
            if !line.spans.is_empty() || !matches!(line.kind, LineKind::Paragraph | LineKind::Heading(_)) {
                self.lines.push(line);
            }
        }
    }
}

fn heading_level(level: HeadingLevel) -> u8 {
    match level {
        HeadingLevel::H1 => 1,
        HeadingLevel::H2 => 2,
        HeadingLevel::H3 => 3,
        HeadingLevel::H4 => 4,
        HeadingLevel::H5 => 5,
        HeadingLevel::H6 => 6,
    }
}
