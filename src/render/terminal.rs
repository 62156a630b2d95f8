//! Plain-text printer for view trees, with optional ANSI styling

use super::{
    max_magnitude, BlockView, ChartView, DocumentView, Line, LineKind, MessageBody, MessageView,
    SpanStyle,
};
use crate::conversation::Role;
use crate::form::{Control, ControlKind, DynamicForm, FieldValue};
use crate::protocol::ChartType;
use crossterm::style::{style, Color, Stylize};
use std::fmt::Write as _;
use std::io::IsTerminal;

const DEFAULT_CHART_WIDTH: usize = 32;

pub struct TerminalPrinter {
    color: bool,
    chart_width: usize,
}

impl TerminalPrinter {
    pub fn new(color: bool) -> Self {
        Self {
            color,
            chart_width: DEFAULT_CHART_WIDTH,
        }
    }

    /// Color when stdout is a terminal and `NO_COLOR` is unset
    pub fn detect() -> Self {
        let color = std::io::stdout().is_terminal() && std::env::var_os("NO_COLOR").is_none();
        Self::new(color)
    }

    #[must_use]
    pub fn with_chart_width(mut self, width: usize) -> Self {
        self.chart_width = width.max(1);
        self
    }

    pub fn message(&self, view: &MessageView) -> String {
        let (name, color) = match view.role {
            Role::User => ("You", Color::Cyan),
            Role::Agent => ("Aegis", Color::Green),
            Role::System => ("System", Color::Red),
        };
        let mut out = format!(
            "{} {}\n",
            self.paint(name, color, true),
            self.dim(&view.timestamp.format("%H:%M").to_string())
        );

        match &view.body {
            MessageBody::Document(doc) => out.push_str(&self.document(doc)),
            MessageBody::Json(json) => {
                for line in json.lines() {
                    let _ = writeln!(out, "  {}", self.dim(line));
                }
            }
        }
        if view.awaiting_input {
            let _ = writeln!(
                out,
                "  {}",
                self.dim("(fill in the form below, or /cancel to skip)")
            );
        }
        out
    }

    pub fn document(&self, view: &DocumentView) -> String {
        let mut out = String::new();
        if let Some(notice) = &view.notice {
            let _ = writeln!(out, "  {}", self.paint(notice, Color::Yellow, false));
        }
        for (i, block) in view.blocks.iter().enumerate() {
            if i > 0 {
                out.push('\n');
            }
            match block {
                BlockView::Markdown(markdown) => {
                    for line in &markdown.lines {
                        out.push_str(&self.line(line));
                        out.push('\n');
                    }
                }
                BlockView::Chart(chart) => out.push_str(&self.chart(chart)),
            }
        }
        out
    }

    pub fn line(&self, line: &Line) -> String {
        let mut out = String::from("  ");
        for _ in 0..line.quote_depth {
            out.push_str(&self.dim("│ "));
        }
        out.push_str(&"  ".repeat(line.indent));

        match &line.kind {
            LineKind::Rule => {
                out.push_str(&self.dim(&"─".repeat(self.chart_width)));
                return out;
            }
            LineKind::ListItem { marker } => {
                out.push_str(marker);
                out.push(' ');
            }
            LineKind::Heading(level) => {
                let text = line.text();
                let text = if *level <= 2 { text.to_uppercase() } else { text };
                out.push_str(&self.paint(&text, Color::White, true));
                return out;
            }
            LineKind::CodeBlock => {
                out.push_str("    ");
                out.push_str(&self.paint(&line.text(), Color::DarkYellow, false));
                return out;
            }
            LineKind::Paragraph => {}
        }

        for span in &line.spans {
            out.push_str(&self.span(&span.text, span.style));
        }
        out
    }

    pub fn chart(&self, view: &ChartView) -> String {
        let spec = &view.spec;
        let mut out = String::new();
        let kind = match spec.chart_type {
            ChartType::Bar => "bar",
            ChartType::Line => "line",
        };
        let _ = writeln!(
            out,
            "  {} {}",
            self.paint(&spec.title, Color::White, true),
            self.dim(&format!("[{kind} chart]"))
        );

        let category_width = view.rows.iter().map(|r| r.category.chars().count()).max().unwrap_or(0);
        let series_width = spec.series.iter().map(|s| s.name.chars().count()).max().unwrap_or(0);
        let max = max_magnitude(&view.rows);
        let palette = [Color::Blue, Color::Magenta, Color::Cyan, Color::Yellow];

        for row in &view.rows {
            for (i, value) in row.values.iter().enumerate() {
                let category = if i == 0 { row.category.as_str() } else { "" };
                let color = palette[i % palette.len()];
                let graphic = match value.value {
                    Some(v) => {
                        let len = scaled(v, max, self.chart_width);
                        let mark = match spec.chart_type {
                            ChartType::Bar => "█".repeat(len),
                            ChartType::Line => format!("{}●", "·".repeat(len.saturating_sub(1))),
                        };
                        format!("{} {}", self.paint(&mark, color, false), format_value(v))
                    }
                    None => self.dim("–"),
                };
                let _ = writeln!(
                    out,
                    "  {category:<category_width$}  {:<series_width$}  {graphic}",
                    value.series
                );
            }
        }
        out
    }

    /// Prompt text for one form field
    pub fn field_prompt(&self, control: &Control<'_>) -> String {
        let hint = match control.kind {
            ControlKind::Toggle => " [y/n]",
            ControlKind::Number => " (number)",
            ControlKind::Text => "",
        };
        let required = if control.required { " *" } else { "" };
        let current = match control.value {
            Some(FieldValue::Text(text)) if !text.is_empty() => format!(" [{text}]"),
            Some(FieldValue::Toggle(on)) => format!(" [{}]", if *on { "y" } else { "n" }),
            _ => String::new(),
        };
        let mut out = format!(
            "  {}{}{hint}{current}: ",
            self.paint(control.label, Color::White, true),
            self.paint(required, Color::Red, false),
        );
        if let Some(error) = control.error {
            out = format!("  {}\n{out}", self.paint(error, Color::Red, false));
        }
        out
    }

    /// One-line state of a prompt's form. A locked form only confirms the
    /// submission; its values are no longer editable.
    pub fn form_status(&self, form: &DynamicForm) -> String {
        if form.locked() {
            return format!("  {}", self.paint("✓ Input submitted", Color::Green, false));
        }
        let required = form.controls().iter().filter(|c| c.required).count();
        self.dim(&format!(
            "  {} field(s), {required} required. Fields marked * must be filled in.",
            form.schema().len()
        ))
    }

    pub fn status(&self, text: &str, ok: bool) -> String {
        let color = if ok { Color::Green } else { Color::Red };
        self.paint(text, color, false)
    }

    fn span(&self, text: &str, span: SpanStyle) -> String {
        if !self.color {
            return text.to_string();
        }
        let mut styled = style(text);
        if span.strong {
            styled = styled.bold();
        }
        if span.emphasis {
            styled = styled.italic();
        }
        if span.strikethrough {
            styled = styled.crossed_out();
        }
        if span.link {
            styled = styled.underlined();
        }
        if span.code {
            styled = styled.with(Color::DarkYellow);
        }
        styled.to_string()
    }

    fn paint(&self, text: &str, color: Color, bold: bool) -> String {
        if !self.color {
            return text.to_string();
        }
        let styled = style(text).with(color);
        if bold {
            styled.bold().to_string()
        } else {
            styled.to_string()
        }
    }

    fn dim(&self, text: &str) -> String {
        if self.color {
            style(text).dim().to_string()
        } else {
            text.to_string()
        }
    }
}

/// Bar length for `value` out of `max`, at least one cell for non-zero values
#[allow(
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::cast_precision_loss
)]
fn scaled(value: f64, max: f64, width: usize) -> usize {
    if max <= 0.0 || !value.is_finite() {
        return 0;
    }
    let cells = (value.abs() / max * width as f64).round() as usize;
    if value.abs() > 0.0 {
        cells.clamp(1, width)
    } else {
        0
    }
}

fn format_value(value: f64) -> String {
    if value.fract().abs() < f64::EPSILON && value.abs() < 1e15 {
        format!("{value:.0}")
    } else {
        format!("{value}")
    }
}
