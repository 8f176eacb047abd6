//! Markdown preview pane: renders the buffer with comrak into styled
//! terminal lines.

use comrak::nodes::{AstNode, ListType, NodeValue};
use comrak::{parse_document, Arena, Options};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};

/// Re-render from the current editor content.
pub trait PreviewRenderer {
    fn refresh(&mut self, markdown: &str);
}

pub struct MarkdownPreview {
    lines: Vec<Line<'static>>,
}

impl Default for MarkdownPreview {
    fn default() -> Self {
        Self::new()
    }
}

impl MarkdownPreview {
    pub fn new() -> Self {
        Self { lines: Vec::new() }
    }

    pub fn lines(&self) -> &[Line<'static>] {
        &self.lines
    }

    pub fn line_count(&self) -> usize {
        self.lines.len()
    }
}

impl PreviewRenderer for MarkdownPreview {
    fn refresh(&mut self, markdown: &str) {
        self.lines = render_markdown(markdown);
    }
}

fn render_markdown(source: &str) -> Vec<Line<'static>> {
    let arena = Arena::new();
    let root = parse_document(&arena, source, &Options::default());

    let mut lines = Vec::new();
    for block in root.children() {
        render_block(block, &mut lines, 0);
    }
    while lines.last().map(|l: &Line| l.spans.is_empty()).unwrap_or(false) {
        lines.pop();
    }
    lines
}

fn render_block<'a>(node: &'a AstNode<'a>, lines: &mut Vec<Line<'static>>, indent: usize) {
    let pad = " ".repeat(indent);
    match &node.data.borrow().value {
        NodeValue::Heading(heading) => {
            let style = match heading.level {
                1 => Style::default()
                    .fg(Color::Cyan)
                    .add_modifier(Modifier::BOLD),
                2 => Style::default()
                    .fg(Color::Green)
                    .add_modifier(Modifier::BOLD),
                _ => Style::default().add_modifier(Modifier::BOLD),
            };
            lines.push(Line::from(Span::styled(collect_text(node), style)));
            lines.push(Line::default());
        }
        NodeValue::Paragraph => {
            let mut spans = vec![Span::raw(pad)];
            inline_spans(node, Style::default(), &mut spans);
            lines.push(Line::from(spans));
            lines.push(Line::default());
        }
        NodeValue::CodeBlock(block) => {
            let style = Style::default().fg(Color::Yellow);
            for code_line in block.literal.lines() {
                lines.push(Line::from(Span::styled(
                    format!("{}  {}", pad, code_line),
                    style,
                )));
            }
            lines.push(Line::default());
        }
        NodeValue::List(list) => {
            let start = if list.list_type == ListType::Ordered {
                list.start
            } else {
                0
            };
            for (index, item) in node.children().enumerate() {
                let marker = match list.list_type {
                    ListType::Bullet => "• ".to_string(),
                    ListType::Ordered => format!("{}. ", start + index),
                };
                render_list_item(item, lines, indent, &marker);
            }
            if indent == 0 {
                lines.push(Line::default());
            }
        }
        NodeValue::BlockQuote => {
            for child in node.children() {
                let mut spans = vec![Span::styled(
                    format!("{}│ ", pad),
                    Style::default().fg(Color::DarkGray),
                )];
                inline_spans(
                    child,
                    Style::default().add_modifier(Modifier::ITALIC),
                    &mut spans,
                );
                lines.push(Line::from(spans));
            }
            lines.push(Line::default());
        }
        NodeValue::ThematicBreak => {
            lines.push(Line::from(Span::styled(
                "─".repeat(40),
                Style::default().fg(Color::DarkGray),
            )));
            lines.push(Line::default());
        }
        _ => {
            let text = collect_text(node);
            if !text.is_empty() {
                lines.push(Line::from(Span::raw(format!("{}{}", pad, text))));
                lines.push(Line::default());
            }
        }
    }
}

fn render_list_item<'a>(
    item: &'a AstNode<'a>,
    lines: &mut Vec<Line<'static>>,
    indent: usize,
    marker: &str,
) {
    let mut first = true;
    for child in item.children() {
        match &child.data.borrow().value {
            NodeValue::Paragraph => {
                let prefix = if first {
                    format!("{}{}", " ".repeat(indent), marker)
                } else {
                    " ".repeat(indent + marker.chars().count())
                };
                first = false;
                let mut spans = vec![Span::raw(prefix)];
                inline_spans(child, Style::default(), &mut spans);
                lines.push(Line::from(spans));
            }
            NodeValue::List(_) => render_block(child, lines, indent + 2),
            _ => {}
        }
    }
}

fn inline_spans<'a>(node: &'a AstNode<'a>, style: Style, spans: &mut Vec<Span<'static>>) {
    for child in node.children() {
        match &child.data.borrow().value {
            NodeValue::Text(text) => spans.push(Span::styled(text.clone(), style)),
            NodeValue::Code(code) => spans.push(Span::styled(
                code.literal.clone(),
                style.fg(Color::Yellow),
            )),
            NodeValue::Strong => {
                inline_spans(child, style.add_modifier(Modifier::BOLD), spans);
            }
            NodeValue::Emph => {
                inline_spans(child, style.add_modifier(Modifier::ITALIC), spans);
            }
            NodeValue::Link(_) => {
                inline_spans(
                    child,
                    style.fg(Color::Blue).add_modifier(Modifier::UNDERLINED),
                    spans,
                );
            }
            NodeValue::Image(_) => {
                spans.push(Span::styled("[image]", style.fg(Color::DarkGray)));
            }
            NodeValue::SoftBreak | NodeValue::LineBreak => spans.push(Span::raw(" ")),
            _ => {
                let text = collect_text(child);
                if !text.is_empty() {
                    spans.push(Span::styled(text, style));
                }
            }
        }
    }
}

fn collect_text<'a>(node: &'a AstNode<'a>) -> String {
    let mut out = String::new();
    collect_text_into(node, &mut out);
    out
}

fn collect_text_into<'a>(node: &'a AstNode<'a>, out: &mut String) {
    match &node.data.borrow().value {
        NodeValue::Text(text) => out.push_str(text),
        NodeValue::Code(code) => out.push_str(&code.literal),
        NodeValue::SoftBreak | NodeValue::LineBreak => out.push(' '),
        _ => {
            for child in node.children() {
                collect_text_into(child, out);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn flat(line: &Line) -> String {
        line.spans.iter().map(|s| s.content.as_ref()).collect()
    }

    #[test]
    fn heading_and_paragraph_render_as_separate_lines() {
        let mut preview = MarkdownPreview::new();
        preview.refresh("# Title\n\nSome body text.");
        let lines = preview.lines();
        assert!(lines.len() >= 3);
        assert_eq!(flat(&lines[0]), "Title");
        assert!(lines.iter().any(|l| flat(l).contains("Some body text.")));
    }

    #[test]
    fn code_block_keeps_its_literal_lines() {
        let mut preview = MarkdownPreview::new();
        preview.refresh("```\nlet x = 1;\nlet y = 2;\n```");
        let rendered: Vec<String> = preview.lines().iter().map(flat).collect();
        assert!(rendered.iter().any(|l| l.contains("let x = 1;")));
        assert!(rendered.iter().any(|l| l.contains("let y = 2;")));
    }

    #[test]
    fn bullet_lists_get_markers() {
        let mut preview = MarkdownPreview::new();
        preview.refresh("- first\n- second");
        let rendered: Vec<String> = preview.lines().iter().map(flat).collect();
        assert!(rendered.iter().any(|l| l.starts_with("• ") && l.contains("first")));
    }

    #[test]
    fn ordered_lists_count_from_start() {
        let mut preview = MarkdownPreview::new();
        preview.refresh("3. third\n4. fourth");
        let rendered: Vec<String> = preview.lines().iter().map(flat).collect();
        assert!(rendered.iter().any(|l| l.starts_with("3. ")));
        assert!(rendered.iter().any(|l| l.starts_with("4. ")));
    }

    #[test]
    fn empty_document_renders_nothing() {
        let mut preview = MarkdownPreview::new();
        preview.refresh("");
        assert_eq!(preview.line_count(), 0);
    }
}
