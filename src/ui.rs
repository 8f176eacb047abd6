use ratatui::{
    layout::{Constraint, Layout, Position, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, List, ListItem, Paragraph, Wrap},
    Frame,
};

use crate::app::{App, Focus, StatusLevel};
use crate::assistant::Role;

pub fn draw(frame: &mut Frame, app: &mut App) {
    let area = frame.area();
    let [body, status_bar] =
        Layout::vertical([Constraint::Min(3), Constraint::Length(1)]).areas(area);

    let mut columns = Vec::new();
    if app.show_sidebar {
        columns.push(Constraint::Length(24));
    }
    columns.push(Constraint::Min(30));
    if app.show_preview {
        columns.push(Constraint::Percentage(30));
    }
    if app.show_assistant {
        columns.push(Constraint::Percentage(30));
    }
    let areas = Layout::horizontal(columns).split(body);

    let mut next = 0;
    if app.show_sidebar {
        draw_sidebar(frame, app, areas[next]);
        next += 1;
    }
    draw_editor(frame, app, areas[next]);
    next += 1;
    if app.show_preview {
        draw_preview(frame, app, areas[next]);
        next += 1;
    }
    if app.show_assistant {
        draw_assistant(frame, app, areas[next]);
    }

    draw_status_bar(frame, app, status_bar);

    if app.history.is_some() {
        draw_history_overlay(frame, app, area);
    }
}

fn pane_block(title: &str, focused: bool) -> Block<'_> {
    let border = if focused {
        Style::default().fg(Color::Cyan)
    } else {
        Style::default().fg(Color::DarkGray)
    };
    Block::default()
        .borders(Borders::ALL)
        .border_style(border)
        .title(title)
}

fn draw_sidebar(frame: &mut Frame, app: &mut App, area: Rect) {
    let items: Vec<ListItem> = app
        .documents
        .iter()
        .map(|doc| {
            let marker = if app.current_doc == Some(doc.id) {
                "▸ "
            } else {
                "  "
            };
            ListItem::new(format!("{}{}", marker, doc.title))
        })
        .collect();

    let list = List::new(items)
        .block(pane_block("Documents", app.focus == Focus::Documents))
        .highlight_style(
            Style::default()
                .fg(Color::Black)
                .bg(Color::Cyan)
                .add_modifier(Modifier::BOLD),
        );
    frame.render_stateful_widget(list, area, &mut app.doc_state);
}

fn draw_editor(frame: &mut Frame, app: &mut App, area: Rect) {
    let title = if app.title.trim().is_empty() {
        "Untitled".to_string()
    } else {
        app.title.clone()
    };
    let title = if app.dirty {
        format!("{} *", title)
    } else {
        title
    };
    let block = pane_block(&title, app.focus == Focus::Editor);
    let inner = block.inner(area);

    let (line, col) = app.editor.cursor_line_col();
    // Keep the cursor line in view.
    let height = inner.height.max(1) as usize;
    if line < app.editor_scroll as usize {
        app.editor_scroll = line as u16;
    } else if line >= app.editor_scroll as usize + height {
        app.editor_scroll = (line + 1 - height) as u16;
    }

    let selection = app.editor.selection();
    let lines: Vec<Line> = app
        .editor
        .text()
        .split('\n')
        .scan(0usize, |offset, text| {
            let start = *offset;
            let len = text.chars().count();
            *offset += len + 1;
            Some(styled_editor_line(text, start, selection))
        })
        .collect();

    let paragraph = Paragraph::new(lines)
        .block(block)
        .scroll((app.editor_scroll, 0));
    frame.render_widget(paragraph, area);

    if app.focus == Focus::Editor {
        let x = inner.x + (col as u16).min(inner.width.saturating_sub(1));
        let y = inner.y + (line as u16).saturating_sub(app.editor_scroll);
        frame.set_cursor_position(Position::new(x, y));
    }
}

fn styled_editor_line(
    text: &str,
    line_start: usize,
    selection: Option<(usize, usize)>,
) -> Line<'static> {
    let Some((sel_start, sel_end)) = selection else {
        return Line::from(text.to_string());
    };
    let line_end = line_start + text.chars().count();
    if sel_end <= line_start || sel_start >= line_end {
        return Line::from(text.to_string());
    }

    let from = sel_start.saturating_sub(line_start);
    let to = (sel_end - line_start).min(text.chars().count());
    let chars: Vec<char> = text.chars().collect();
    let before: String = chars[..from].iter().collect();
    let selected: String = chars[from..to].iter().collect();
    let after: String = chars[to..].iter().collect();

    Line::from(vec![
        Span::raw(before),
        Span::styled(selected, Style::default().bg(Color::Blue).fg(Color::White)),
        Span::raw(after),
    ])
}

fn draw_preview(frame: &mut Frame, app: &App, area: Rect) {
    let paragraph = Paragraph::new(app.preview.lines().to_vec())
        .block(pane_block("Preview", false))
        .wrap(Wrap { trim: false });
    frame.render_widget(paragraph, area);
}

fn draw_assistant(frame: &mut Frame, app: &mut App, area: Rect) {
    let proposal_count = app.assistant.unresolved_proposals().count() as u16;
    let proposal_height = if proposal_count > 0 {
        proposal_count.min(4) + 3
    } else {
        0
    };
    let [transcript_area, proposals_area, input_area] = Layout::vertical([
        Constraint::Min(3),
        Constraint::Length(proposal_height),
        Constraint::Length(3),
    ])
    .areas(area);

    draw_transcript(frame, app, transcript_area);
    if proposal_count > 0 {
        draw_proposals(frame, app, proposals_area);
    }
    draw_assistant_input(frame, app, input_area);
}

fn draw_transcript(frame: &mut Frame, app: &mut App, area: Rect) {
    let title = format!("Assistant ({})", app.assistant.mode().label());
    let block = pane_block(&title, app.focus == Focus::Assistant);
    let inner = block.inner(area);

    let mut lines: Vec<Line> = Vec::new();
    for message in app.assistant.transcript() {
        if app.is_pending_placeholder(message.id) {
            let dots = ".".repeat(app.animation_frame as usize + 1);
            lines.push(Line::from(Span::styled(
                format!("{}{}", message.text, dots),
                Style::default()
                    .fg(Color::DarkGray)
                    .add_modifier(Modifier::ITALIC),
            )));
            continue;
        }
        match message.role {
            Role::User => {
                lines.push(Line::from(vec![
                    Span::styled("You: ", Style::default().fg(Color::Cyan)),
                    Span::raw(message.text.clone()),
                ]));
            }
            Role::Assistant => {
                lines.push(Line::from(Span::styled(
                    "AI: ",
                    Style::default().fg(Color::Yellow),
                )));
                for text_line in message.text.lines() {
                    lines.push(Line::from(format!("  {}", text_line)));
                }
            }
            Role::System => {
                lines.push(Line::from(Span::styled(
                    message.text.clone(),
                    Style::default()
                        .fg(Color::DarkGray)
                        .add_modifier(Modifier::ITALIC),
                )));
            }
        }
        lines.push(Line::default());
    }

    let height = inner.height.max(1);
    let max_scroll = (lines.len() as u16).saturating_sub(height);
    if app.transcript_follow {
        app.transcript_scroll = max_scroll;
    } else {
        app.transcript_scroll = app.transcript_scroll.min(max_scroll);
        if app.transcript_scroll == max_scroll {
            app.transcript_follow = true;
        }
    }

    let paragraph = Paragraph::new(lines)
        .block(block)
        .wrap(Wrap { trim: false })
        .scroll((app.transcript_scroll, 0));
    frame.render_widget(paragraph, area);
}

fn draw_proposals(frame: &mut Frame, app: &mut App, area: Rect) {
    let items: Vec<ListItem> = app
        .assistant
        .unresolved_proposals()
        .map(|proposal| {
            let summary: String = proposal.text.chars().take(60).collect();
            ListItem::new(summary.replace('\n', " "))
        })
        .collect();

    let list = List::new(items)
        .block(
            pane_block("Suggestions", app.focus == Focus::Proposals)
                .title_bottom(" k keep · i insert · d discard "),
        )
        .highlight_style(
            Style::default()
                .fg(Color::Black)
                .bg(Color::Yellow)
                .add_modifier(Modifier::BOLD),
        );
    frame.render_stateful_widget(list, area, &mut app.proposal_state);
}

fn draw_assistant_input(frame: &mut Frame, app: &App, area: Rect) {
    let block = pane_block("Ask", app.focus == Focus::Assistant);
    let inner = block.inner(area);
    let paragraph = Paragraph::new(app.assistant.input()).block(block);
    frame.render_widget(paragraph, area);

    if app.focus == Focus::Assistant {
        let cursor = app.assistant.input_cursor() as u16;
        let x = inner.x + cursor.min(inner.width.saturating_sub(1));
        frame.set_cursor_position(Position::new(x, inner.y));
    }
}

fn draw_status_bar(frame: &mut Frame, app: &App, area: Rect) {
    let mut spans = Vec::new();

    if let Some(status) = &app.status {
        let color = match status.level {
            StatusLevel::Info => Color::Gray,
            StatusLevel::Success => Color::Green,
            StatusLevel::Warning => Color::Yellow,
            StatusLevel::Error => Color::Red,
        };
        spans.push(Span::styled(
            status.text.clone(),
            Style::default().fg(color),
        ));
    } else {
        spans.push(Span::styled(
            "Ctrl+S save · Ctrl+N new · Ctrl+T mode · Ctrl+H history · / ask AI",
            Style::default().fg(Color::DarkGray),
        ));
    }

    let mode = format!("  [{}]", app.assistant.mode().label());
    spans.push(Span::styled(mode, Style::default().fg(Color::Magenta)));

    if !app.online {
        spans.push(Span::styled(
            "  offline",
            Style::default().fg(Color::Red),
        ));
    }
    if !app.pending.is_empty() {
        spans.push(Span::styled(
            format!("  {} request(s) in flight", app.pending.len()),
            Style::default().fg(Color::Yellow),
        ));
    }

    frame.render_widget(Paragraph::new(Line::from(spans)), area);
}

fn draw_history_overlay(frame: &mut Frame, app: &mut App, area: Rect) {
    let Some(view) = app.history.as_mut() else {
        return;
    };

    let overlay = centered_rect(60, 60, area);
    frame.render_widget(Clear, overlay);

    let items: Vec<ListItem> = view
        .entries
        .iter()
        .map(|entry| {
            let when = entry.created_at.as_deref().unwrap_or("unknown time");
            let summary: String = entry.content.chars().take(40).collect();
            ListItem::new(format!("{}  {}", when, summary.replace('\n', " ")))
        })
        .collect();

    let list = List::new(items)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Style::default().fg(Color::Cyan))
                .title("History")
                .title_bottom(" Enter restore · Esc close "),
        )
        .highlight_style(
            Style::default()
                .fg(Color::Black)
                .bg(Color::Cyan)
                .add_modifier(Modifier::BOLD),
        );
    frame.render_stateful_widget(list, overlay, &mut view.state);
}

fn centered_rect(percent_x: u16, percent_y: u16, area: Rect) -> Rect {
    let [_, vertical, _] = Layout::vertical([
        Constraint::Percentage((100 - percent_y) / 2),
        Constraint::Percentage(percent_y),
        Constraint::Percentage((100 - percent_y) / 2),
    ])
    .areas(area);
    let [_, horizontal, _] = Layout::horizontal([
        Constraint::Percentage((100 - percent_x) / 2),
        Constraint::Percentage(percent_x),
        Constraint::Percentage((100 - percent_x) / 2),
    ])
    .areas(vertical);
    horizontal
}
