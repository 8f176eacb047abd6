use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

use crate::app::{App, Focus};
use crate::assistant::ProposalAction;
use crate::tui::AppEvent;

pub async fn handle_event(app: &mut App, event: AppEvent) {
    match event {
        AppEvent::Key(key) => handle_key(app, key).await,
        AppEvent::Resize(_, _) => {}
        AppEvent::Tick => {
            app.tick();
            app.poll_pending().await;
            app.poll_autosave().await;
        }
    }
}

async fn handle_key(app: &mut App, key: KeyEvent) {
    // The history overlay is modal; it swallows everything while open.
    if app.history.is_some() {
        handle_history_key(app, key);
        return;
    }

    if key.modifiers.contains(KeyModifiers::CONTROL) {
        match key.code {
            KeyCode::Char('c') | KeyCode::Char('q') => {
                app.should_quit = true;
            }
            KeyCode::Char('s') => app.save_current().await,
            KeyCode::Char('n') => app.new_document(),
            KeyCode::Char('t') => app.toggle_assistant_mode(),
            KeyCode::Char('b') => {
                app.show_sidebar = !app.show_sidebar;
                if !app.show_sidebar && app.focus == Focus::Documents {
                    app.focus = Focus::Editor;
                }
            }
            KeyCode::Char('p') => app.show_preview = !app.show_preview,
            KeyCode::Char('g') => {
                app.show_assistant = !app.show_assistant;
                if !app.show_assistant
                    && matches!(app.focus, Focus::Assistant | Focus::Proposals)
                {
                    app.focus = Focus::Editor;
                }
            }
            KeyCode::Char('h') => app.open_history().await,
            _ => {}
        }
        return;
    }

    if key.code == KeyCode::Tab {
        app.cycle_focus();
        return;
    }

    match app.focus {
        Focus::Documents => handle_documents_key(app, key).await,
        Focus::Editor => handle_editor_key(app, key),
        Focus::Assistant => handle_assistant_key(app, key),
        Focus::Proposals => handle_proposals_key(app, key),
    }
}

fn handle_editor_key(app: &mut App, key: KeyEvent) {
    let extend = key.modifiers.contains(KeyModifiers::SHIFT);
    match key.code {
        // "/" summons the assistant, but only when nothing is selected so
        // replacing selected text with a literal slash still works.
        KeyCode::Char('/') if app.editor.selection().is_none() => {
            app.activate_assistant();
        }
        KeyCode::Char(c) => {
            app.editor.insert_char(c);
            app.editor_changed();
        }
        KeyCode::Enter => {
            app.editor.insert_char('\n');
            app.editor_changed();
        }
        KeyCode::Backspace => {
            app.editor.backspace();
            app.editor_changed();
        }
        KeyCode::Delete => {
            app.editor.delete();
            app.editor_changed();
        }
        KeyCode::Left => app.editor.move_left(extend),
        KeyCode::Right => app.editor.move_right(extend),
        KeyCode::Up => app.editor.move_up(extend),
        KeyCode::Down => app.editor.move_down(extend),
        KeyCode::Home => app.editor.move_home(extend),
        KeyCode::End => app.editor.move_end(extend),
        KeyCode::Esc => app.editor.clear_selection(),
        _ => {}
    }
}

fn handle_assistant_key(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Enter => app.send_assistant_message(),
        KeyCode::Char(c) => app.assistant.input_insert(c),
        KeyCode::Backspace => app.assistant.input_backspace(),
        KeyCode::Delete => app.assistant.input_delete(),
        KeyCode::Left => app.assistant.input_left(),
        KeyCode::Right => app.assistant.input_right(),
        KeyCode::Home => app.assistant.input_home(),
        KeyCode::End => app.assistant.input_end(),
        KeyCode::Up => {
            app.transcript_follow = false;
            app.transcript_scroll = app.transcript_scroll.saturating_sub(1);
        }
        KeyCode::Down => {
            app.transcript_scroll = app.transcript_scroll.saturating_add(1);
        }
        KeyCode::Esc => app.focus = Focus::Editor,
        _ => {}
    }
}

fn handle_proposals_key(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Up => app.proposal_nav_up(),
        KeyCode::Down => app.proposal_nav_down(),
        KeyCode::Char('k') => app.resolve_selected_proposal(ProposalAction::Keep),
        KeyCode::Char('i') => app.resolve_selected_proposal(ProposalAction::Insert),
        KeyCode::Char('d') => app.resolve_selected_proposal(ProposalAction::Discard),
        KeyCode::Esc => app.focus = Focus::Assistant,
        _ => {}
    }
}

async fn handle_documents_key(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Up | KeyCode::Char('k') => {
            let i = app.doc_state.selected().unwrap_or(0);
            app.doc_state.select(Some(i.saturating_sub(1)));
        }
        KeyCode::Down | KeyCode::Char('j') => {
            if !app.documents.is_empty() {
                let i = app.doc_state.selected().unwrap_or(0);
                app.doc_state
                    .select(Some((i + 1).min(app.documents.len() - 1)));
            }
        }
        KeyCode::Enter => app.open_selected().await,
        KeyCode::Char('n') => app.new_document(),
        KeyCode::Char('d') => app.delete_selected().await,
        KeyCode::Char('h') => app.open_history().await,
        KeyCode::Esc => app.focus = Focus::Editor,
        _ => {}
    }
}

fn handle_history_key(app: &mut App, key: KeyEvent) {
    let Some(view) = app.history.as_mut() else {
        return;
    };
    match key.code {
        KeyCode::Up | KeyCode::Char('k') => {
            let i = view.state.selected().unwrap_or(0);
            view.state.select(Some(i.saturating_sub(1)));
        }
        KeyCode::Down | KeyCode::Char('j') => {
            if !view.entries.is_empty() {
                let i = view.state.selected().unwrap_or(0);
                view.state.select(Some((i + 1).min(view.entries.len() - 1)));
            }
        }
        KeyCode::Enter => app.restore_history_entry(),
        KeyCode::Esc | KeyCode::Char('q') => app.close_history(),
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::editor::EditorSurface;
    use crossterm::event::KeyEvent;

    fn key(code: KeyCode) -> AppEvent {
        AppEvent::Key(KeyEvent::new(code, KeyModifiers::NONE))
    }

    fn ctrl(c: char) -> AppEvent {
        AppEvent::Key(KeyEvent::new(KeyCode::Char(c), KeyModifiers::CONTROL))
    }

    fn app() -> App {
        App::new(&Config::new())
    }

    #[tokio::test]
    async fn typing_in_the_editor_marks_the_document_dirty() {
        let mut app = app();
        handle_event(&mut app, key(KeyCode::Char('a'))).await;
        assert_eq!(app.editor.text(), "a");
        assert!(app.dirty);
        assert!(app.autosave.is_armed());
    }

    #[tokio::test]
    async fn slash_with_no_selection_summons_the_assistant() {
        let mut app = app();
        handle_event(&mut app, key(KeyCode::Char('/'))).await;
        assert_eq!(app.focus, Focus::Assistant);
        assert_eq!(app.editor.text(), "");
        assert_eq!(app.assistant.input(), "");
    }

    #[tokio::test]
    async fn slash_over_a_selection_is_a_normal_keystroke() {
        let mut app = app();
        app.editor.set_value("abc");
        app.editor.move_right(true);
        handle_event(&mut app, key(KeyCode::Char('/'))).await;
        assert_eq!(app.focus, Focus::Editor);
        assert_eq!(app.editor.text(), "/bc");
    }

    #[tokio::test]
    async fn ctrl_q_requests_quit() {
        let mut app = app();
        handle_event(&mut app, ctrl('q')).await;
        assert!(app.should_quit);
    }

    #[tokio::test]
    async fn hiding_the_sidebar_moves_focus_back_to_the_editor() {
        let mut app = app();
        app.focus = Focus::Documents;
        handle_event(&mut app, ctrl('b')).await;
        assert!(!app.show_sidebar);
        assert_eq!(app.focus, Focus::Editor);
    }

    #[tokio::test]
    async fn assistant_enter_with_blank_draft_sends_nothing() {
        let mut app = app();
        app.focus = Focus::Assistant;
        app.assistant.set_input("   ");
        handle_event(&mut app, key(KeyCode::Enter)).await;
        assert!(app.pending.is_empty());
    }

    #[tokio::test]
    async fn tab_cycles_focus_through_visible_panes() {
        let mut app = app();
        assert_eq!(app.focus, Focus::Editor);
        handle_event(&mut app, key(KeyCode::Tab)).await;
        assert_eq!(app.focus, Focus::Assistant);
        handle_event(&mut app, key(KeyCode::Tab)).await;
        assert_eq!(app.focus, Focus::Documents);
    }
}
