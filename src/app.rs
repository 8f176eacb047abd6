use std::time::{Duration, Instant};

use ratatui::widgets::ListState;
use tokio::task::JoinHandle;

use crate::api::{AiOutcome, ApiClient, TransportError};
use crate::assistant::{AssistantSession, MessageId, Mode, ProposalAction};
use crate::autosave::{AutosaveScheduler, DebouncedAutosave};
use crate::config::Config;
use crate::documents::{Document, DocumentClient, HistoryEntry};
use crate::editor::{EditorSurface, TextBuffer};
use crate::preview::{MarkdownPreview, PreviewRenderer};

const STATUS_DISPLAY: Duration = Duration::from_secs(4);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Focus {
    Documents,
    Editor,
    Assistant,
    Proposals,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusLevel {
    Info,
    Success,
    Warning,
    Error,
}

pub struct StatusMessage {
    pub text: String,
    pub level: StatusLevel,
    pub expires: Instant,
}

/// One in-flight AI request: the spawned query task plus the placeholder it
/// must retire when it settles.
pub struct PendingRequest {
    pub placeholder: MessageId,
    pub task: JoinHandle<AiOutcome>,
}

pub struct HistoryView {
    pub entries: Vec<HistoryEntry>,
    pub state: ListState,
}

pub struct App {
    pub should_quit: bool,
    pub focus: Focus,
    pub show_sidebar: bool,
    pub show_preview: bool,
    pub show_assistant: bool,

    // Editing state
    pub editor: TextBuffer,
    pub preview: MarkdownPreview,
    pub autosave: DebouncedAutosave,
    pub editor_scroll: u16,

    // AI assistant state
    pub assistant: AssistantSession,
    pub pending: Vec<PendingRequest>,
    pub transcript_scroll: u16,
    pub transcript_follow: bool,
    pub proposal_state: ListState,
    pub animation_frame: u8,

    // Remote services
    pub api: ApiClient,
    pub store: DocumentClient,
    pub online: bool,

    // Document bookkeeping
    pub documents: Vec<Document>,
    pub doc_state: ListState,
    pub current_doc: Option<i64>,
    pub title: String,
    pub dirty: bool,
    pub history: Option<HistoryView>,

    pub status: Option<StatusMessage>,
}

impl App {
    pub fn new(config: &Config) -> Self {
        let base_url = config.server_url();
        let mut editor = TextBuffer::new();
        editor.focus();

        Self {
            should_quit: false,
            focus: Focus::Editor,
            show_sidebar: true,
            show_preview: true,
            show_assistant: true,

            editor,
            preview: MarkdownPreview::new(),
            autosave: DebouncedAutosave::new(config.autosave_delay()),
            editor_scroll: 0,

            assistant: AssistantSession::new(),
            pending: Vec::new(),
            transcript_scroll: 0,
            transcript_follow: true,
            proposal_state: ListState::default(),
            animation_frame: 0,

            api: ApiClient::new(base_url),
            store: DocumentClient::new(base_url),
            online: false,

            documents: Vec::new(),
            doc_state: ListState::default(),
            current_doc: None,
            title: String::new(),
            dirty: false,
            history: None,

            status: None,
        }
    }

    /// Connectivity probe plus initial document list.
    pub async fn startup(&mut self) {
        match self.api.probe().await {
            Ok(()) => {
                self.online = true;
                log::info!("connected to backend");
            }
            Err(err) => {
                self.online = false;
                log::warn!("backend probe failed: {}", err);
                self.show_status("Backend unreachable; working offline", StatusLevel::Warning);
            }
        }
        self.load_documents().await;
    }

    pub fn show_status(&mut self, text: &str, level: StatusLevel) {
        self.status = Some(StatusMessage {
            text: text.to_string(),
            level,
            expires: Instant::now() + STATUS_DISPLAY,
        });
    }

    /// Advance the placeholder animation and expire stale status messages.
    pub fn tick(&mut self) {
        if !self.pending.is_empty() {
            self.animation_frame = (self.animation_frame + 1) % 3;
        }
        if let Some(status) = &self.status {
            if status.expires <= Instant::now() {
                self.status = None;
            }
        }
    }

    /// True while the given transcript message is an in-flight placeholder.
    pub fn is_pending_placeholder(&self, id: MessageId) -> bool {
        self.pending.iter().any(|p| p.placeholder == id)
    }

    // ----- AI assistant -----

    /// Kick off a send of the assistant draft. Each call spawns its own
    /// request; concurrent sends settle independently.
    pub fn send_assistant_message(&mut self) {
        let context = self.editor.get_value();
        let Some(ticket) = self.assistant.begin_send(&context) else {
            return;
        };
        log::info!(
            "sending {} request ({} chars of context)",
            ticket.mode.label(),
            ticket.context.len()
        );

        let api = self.api.clone();
        let task = tokio::spawn(async move {
            match ticket.mode {
                Mode::Chat => api.chat(&ticket.message, &ticket.context).await,
                Mode::Edit => api.edit(&ticket.message, &ticket.context).await,
            }
        });
        self.pending.push(PendingRequest {
            placeholder: ticket.placeholder,
            task,
        });
        self.transcript_follow = true;
    }

    /// Settle every finished request. A task that panicked or was aborted
    /// still retires its placeholder, as a transport failure.
    pub async fn poll_pending(&mut self) {
        let mut i = 0;
        while i < self.pending.len() {
            if !self.pending[i].task.is_finished() {
                i += 1;
                continue;
            }
            let request = self.pending.remove(i);
            let outcome = match request.task.await {
                Ok(outcome) => outcome,
                Err(err) => {
                    log::error!("request task failed: {}", err);
                    AiOutcome::Failed(TransportError::Interrupted)
                }
            };
            self.assistant.settle(request.placeholder, outcome);
            self.transcript_follow = true;
            if self.proposal_state.selected().is_none()
                && self.assistant.unresolved_proposals().next().is_some()
            {
                self.proposal_state.select(Some(0));
            }
        }
    }

    pub fn toggle_assistant_mode(&mut self) {
        self.assistant.toggle_mode();
        let label = self.assistant.mode().label();
        self.show_status(&format!("Assistant switched to {} mode", label), StatusLevel::Info);
    }

    /// The "/" shortcut: clear the draft and move focus to the input.
    pub fn activate_assistant(&mut self) {
        self.assistant.activate();
        self.show_assistant = true;
        self.focus = Focus::Assistant;
        self.transcript_follow = true;
    }

    pub fn selected_proposal(&self) -> Option<crate::assistant::ProposalId> {
        let index = self.proposal_state.selected()?;
        self.assistant.unresolved_proposals().nth(index).map(|p| p.id)
    }

    pub fn proposal_nav_down(&mut self) {
        let len = self.assistant.unresolved_proposals().count();
        if len > 0 {
            let i = self.proposal_state.selected().unwrap_or(0);
            self.proposal_state.select(Some((i + 1).min(len - 1)));
        }
    }

    pub fn proposal_nav_up(&mut self) {
        let i = self.proposal_state.selected().unwrap_or(0);
        self.proposal_state.select(Some(i.saturating_sub(1)));
    }

    pub fn resolve_selected_proposal(&mut self, action: ProposalAction) {
        let Some(id) = self.selected_proposal() else {
            return;
        };
        let applied = self.assistant.resolve_proposal(
            id,
            action,
            &mut self.editor,
            &mut self.preview,
            &mut self.autosave,
        );
        if !applied {
            return;
        }

        match action {
            ProposalAction::Keep => {
                self.dirty = true;
                self.show_status("Applied the suggested document", StatusLevel::Success);
            }
            ProposalAction::Insert => {
                self.dirty = true;
                self.focus = Focus::Editor;
                self.show_status("Inserted the suggestion at the cursor", StatusLevel::Success);
            }
            ProposalAction::Discard => {
                self.show_status("Discarded the suggestion", StatusLevel::Info);
            }
        }

        let remaining = self.assistant.unresolved_proposals().count();
        if remaining == 0 {
            self.proposal_state.select(None);
            if self.focus == Focus::Proposals {
                self.focus = Focus::Assistant;
            }
        } else if let Some(i) = self.proposal_state.selected() {
            self.proposal_state.select(Some(i.min(remaining - 1)));
        }
    }

    // ----- Editing -----

    /// Every buffer mutation refreshes the preview and re-arms autosave.
    pub fn editor_changed(&mut self) {
        self.dirty = true;
        let content = self.editor.get_value();
        self.preview.refresh(&content);
        self.autosave.start();
    }

    pub async fn poll_autosave(&mut self) {
        if self.autosave.take_due(Instant::now()) {
            log::info!("autosave fired");
            self.save_current().await;
        }
    }

    // ----- Documents -----

    pub async fn load_documents(&mut self) {
        match self.store.list().await {
            Ok(documents) => {
                self.documents = documents;
                let len = self.documents.len();
                match self.doc_state.selected() {
                    Some(i) if len > 0 => self.doc_state.select(Some(i.min(len - 1))),
                    _ if len > 0 => self.doc_state.select(Some(0)),
                    _ => self.doc_state.select(None),
                }
            }
            Err(err) => {
                log::error!("listing documents failed: {}", err);
                self.show_status("Could not load documents", StatusLevel::Error);
            }
        }
    }

    pub async fn save_current(&mut self) {
        let title = if self.title.trim().is_empty() {
            "Untitled".to_string()
        } else {
            self.title.clone()
        };
        let content = self.editor.get_value();

        match self.store.save(&title, &content, self.current_doc).await {
            Ok(id) => {
                self.current_doc = Some(id);
                self.dirty = false;
                self.show_status("Document saved", StatusLevel::Success);
                self.load_documents().await;
            }
            Err(err) => {
                log::error!("saving document failed: {}", err);
                self.show_status("Saving failed", StatusLevel::Error);
            }
        }
    }

    pub async fn open_selected(&mut self) {
        let Some(id) = self
            .doc_state
            .selected()
            .and_then(|i| self.documents.get(i))
            .map(|d| d.id)
        else {
            return;
        };
        match self.store.get(id).await {
            Ok(document) => {
                self.title = document.title;
                self.editor = TextBuffer::new();
                self.editor.set_value(&document.content);
                self.editor.focus();
                self.preview.refresh(&document.content);
                self.current_doc = Some(document.id);
                self.dirty = false;
                self.autosave.cancel();
                self.editor_scroll = 0;
                self.focus = Focus::Editor;
                log::info!("opened document {}", id);
            }
            Err(err) => {
                log::error!("opening document {} failed: {}", id, err);
                self.show_status("Could not open document", StatusLevel::Error);
            }
        }
    }

    pub fn new_document(&mut self) {
        self.title = String::new();
        self.editor = TextBuffer::new();
        self.editor.focus();
        self.preview.refresh("");
        self.current_doc = None;
        self.dirty = false;
        self.autosave.cancel();
        self.editor_scroll = 0;
        self.focus = Focus::Editor;
        self.show_status("New document", StatusLevel::Info);
    }

    pub async fn delete_selected(&mut self) {
        let Some(id) = self
            .doc_state
            .selected()
            .and_then(|i| self.documents.get(i))
            .map(|d| d.id)
        else {
            return;
        };
        match self.store.delete(id).await {
            Ok(()) => {
                if self.current_doc == Some(id) {
                    self.new_document();
                }
                self.show_status("Document deleted", StatusLevel::Info);
                self.load_documents().await;
            }
            Err(err) => {
                log::error!("deleting document {} failed: {}", id, err);
                self.show_status("Could not delete document", StatusLevel::Error);
            }
        }
    }

    // ----- History -----

    pub async fn open_history(&mut self) {
        let Some(id) = self.current_doc else {
            self.show_status("Save the document before viewing history", StatusLevel::Warning);
            return;
        };
        match self.store.history(id).await {
            Ok(entries) if entries.is_empty() => {
                self.show_status("No history yet", StatusLevel::Info);
            }
            Ok(entries) => {
                let mut state = ListState::default();
                state.select(Some(0));
                self.history = Some(HistoryView { entries, state });
            }
            Err(err) => {
                log::error!("fetching history for {} failed: {}", id, err);
                self.show_status("Could not load history", StatusLevel::Error);
            }
        }
    }

    /// Restore the selected snapshot into the editor.
    pub fn restore_history_entry(&mut self) {
        let Some(view) = self.history.take() else {
            return;
        };
        let Some(entry) = view.state.selected().and_then(|i| view.entries.get(i)) else {
            self.history = Some(view);
            return;
        };
        self.editor.set_value(&entry.content);
        self.preview.refresh(&entry.content);
        self.autosave.start();
        self.dirty = true;
        self.focus = Focus::Editor;
        self.show_status("Restored historical version", StatusLevel::Success);
    }

    pub fn close_history(&mut self) {
        self.history = None;
    }

    // ----- Focus -----

    pub fn cycle_focus(&mut self) {
        let mut order = Vec::new();
        if self.show_sidebar {
            order.push(Focus::Documents);
        }
        order.push(Focus::Editor);
        if self.show_assistant {
            order.push(Focus::Assistant);
            if self.assistant.unresolved_proposals().next().is_some() {
                order.push(Focus::Proposals);
            }
        }
        let current = order.iter().position(|f| *f == self.focus).unwrap_or(0);
        self.focus = order[(current + 1) % order.len()];

        if self.focus == Focus::Proposals && self.proposal_state.selected().is_none() {
            self.proposal_state.select(Some(0));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assistant::PLACEHOLDER_TEXT;

    fn app() -> App {
        App::new(&Config::new())
    }

    #[tokio::test]
    async fn aborted_request_task_still_retires_its_placeholder() {
        let mut app = app();
        app.assistant.set_input("hello");
        let ticket = app.assistant.begin_send("").unwrap();
        let before = app.assistant.transcript().len();

        let task = tokio::spawn(async { std::future::pending::<AiOutcome>().await });
        task.abort();
        app.pending.push(PendingRequest {
            placeholder: ticket.placeholder,
            task,
        });

        // Abort propagation needs the runtime to run; poll until reaped.
        for _ in 0..100 {
            app.poll_pending().await;
            if app.pending.is_empty() {
                break;
            }
            tokio::task::yield_now().await;
        }
        assert!(app.pending.is_empty());

        // Placeholder retired, one diagnostic in its place.
        assert!(!app
            .assistant
            .transcript()
            .iter()
            .any(|m| m.text == PLACEHOLDER_TEXT));
        assert_eq!(app.assistant.transcript().len(), before);
        let last = app.assistant.transcript().last().unwrap();
        assert!(last.text.starts_with("Request failed"));
    }
}
