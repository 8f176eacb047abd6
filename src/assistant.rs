//! The AI assistant session: mode state, message transcript, and the
//! propose/apply protocol for edit-mode responses.
//!
//! Sending a message is split across the network suspension point. The
//! synchronous half ([`AssistantSession::begin_send`]) appends the user
//! message and a transient placeholder and hands back a ticket; the app
//! issues exactly one request per ticket and feeds the settled
//! [`AiOutcome`] to [`AssistantSession::settle`], which retires the
//! placeholder and turns the outcome into either a transcript entry (chat)
//! or an actionable [`EditProposal`] (edit). Failures of any kind become
//! transcript messages; nothing on this path propagates an error.

use crate::api::AiOutcome;
use crate::autosave::AutosaveScheduler;
use crate::editor::{char_to_byte, EditorSurface};
use crate::preview::PreviewRenderer;

/// Shown while a request is in flight; retired on settlement.
pub const PLACEHOLDER_TEXT: &str = "Thinking";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Chat,
    Edit,
}

impl Mode {
    pub fn label(&self) -> &'static str {
        match self {
            Mode::Chat => "chat",
            Mode::Edit => "edit",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    User,
    Assistant,
    System,
}

/// Opaque transcript handle from a per-session monotonic counter, so rapid
/// successive sends can never collide.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MessageId(u64);

#[derive(Debug, Clone)]
pub struct Message {
    pub id: MessageId,
    pub role: Role,
    pub text: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ProposalId(u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    Unresolved,
    Kept,
    Inserted,
    Discarded,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProposalAction {
    Keep,
    Insert,
    Discard,
}

/// A surfaced, user-reviewable candidate document replacement from an
/// edit-mode response. Never part of the transcript; inert once resolved.
#[derive(Debug, Clone)]
pub struct EditProposal {
    pub id: ProposalId,
    pub text: String,
    pub resolution: Resolution,
}

impl EditProposal {
    pub fn is_resolved(&self) -> bool {
        self.resolution != Resolution::Unresolved
    }
}

/// Everything the app needs to issue the request for one send: which
/// endpoint (via mode), the message, the editor context, and the
/// placeholder to retire on settlement.
#[derive(Debug)]
pub struct SendTicket {
    pub placeholder: MessageId,
    pub mode: Mode,
    pub message: String,
    pub context: String,
}

pub struct AssistantSession {
    mode: Mode,
    transcript: Vec<Message>,
    proposals: Vec<EditProposal>,
    input: String,
    input_cursor: usize,
    next_message_id: u64,
    next_proposal_id: u64,
}

impl Default for AssistantSession {
    fn default() -> Self {
        Self::new()
    }
}

impl AssistantSession {
    pub fn new() -> Self {
        let mut session = Self {
            mode: Mode::Chat,
            transcript: Vec::new(),
            proposals: Vec::new(),
            input: String::new(),
            input_cursor: 0,
            next_message_id: 0,
            next_proposal_id: 0,
        };
        session.announce_mode();
        session
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn transcript(&self) -> &[Message] {
        &self.transcript
    }

    pub fn proposals(&self) -> &[EditProposal] {
        &self.proposals
    }

    pub fn unresolved_proposals(&self) -> impl Iterator<Item = &EditProposal> {
        self.proposals.iter().filter(|p| !p.is_resolved())
    }

    /// Flip between chat and edit. Clears the unsent draft and announces the
    /// new mode in the transcript. No network call.
    pub fn toggle_mode(&mut self) {
        self.mode = match self.mode {
            Mode::Chat => Mode::Edit,
            Mode::Edit => Mode::Chat,
        };
        self.input.clear();
        self.input_cursor = 0;
        self.announce_mode();
    }

    /// Clear the draft so a fresh question can be typed. The caller moves
    /// focus to the input affordance.
    pub fn activate(&mut self) {
        self.input.clear();
        self.input_cursor = 0;
    }

    /// Start a send of the current draft. A draft that is empty after
    /// trimming is a silent no-op. Otherwise the user message and a
    /// transient placeholder are appended, the draft is cleared, and the
    /// returned ticket drives exactly one request.
    pub fn begin_send(&mut self, context: &str) -> Option<SendTicket> {
        let message = self.input.trim().to_string();
        if message.is_empty() {
            return None;
        }
        self.input.clear();
        self.input_cursor = 0;

        self.append(Role::User, &message);
        let placeholder = self.append(Role::Assistant, PLACEHOLDER_TEXT);

        Some(SendTicket {
            placeholder,
            mode: self.mode,
            message,
            context: context.to_string(),
        })
    }

    /// Reconcile a settled request. The placeholder is removed exactly once
    /// per ticket, on every path. A successful reply is handled according to
    /// the session's current mode: chat appends it to the transcript, edit
    /// surfaces a proposal instead.
    pub fn settle(&mut self, placeholder: MessageId, outcome: AiOutcome) {
        self.remove(placeholder);
        match outcome {
            AiOutcome::Reply(text) => match self.mode {
                Mode::Chat => {
                    self.append(Role::Assistant, &text);
                }
                Mode::Edit => {
                    let id = ProposalId(self.next_proposal_id);
                    self.next_proposal_id += 1;
                    self.proposals.push(EditProposal {
                        id,
                        text,
                        resolution: Resolution::Unresolved,
                    });
                }
            },
            AiOutcome::Refused(error) => {
                self.append(Role::Assistant, &format!("Error: {}", error));
            }
            AiOutcome::Failed(error) => {
                log::warn!("AI request failed: {}", error);
                self.append(Role::Assistant, &format!("Request failed: {}", error));
            }
        }
    }

    /// Apply a user decision to a proposal. Returns false when the proposal
    /// is unknown or already resolved; a second action never double-applies.
    pub fn resolve_proposal(
        &mut self,
        id: ProposalId,
        action: ProposalAction,
        editor: &mut dyn EditorSurface,
        preview: &mut dyn PreviewRenderer,
        autosave: &mut dyn AutosaveScheduler,
    ) -> bool {
        let Some(proposal) = self.proposals.iter_mut().find(|p| p.id == id) else {
            return false;
        };
        if proposal.is_resolved() {
            return false;
        }

        match action {
            ProposalAction::Keep => {
                editor.set_value(&proposal.text);
                proposal.resolution = Resolution::Kept;
                preview.refresh(&editor.get_value());
                autosave.start();
            }
            ProposalAction::Insert => {
                editor.focus();
                editor.replace_selection(&proposal.text);
                proposal.resolution = Resolution::Inserted;
                preview.refresh(&editor.get_value());
                autosave.start();
            }
            ProposalAction::Discard => {
                proposal.resolution = Resolution::Discarded;
            }
        }
        true
    }

    fn append(&mut self, role: Role, text: &str) -> MessageId {
        let id = MessageId(self.next_message_id);
        self.next_message_id += 1;
        self.transcript.push(Message {
            id,
            role,
            text: text.to_string(),
        });
        id
    }

    fn remove(&mut self, id: MessageId) -> bool {
        let before = self.transcript.len();
        self.transcript.retain(|m| m.id != id);
        self.transcript.len() != before
    }

    fn announce_mode(&mut self) {
        let text = format!("Now in {} mode", self.mode.label());
        self.append(Role::System, &text);
    }

    // Draft editing, cursor in characters.

    pub fn input(&self) -> &str {
        &self.input
    }

    pub fn input_cursor(&self) -> usize {
        self.input_cursor
    }

    pub fn set_input(&mut self, text: &str) {
        self.input = text.to_string();
        self.input_cursor = self.input.chars().count();
    }

    pub fn input_insert(&mut self, c: char) {
        let byte_pos = char_to_byte(&self.input, self.input_cursor);
        self.input.insert(byte_pos, c);
        self.input_cursor += 1;
    }

    pub fn input_backspace(&mut self) {
        if self.input_cursor > 0 {
            self.input_cursor -= 1;
            let byte_pos = char_to_byte(&self.input, self.input_cursor);
            self.input.remove(byte_pos);
        }
    }

    pub fn input_delete(&mut self) {
        if self.input_cursor < self.input.chars().count() {
            let byte_pos = char_to_byte(&self.input, self.input_cursor);
            self.input.remove(byte_pos);
        }
    }

    pub fn input_left(&mut self) {
        self.input_cursor = self.input_cursor.saturating_sub(1);
    }

    pub fn input_right(&mut self) {
        self.input_cursor = (self.input_cursor + 1).min(self.input.chars().count());
    }

    pub fn input_home(&mut self) {
        self.input_cursor = 0;
    }

    pub fn input_end(&mut self) {
        self.input_cursor = self.input.chars().count();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::TransportError;
    use crate::editor::TextBuffer;

    struct FakePreview {
        refreshes: usize,
        last: String,
    }

    impl FakePreview {
        fn new() -> Self {
            Self {
                refreshes: 0,
                last: String::new(),
            }
        }
    }

    impl PreviewRenderer for FakePreview {
        fn refresh(&mut self, markdown: &str) {
            self.refreshes += 1;
            self.last = markdown.to_string();
        }
    }

    struct FakeAutosave {
        starts: usize,
    }

    impl FakeAutosave {
        fn new() -> Self {
            Self { starts: 0 }
        }
    }

    impl AutosaveScheduler for FakeAutosave {
        fn start(&mut self) {
            self.starts += 1;
        }
    }

    fn send(session: &mut AssistantSession, text: &str, context: &str) -> SendTicket {
        session.set_input(text);
        session.begin_send(context).expect("send should start")
    }

    fn roles(session: &AssistantSession) -> Vec<Role> {
        session.transcript().iter().map(|m| m.role).collect()
    }

    #[test]
    fn new_session_announces_chat_mode() {
        let session = AssistantSession::new();
        assert_eq!(session.mode(), Mode::Chat);
        assert_eq!(roles(&session), vec![Role::System]);
    }

    #[test]
    fn blank_input_is_a_silent_no_op() {
        let mut session = AssistantSession::new();
        let before = session.transcript().len();
        session.set_input("   \n\t ");
        assert!(session.begin_send("context").is_none());
        assert_eq!(session.transcript().len(), before);
    }

    #[test]
    fn chat_success_nets_one_user_and_one_assistant_message() {
        let mut session = AssistantSession::new();
        let before = session.transcript().len();

        let ticket = send(&mut session, "hello", "doc body");
        assert_eq!(ticket.mode, Mode::Chat);
        assert_eq!(ticket.message, "hello");
        assert_eq!(ticket.context, "doc body");
        // User message plus placeholder while in flight.
        assert_eq!(session.transcript().len(), before + 2);

        session.settle(ticket.placeholder, AiOutcome::Reply("hi there".to_string()));
        assert_eq!(session.transcript().len(), before + 2);

        let tail: Vec<_> = session.transcript()[before..]
            .iter()
            .map(|m| (m.role, m.text.as_str()))
            .collect();
        assert_eq!(
            tail,
            vec![(Role::User, "hello"), (Role::Assistant, "hi there")]
        );
        assert!(!session
            .transcript()
            .iter()
            .any(|m| m.text == PLACEHOLDER_TEXT));
    }

    #[test]
    fn edit_success_surfaces_a_proposal_without_touching_the_transcript() {
        let mut session = AssistantSession::new();
        session.toggle_mode();
        let before = session.transcript().len();

        let ticket = send(&mut session, "make it formal", "hey");
        assert_eq!(ticket.mode, Mode::Edit);
        session.settle(ticket.placeholder, AiOutcome::Reply("Dear Sir,".to_string()));

        // Net transcript growth is the user message only.
        assert_eq!(session.transcript().len(), before + 1);
        assert_eq!(session.transcript().last().unwrap().role, Role::User);

        let proposals: Vec<_> = session.unresolved_proposals().collect();
        assert_eq!(proposals.len(), 1);
        assert_eq!(proposals[0].text, "Dear Sir,");
        assert_eq!(proposals[0].resolution, Resolution::Unresolved);
    }

    #[test]
    fn application_error_is_surfaced_verbatim() {
        let mut session = AssistantSession::new();
        let ticket = send(&mut session, "hello", "");
        session.settle(
            ticket.placeholder,
            AiOutcome::Refused("quota exceeded".to_string()),
        );

        let last = session.transcript().last().unwrap();
        assert_eq!(last.role, Role::Assistant);
        assert!(last.text.contains("quota exceeded"));
        assert_eq!(session.proposals().len(), 0);
    }

    #[test]
    fn transport_failure_becomes_a_transcript_message() {
        let mut session = AssistantSession::new();
        let before = session.transcript().len();
        let ticket = send(&mut session, "hello", "");
        session.settle(
            ticket.placeholder,
            AiOutcome::Failed(TransportError::NotJson),
        );

        // Placeholder retired, one diagnostic appended: net +2 over baseline.
        assert_eq!(session.transcript().len(), before + 2);
        let last = session.transcript().last().unwrap();
        assert_eq!(last.role, Role::Assistant);
        assert!(last.text.starts_with("Request failed"));
        assert!(!session
            .transcript()
            .iter()
            .any(|m| m.text == PLACEHOLDER_TEXT));
    }

    #[test]
    fn double_toggle_restores_mode_and_adds_two_system_messages() {
        let mut session = AssistantSession::new();
        let before = roles(&session)
            .iter()
            .filter(|r| **r == Role::System)
            .count();

        session.set_input("draft in progress");
        session.toggle_mode();
        assert_eq!(session.mode(), Mode::Edit);
        assert_eq!(session.input(), "");
        session.toggle_mode();
        assert_eq!(session.mode(), Mode::Chat);

        let after = roles(&session)
            .iter()
            .filter(|r| **r == Role::System)
            .count();
        assert_eq!(after, before + 2);
    }

    #[test]
    fn reply_settling_after_a_mode_switch_follows_the_new_mode() {
        let mut session = AssistantSession::new();
        let ticket = send(&mut session, "rewrite this", "doc");
        assert_eq!(ticket.mode, Mode::Chat);

        // Switch to edit while the request is outstanding; the late reply
        // surfaces as a proposal, not a transcript entry.
        session.toggle_mode();
        session.settle(ticket.placeholder, AiOutcome::Reply("Dear Sir,".to_string()));
        assert_eq!(session.unresolved_proposals().count(), 1);
        assert!(!session
            .transcript()
            .iter()
            .any(|m| m.role == Role::Assistant));

        // Mirror case: sent in edit mode, settled in chat mode.
        let ticket = send(&mut session, "again", "doc");
        assert_eq!(ticket.mode, Mode::Edit);
        session.toggle_mode();
        session.settle(ticket.placeholder, AiOutcome::Reply("plain answer".to_string()));
        assert_eq!(session.unresolved_proposals().count(), 1);
        assert_eq!(session.transcript().last().unwrap().text, "plain answer");
    }

    #[test]
    fn concurrent_sends_settle_independently() {
        let mut session = AssistantSession::new();
        let first = send(&mut session, "first", "");
        let second = send(&mut session, "second", "");
        assert_ne!(first.placeholder, second.placeholder);

        // Settle out of order; each retires only its own placeholder.
        session.settle(second.placeholder, AiOutcome::Reply("two".to_string()));
        let placeholders = session
            .transcript()
            .iter()
            .filter(|m| m.text == PLACEHOLDER_TEXT)
            .count();
        assert_eq!(placeholders, 1);

        session.settle(first.placeholder, AiOutcome::Reply("one".to_string()));
        let placeholders = session
            .transcript()
            .iter()
            .filter(|m| m.text == PLACEHOLDER_TEXT)
            .count();
        assert_eq!(placeholders, 0);
    }

    #[test]
    fn keep_replaces_the_entire_document() {
        let mut session = AssistantSession::new();
        session.toggle_mode();
        let ticket = send(&mut session, "rewrite", "old text");
        session.settle(ticket.placeholder, AiOutcome::Reply("new text".to_string()));
        let id = session.unresolved_proposals().next().unwrap().id;

        let mut editor = TextBuffer::new();
        editor.set_value("old text");
        let mut preview = FakePreview::new();
        let mut autosave = FakeAutosave::new();

        assert!(session.resolve_proposal(
            id,
            ProposalAction::Keep,
            &mut editor,
            &mut preview,
            &mut autosave
        ));
        assert_eq!(editor.get_value(), "new text");
        assert_eq!(preview.refreshes, 1);
        assert_eq!(preview.last, "new text");
        assert_eq!(autosave.starts, 1);
        assert_eq!(session.unresolved_proposals().count(), 0);
    }

    #[test]
    fn insert_splices_at_the_prior_selection_only() {
        let mut session = AssistantSession::new();
        session.toggle_mode();
        let ticket = send(&mut session, "expand", "");
        session.settle(ticket.placeholder, AiOutcome::Reply("INSERTED".to_string()));
        let id = session.unresolved_proposals().next().unwrap().id;

        let mut editor = TextBuffer::new();
        editor.set_value("before MIDDLE after");
        // Select "MIDDLE" (chars 7..13).
        for _ in 0..7 {
            editor.move_right(false);
        }
        for _ in 0..6 {
            editor.move_right(true);
        }

        let mut preview = FakePreview::new();
        let mut autosave = FakeAutosave::new();
        assert!(session.resolve_proposal(
            id,
            ProposalAction::Insert,
            &mut editor,
            &mut preview,
            &mut autosave
        ));
        assert_eq!(editor.get_value(), "before INSERTED after");
        assert!(editor.is_focused());
        assert_eq!(autosave.starts, 1);
    }

    #[test]
    fn discard_leaves_the_editor_alone() {
        let mut session = AssistantSession::new();
        session.toggle_mode();
        let ticket = send(&mut session, "rewrite", "");
        session.settle(ticket.placeholder, AiOutcome::Reply("unused".to_string()));
        let id = session.unresolved_proposals().next().unwrap().id;

        let mut editor = TextBuffer::new();
        editor.set_value("untouched");
        let mut preview = FakePreview::new();
        let mut autosave = FakeAutosave::new();

        assert!(session.resolve_proposal(
            id,
            ProposalAction::Discard,
            &mut editor,
            &mut preview,
            &mut autosave
        ));
        assert_eq!(editor.get_value(), "untouched");
        assert_eq!(preview.refreshes, 0);
        assert_eq!(autosave.starts, 0);
    }

    #[test]
    fn second_resolution_is_a_no_op() {
        let mut session = AssistantSession::new();
        session.toggle_mode();
        let ticket = send(&mut session, "rewrite", "");
        session.settle(ticket.placeholder, AiOutcome::Reply("kept".to_string()));
        let id = session.unresolved_proposals().next().unwrap().id;

        let mut editor = TextBuffer::new();
        let mut preview = FakePreview::new();
        let mut autosave = FakeAutosave::new();

        assert!(session.resolve_proposal(
            id,
            ProposalAction::Keep,
            &mut editor,
            &mut preview,
            &mut autosave
        ));
        editor.set_value("edited since");

        // Any further action, same or different, must not re-apply.
        assert!(!session.resolve_proposal(
            id,
            ProposalAction::Insert,
            &mut editor,
            &mut preview,
            &mut autosave
        ));
        assert_eq!(editor.get_value(), "edited since");
        assert_eq!(preview.refreshes, 1);
        assert_eq!(autosave.starts, 1);
    }

    #[test]
    fn two_unresolved_proposals_coexist() {
        let mut session = AssistantSession::new();
        session.toggle_mode();
        let first = send(&mut session, "one", "");
        session.settle(first.placeholder, AiOutcome::Reply("alpha".to_string()));
        let second = send(&mut session, "two", "");
        session.settle(second.placeholder, AiOutcome::Reply("beta".to_string()));

        let texts: Vec<_> = session.unresolved_proposals().map(|p| p.text.clone()).collect();
        assert_eq!(texts, vec!["alpha", "beta"]);
    }

    #[test]
    fn activate_clears_the_draft() {
        let mut session = AssistantSession::new();
        session.set_input("half-typed");
        session.activate();
        assert_eq!(session.input(), "");
        assert_eq!(session.input_cursor(), 0);
    }

    #[test]
    fn draft_editing_is_utf8_safe() {
        let mut session = AssistantSession::new();
        session.input_insert('ü');
        session.input_insert('b');
        session.input_left();
        session.input_backspace();
        assert_eq!(session.input(), "b");
        session.input_end();
        assert_eq!(session.input_cursor(), 1);
    }
}
