use ratatui::layout::Rect;
use tokio::sync::mpsc;
use tracing::debug;
use tutoria_core::{ChatSession, ChatView, Citation, Config, ConversationClient, TranscriptEntry};

use crate::input::QuestionInput;
use crate::tui::{AppEvent, SettledTurn};

pub const INPUT_PLACEHOLDER: &str = "Escribe tu pregunta...";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FocusPane {
    Input,
    Transcript,
}

pub struct App {
    // Core state
    pub should_quit: bool,
    pub focus: FocusPane,

    // Conversation
    pub session: ChatSession,
    pub input: QuestionInput,
    pub client: ConversationClient,
    events: mpsc::UnboundedSender<AppEvent>,

    // Transcript state
    pub transcript_scroll: u16,
    pub transcript_height: u16,
    pub total_transcript_lines: u16,
    pub follow_bottom: bool,
    pub selected_citation: Option<usize>,

    // Citation panel state
    pub citation_scroll: u16,

    // Animation state
    pub animation_frame: u8, // 0-2 for ellipsis animation

    // Panel areas for mouse hit-testing (updated during render)
    pub transcript_area: Option<Rect>,
    pub citation_area: Option<Rect>,
    pub input_area: Option<Rect>,
    pub stop_area: Option<Rect>,
}

impl App {
    pub fn new(client: ConversationClient, config: &Config, events: mpsc::UnboundedSender<AppEvent>) -> Self {
        Self {
            should_quit: false,
            focus: FocusPane::Input,

            session: ChatSession::new(),
            input: QuestionInput::new(INPUT_PLACEHOLDER, config.clear_on_send),
            client,
            events,

            transcript_scroll: 0,
            transcript_height: 0,
            total_transcript_lines: 0,
            follow_bottom: true,
            selected_citation: None,

            citation_scroll: 0,

            animation_frame: 0,

            transcript_area: None,
            citation_area: None,
            input_area: None,
            stop_area: None,
        }
    }

    /// Start a turn and run the request in the background
    pub fn submit(&mut self, question: String) {
        let turn = self.session.begin_turn(&question);
        self.sync_input();
        self.follow_bottom = true;

        let client = self.client.clone();
        let events = self.events.clone();
        tokio::spawn(async move {
            let outcome = client.converse(&turn.request, &turn.cancel).await;
            let settled = SettledTurn {
                turn: turn.id,
                user_message: turn.user_message,
                outcome,
            };
            if events.send(AppEvent::Settled(settled)).is_err() {
                debug!(turn = turn.id, "ui closed before turn settled");
            }
        });
    }

    /// Send whatever is in the input box, if the input allows it
    pub fn send_input(&mut self) {
        if let Some(question) = self.input.send() {
            self.submit(question);
        }
    }

    pub fn settle(&mut self, settled: SettledTurn) {
        self.session
            .settle_turn(settled.turn, settled.user_message, settled.outcome);
        self.sync_input();
        self.follow_bottom = true;
    }

    pub fn stop_generating(&mut self) {
        self.session.stop_generating();
        self.sync_input();
    }

    pub fn clear_chat(&mut self) {
        self.session.clear_chat();
        self.selected_citation = None;
        self.transcript_scroll = 0;
        self.citation_scroll = 0;
        self.follow_bottom = true;
        self.focus = FocusPane::Input;
    }

    /// Input is disabled exactly while a request is outstanding
    pub fn sync_input(&mut self) {
        self.input.disabled = self.session.is_loading();
    }

    /// Whether the clear-chat action is shown as available
    pub fn can_clear(&self) -> bool {
        !self.session.is_loading() && !self.session.messages().is_empty()
    }

    /// Every citation reference in the transcript, in display order
    pub fn citation_refs(&self) -> Vec<Citation> {
        match self.session.view() {
            ChatView::Welcome => Vec::new(),
            ChatView::Transcript { entries, .. } => entries
                .into_iter()
                .flat_map(|entry| match entry {
                    TranscriptEntry::Answer { citations, .. } => citations,
                    TranscriptEntry::User { .. } | TranscriptEntry::Error { .. } => Vec::new(),
                })
                .collect(),
        }
    }

    pub fn select_next_citation(&mut self) {
        let len = self.citation_refs().len();
        if len == 0 {
            self.selected_citation = None;
            return;
        }
        let next = match self.selected_citation {
            Some(i) => (i + 1).min(len - 1),
            None => 0,
        };
        self.selected_citation = Some(next);
    }

    pub fn select_prev_citation(&mut self) {
        let len = self.citation_refs().len();
        if len == 0 {
            self.selected_citation = None;
            return;
        }
        let prev = match self.selected_citation {
            Some(i) => i.saturating_sub(1).min(len - 1),
            None => len - 1,
        };
        self.selected_citation = Some(prev);
    }

    pub fn open_selected_citation(&mut self) {
        let Some(idx) = self.selected_citation else {
            return;
        };
        if let Some(citation) = self.citation_refs().get(idx) {
            self.session.show_citation(citation);
            self.citation_scroll = 0;
        }
    }

    pub fn dismiss_citation(&mut self) {
        self.session.dismiss_citation();
    }

    pub fn toggle_focus(&mut self) {
        self.focus = match self.focus {
            FocusPane::Input => {
                if self.selected_citation.is_none() {
                    self.select_next_citation();
                }
                FocusPane::Transcript
            }
            FocusPane::Transcript => FocusPane::Input,
        };
    }

    // Scrolling
    pub fn scroll_up(&mut self, lines: u16) {
        self.follow_bottom = false;
        self.transcript_scroll = self.transcript_scroll.saturating_sub(lines);
    }

    pub fn scroll_down(&mut self, lines: u16) {
        let max = self.max_transcript_scroll();
        self.transcript_scroll = self.transcript_scroll.saturating_add(lines).min(max);
        self.follow_bottom = self.transcript_scroll >= max;
    }

    pub fn max_transcript_scroll(&self) -> u16 {
        self.total_transcript_lines
            .saturating_sub(self.transcript_height)
    }

    pub fn scroll_citation_down(&mut self, lines: u16) {
        self.citation_scroll = self.citation_scroll.saturating_add(lines);
    }

    pub fn scroll_citation_up(&mut self, lines: u16) {
        self.citation_scroll = self.citation_scroll.saturating_sub(lines);
    }

    pub fn tick_animation(&mut self) {
        if self.session.show_loading_message() {
            self.animation_frame = (self.animation_frame + 1) % 3;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tutoria_core::{ChatMessage, ConversationReply};

    fn app() -> (App, mpsc::UnboundedReceiver<AppEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let app = App::new(ConversationClient::new("http://127.0.0.1:9"), &Config::new(), tx);
        (app, rx)
    }

    fn reply(answer: &str) -> ConversationReply {
        ConversationReply { response: Some(answer.to_string()), error: None }
    }

    fn settle_answer(app: &mut App, question: &str, answer: &str) {
        let turn = app.session.begin_turn(question);
        app.settle(SettledTurn {
            turn: turn.id,
            user_message: turn.user_message,
            outcome: Ok(reply(answer)),
        });
    }

    #[tokio::test]
    async fn test_submit_disables_input_until_settled() {
        let (mut app, mut rx) = app();
        app.submit("hola".to_string());
        assert!(app.input.disabled);
        assert!(app.session.is_loading());

        // The unreachable backend settles the turn with a transport error
        let Some(AppEvent::Settled(settled)) = rx.recv().await else {
            panic!("expected a settled turn");
        };
        app.settle(settled);

        assert!(!app.input.disabled);
        assert_eq!(app.session.messages().len(), 2);
        assert_eq!(app.session.messages()[0], ChatMessage::user("hola"));
    }

    #[tokio::test]
    async fn test_stop_reenables_input() {
        let (mut app, _rx) = app();
        app.submit("hola".to_string());
        app.stop_generating();
        assert!(!app.input.disabled);
        assert!(!app.session.is_loading());
    }

    #[test]
    fn test_clear_availability() {
        let (mut app, _rx) = app();
        assert!(!app.can_clear());
        settle_answer(&mut app, "q", "a");
        assert!(app.can_clear());
        app.clear_chat();
        assert!(!app.can_clear());
        assert_eq!(app.focus, FocusPane::Input);
    }

    #[test]
    fn test_citation_selection_without_citations() {
        let (mut app, _rx) = app();
        settle_answer(&mut app, "q", "a");
        app.select_next_citation();
        assert_eq!(app.selected_citation, None);
        app.open_selected_citation();
        assert!(app.session.visible_citation().is_none());
    }

    #[test]
    fn test_open_and_dismiss_selected_citation() {
        let (mut app, _rx) = app();
        app.session = ChatSession::with_history(vec![
            ChatMessage::user("¿Qué es la memoria de trabajo?"),
            ChatMessage::tool(
                r#"{"citations":[{"id":"a","content":"Baddeley","title":"Tema 3"},{"id":"b","content":"Cowan","title":"Tema 4"}]}"#,
            ),
            ChatMessage::assistant("Un sistema de capacidad limitada [doc1][doc2]"),
        ]);

        assert_eq!(app.citation_refs().len(), 2);
        app.toggle_focus();
        assert_eq!(app.focus, FocusPane::Transcript);
        assert_eq!(app.selected_citation, Some(0));

        app.select_next_citation();
        app.select_next_citation();
        assert_eq!(app.selected_citation, Some(1));

        app.open_selected_citation();
        let active = app.session.visible_citation().unwrap();
        assert_eq!(active.id, "b");
        assert_eq!(active.title, "Tema 4");

        app.dismiss_citation();
        assert!(app.session.visible_citation().is_none());

        app.select_prev_citation();
        assert_eq!(app.selected_citation, Some(0));
    }

    #[test]
    fn test_scroll_bounds() {
        let (mut app, _rx) = app();
        app.total_transcript_lines = 30;
        app.transcript_height = 10;

        app.scroll_down(50);
        assert_eq!(app.transcript_scroll, 20);
        assert!(app.follow_bottom);

        app.scroll_up(5);
        assert_eq!(app.transcript_scroll, 15);
        assert!(!app.follow_bottom);
    }
}
