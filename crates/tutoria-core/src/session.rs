//! Chat page orchestration
//!
//! [`ChatSession`] owns the transcript and the request lifecycle of one
//! conversation. It is driven in two steps so a UI can keep running while a
//! request is outstanding: [`ChatSession::begin_turn`] hands back a [`Turn`]
//! to send, and [`ChatSession::settle_turn`] records whatever came back.

use std::collections::HashMap;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::api::ConversationClient;
use crate::error::ApiError;
use crate::models::{
    ActiveCitation, ChatMessage, Citation, ConversationId, ConversationReply, ConversationRequest,
    Role, ToolMessageContent,
};

/// Shown in place of any transport, status or decode failure
pub const FALLBACK_ERROR: &str = "An error occurred while fetching the response.";

/// Prefix put in front of error messages when they are rendered
pub const ERROR_PREFIX: &str = "Sorry, an error occurred. Try refreshing the conversation or waiting a few minutes. If the issue persists, contact your system administrator. Error: ";

pub const GENERATING_PLACEHOLDER: &str = "Generating answer...";

pub type TurnId = u64;

/// A submitted question waiting for the backend
#[derive(Debug, Clone)]
pub struct Turn {
    pub id: TurnId,
    pub user_message: ChatMessage,
    pub request: ConversationRequest,
    pub cancel: CancellationToken,
}

/// What the transcript pane should show
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatView {
    /// No question asked yet in this session
    Welcome,
    Transcript {
        entries: Vec<TranscriptEntry>,
        /// Question echoed while its answer is still being generated
        pending_question: Option<String>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TranscriptEntry {
    User {
        index: usize,
        text: String,
    },
    Answer {
        index: usize,
        text: String,
        citations: Vec<Citation>,
    },
    Error {
        index: usize,
        text: String,
    },
}

#[derive(Debug, Default)]
pub struct ChatSession {
    messages: Vec<ChatMessage>,
    last_question: String,
    is_loading: bool,
    show_loading_message: bool,
    active_citation: Option<ActiveCitation>,
    citation_panel_open: bool,
    conversation_id: ConversationId,
    pending: HashMap<TurnId, CancellationToken>,
    next_turn: TurnId,
}

impl ChatSession {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resume a transcript recorded elsewhere, e.g. one that includes tool messages
    pub fn with_history(messages: Vec<ChatMessage>) -> Self {
        let last_question = messages
            .iter()
            .rev()
            .find(|m| m.role == Role::User)
            .map(|m| m.content.clone())
            .unwrap_or_default();
        Self {
            messages,
            last_question,
            ..Self::default()
        }
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    pub fn last_question(&self) -> &str {
        &self.last_question
    }

    pub fn is_loading(&self) -> bool {
        self.is_loading
    }

    pub fn show_loading_message(&self) -> bool {
        self.show_loading_message
    }

    pub fn conversation_id(&self) -> ConversationId {
        self.conversation_id
    }

    pub fn active_citation(&self) -> Option<&ActiveCitation> {
        self.active_citation.as_ref()
    }

    pub fn is_citation_panel_open(&self) -> bool {
        self.citation_panel_open
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    /// Start a turn for `question`.
    ///
    /// The user message goes into the request only; the transcript gains it
    /// together with the reply in [`ChatSession::settle_turn`].
    pub fn begin_turn(&mut self, question: &str) -> Turn {
        self.last_question = question.to_string();
        self.is_loading = true;
        self.show_loading_message = true;

        let id = self.next_turn;
        self.next_turn += 1;

        let cancel = CancellationToken::new();
        self.pending.insert(id, cancel.clone());

        let user_message = ChatMessage::user(question);
        let mut messages = self.messages.clone();
        messages.push(user_message.clone());

        debug!(turn = id, conversation_id = %self.conversation_id, "turn started");

        Turn {
            id,
            user_message,
            request: ConversationRequest {
                id: self.conversation_id,
                messages,
            },
            cancel,
        }
    }

    /// Record the outcome of a turn started with [`ChatSession::begin_turn`]
    pub fn settle_turn(
        &mut self,
        turn: TurnId,
        user_message: ChatMessage,
        outcome: Result<ConversationReply, ApiError>,
    ) {
        let reply = match outcome {
            Ok(reply) => match reply.error_text() {
                Some(error) => ChatMessage::error(error),
                None => ChatMessage::assistant(reply.response.unwrap_or_default()),
            },
            Err(err) if err.is_aborted() => {
                debug!(turn, "turn aborted");
                ChatMessage::error(FALLBACK_ERROR)
            }
            Err(err) => {
                warn!(turn, error = %err, "conversation request failed");
                ChatMessage::error(FALLBACK_ERROR)
            }
        };

        debug!(turn, role = reply.role.as_str(), "turn settled");
        self.messages.push(user_message);
        self.messages.push(reply);

        self.pending.remove(&turn);
        if self.pending.is_empty() {
            self.is_loading = false;
            self.show_loading_message = false;
        }
    }

    /// Run one full turn against `client`
    pub async fn ask(&mut self, client: &ConversationClient, question: &str) {
        let turn = self.begin_turn(question);
        let outcome = client.converse(&turn.request, &turn.cancel).await;
        self.settle_turn(turn.id, turn.user_message, outcome);
    }

    /// Abort every outstanding request. Already appended messages stay.
    pub fn stop_generating(&mut self) {
        let aborted = self.pending.len();
        for (_, cancel) in self.pending.drain() {
            cancel.cancel();
        }
        self.show_loading_message = false;
        self.is_loading = false;
        info!(aborted, "stopped generating");
    }

    /// Forget the transcript and start an unrelated conversation
    pub fn clear_chat(&mut self) {
        self.last_question.clear();
        self.active_citation = None;
        self.citation_panel_open = false;
        self.messages.clear();
        self.conversation_id = ConversationId::new();
        info!(conversation_id = %self.conversation_id, "chat cleared");
    }

    pub fn show_citation(&mut self, citation: &Citation) {
        self.active_citation = Some(ActiveCitation::from(citation));
        self.citation_panel_open = true;
    }

    pub fn dismiss_citation(&mut self) {
        self.citation_panel_open = false;
    }

    /// The panel is visible only with a non-empty transcript and an active citation
    pub fn visible_citation(&self) -> Option<&ActiveCitation> {
        if self.messages.is_empty() || !self.citation_panel_open {
            return None;
        }
        self.active_citation.as_ref()
    }

    /// Citations for the assistant message at `index`, taken from the tool
    /// message right before it
    pub fn citations_for(&self, index: usize) -> Vec<Citation> {
        index
            .checked_sub(1)
            .and_then(|prev| self.messages.get(prev))
            .map(parse_citations)
            .unwrap_or_default()
    }

    pub fn view(&self) -> ChatView {
        if self.last_question.is_empty() {
            return ChatView::Welcome;
        }

        let mut entries = Vec::with_capacity(self.messages.len());
        for (index, message) in self.messages.iter().enumerate() {
            match message.role {
                Role::User => entries.push(TranscriptEntry::User {
                    index,
                    text: message.content.clone(),
                }),
                Role::Assistant => entries.push(TranscriptEntry::Answer {
                    index,
                    text: message.content.clone(),
                    citations: self.citations_for(index),
                }),
                Role::Error => entries.push(TranscriptEntry::Error {
                    index,
                    text: format!("{}{}", ERROR_PREFIX, message.content),
                }),
                Role::Tool => {}
            }
        }

        ChatView::Transcript {
            entries,
            pending_question: self
                .show_loading_message
                .then(|| self.last_question.clone()),
        }
    }

    #[cfg(test)]
    pub(crate) fn push_message(&mut self, message: ChatMessage) {
        self.messages.push(message);
    }
}

/// Citations carried by `message` when it is a well-formed tool message
pub fn parse_citations(message: &ChatMessage) -> Vec<Citation> {
    match message.role {
        Role::Tool => ToolMessageContent::parse(&message.content)
            .map(|content| content.citations)
            .unwrap_or_default(),
        Role::User | Role::Assistant | Role::Error => Vec::new(),
    }
}
