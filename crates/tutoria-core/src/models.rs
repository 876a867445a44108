//! UI-agnostic conversation types
//!
//! These are shared by every front end (the TUI, the one-shot CLI) and carry
//! no dependency on a UI framework.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// A single entry of the chat transcript
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self { role: Role::User, content: content.into() }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self { role: Role::Assistant, content: content.into() }
    }

    pub fn error(content: impl Into<String>) -> Self {
        Self { role: Role::Error, content: content.into() }
    }

    pub fn tool(content: impl Into<String>) -> Self {
        Self { role: Role::Tool, content: content.into() }
    }
}

/// Who produced a message. Decides how the message is rendered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
    Error,
    /// Content is a JSON [`ToolMessageContent`] envelope, not display text
    Tool,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
            Role::Error => "error",
            Role::Tool => "tool",
        }
    }
}

/// Opaque token grouping the turns of one conversation on the backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConversationId(Uuid);

impl ConversationId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ConversationId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ConversationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

/// Request handed to the API client. Only the last message travels on the wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversationRequest {
    pub id: ConversationId,
    pub messages: Vec<ChatMessage>,
}

impl ConversationRequest {
    /// Content of the most recent message, if any
    pub fn prompt(&self) -> Option<&str> {
        self.messages.last().map(|m| m.content.as_str())
    }
}

/// Success body of `POST /conversation`
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ConversationReply {
    #[serde(default)]
    pub response: Option<String>,
    #[serde(default)]
    pub error: Option<serde_json::Value>,
}

impl ConversationReply {
    /// The application-level error carried by a 2xx reply, when it is non-empty
    pub fn error_text(&self) -> Option<String> {
        match self.error.as_ref()? {
            serde_json::Value::Null | serde_json::Value::Bool(false) => None,
            serde_json::Value::Number(n) if n.as_f64() == Some(0.0) => None,
            serde_json::Value::String(s) if s.is_empty() => None,
            serde_json::Value::String(s) => Some(s.clone()),
            other => Some(other.to_string()),
        }
    }
}

/// A source document backing an assistant reply
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Citation {
    pub id: String,
    pub content: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub filepath: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub metadata: Option<String>,
}

impl Citation {
    /// Title for list entries, falling back to the file path and then the id
    pub fn display_title(&self) -> &str {
        self.title
            .as_deref()
            .filter(|t| !t.is_empty())
            .or_else(|| self.filepath.as_deref().filter(|p| !p.is_empty()))
            .unwrap_or(&self.id)
    }
}

/// JSON envelope stored in a tool message
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ToolMessageContent {
    #[serde(default)]
    pub citations: Vec<Citation>,
}

impl ToolMessageContent {
    pub fn parse(content: &str) -> Option<Self> {
        serde_json::from_str(content).ok()
    }
}

/// The citation currently shown in the side panel
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ActiveCitation {
    pub content: String,
    pub id: String,
    pub title: String,
    pub filepath: String,
    pub url: String,
    pub metadata: String,
}

impl From<&Citation> for ActiveCitation {
    fn from(citation: &Citation) -> Self {
        Self {
            content: citation.content.clone(),
            id: citation.id.clone(),
            title: citation.title.clone().unwrap_or_default(),
            filepath: citation.filepath.clone().unwrap_or_default(),
            url: String::new(),
            metadata: String::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_serializes_lowercase() {
        let msg = ChatMessage::assistant("hi");
        let json = serde_json::to_string(&msg).unwrap();
        assert_eq!(json, r#"{"role":"assistant","content":"hi"}"#);

        let parsed: ChatMessage = serde_json::from_str(r#"{"role":"tool","content":"{}"}"#).unwrap();
        assert_eq!(parsed.role, Role::Tool);
    }

    #[test]
    fn test_conversation_ids_are_unique() {
        assert_ne!(ConversationId::new(), ConversationId::new());
    }

    #[test]
    fn test_conversation_id_serializes_as_plain_string() {
        let id = ConversationId::new();
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, format!("\"{}\"", id));
    }

    #[test]
    fn test_prompt_is_last_message() {
        let request = ConversationRequest {
            id: ConversationId::new(),
            messages: vec![ChatMessage::user("first"), ChatMessage::assistant("a"), ChatMessage::user("second")],
        };
        assert_eq!(request.prompt(), Some("second"));

        let empty = ConversationRequest { id: ConversationId::new(), messages: Vec::new() };
        assert_eq!(empty.prompt(), None);
    }

    #[test]
    fn test_reply_error_text() {
        let reply: ConversationReply = serde_json::from_str(r#"{"response":"4"}"#).unwrap();
        assert_eq!(reply.error_text(), None);
        assert_eq!(reply.response.as_deref(), Some("4"));

        let reply: ConversationReply = serde_json::from_str(r#"{"error":""}"#).unwrap();
        assert_eq!(reply.error_text(), None);

        let reply: ConversationReply = serde_json::from_str(r#"{"error":"quota exceeded"}"#).unwrap();
        assert_eq!(reply.error_text().as_deref(), Some("quota exceeded"));

        let reply: ConversationReply = serde_json::from_str(r#"{"response":"ok","error":0}"#).unwrap();
        assert_eq!(reply.error_text(), None);
        let reply: ConversationReply = serde_json::from_str(r#"{"response":"ok","error":0.0}"#).unwrap();
        assert_eq!(reply.error_text(), None);

        let reply: ConversationReply = serde_json::from_str(r#"{"error":500}"#).unwrap();
        assert_eq!(reply.error_text().as_deref(), Some("500"));

        let reply: ConversationReply = serde_json::from_str(r#"{"error":{"code":429}}"#).unwrap();
        assert_eq!(reply.error_text().as_deref(), Some(r#"{"code":429}"#));
    }

    #[test]
    fn test_tool_content_ignores_unknown_fields() {
        let content = r#"{"citations":[{"id":"1","content":"text","title":"Doc","extra":true}],"intent":"[]"}"#;
        let parsed = ToolMessageContent::parse(content).unwrap();
        assert_eq!(parsed.citations.len(), 1);
        assert_eq!(parsed.citations[0].title.as_deref(), Some("Doc"));
        assert!(ToolMessageContent::parse("not json").is_none());
    }

    #[test]
    fn test_active_citation_from_citation() {
        let citation = Citation {
            id: "c1".to_string(),
            content: "body".to_string(),
            title: None,
            filepath: Some("notes/tema1.pdf".to_string()),
            url: Some("https://example.com".to_string()),
            metadata: None,
        };
        let active = ActiveCitation::from(&citation);
        assert_eq!(active.title, "");
        assert_eq!(active.filepath, "notes/tema1.pdf");
        assert_eq!(active.url, "");
        assert_eq!(citation.display_title(), "notes/tema1.pdf");
    }
}
