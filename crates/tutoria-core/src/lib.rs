pub mod api;
pub mod config;
pub mod error;
pub mod models;
pub mod session;

// Re-export main types for convenience
pub use api::ConversationClient;
pub use config::Config;
pub use error::ApiError;
pub use models::{
    ActiveCitation, ChatMessage, Citation, ConversationId, ConversationReply, ConversationRequest,
    Role, ToolMessageContent,
};
pub use session::{ChatSession, ChatView, TranscriptEntry, Turn, TurnId};
