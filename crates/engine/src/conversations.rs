//! Messaging collaborator contract.
//!
//! The engine does not own message transport. It calls into this trait to
//! resolve the conversation backing a new handoff and to capture preview
//! text from the last user message.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Failure inside the messaging collaborator.
#[derive(Debug, Error)]
#[error("messaging collaborator error: {0}")]
pub struct ConversationError(pub String);

/// Read-only view of a conversation's latest message, used for previews.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationSnapshot {
    /// Conversation the message belongs to.
    pub conversation_id: String,
    /// Kind of the last event (e.g. `text`, `image`).
    pub event_type: String,
    /// Raw text of the last user message.
    pub preview: String,
}

/// Conversation resolution and message access, supplied by the messaging
/// layer.
#[async_trait]
pub trait Conversations: Send + Sync {
    /// Resolve (or create) the conversation for a visitor on a bot,
    /// returning its id.
    async fn resolve_conversation(
        &self,
        bot_id: &str,
        visitor_id: &str,
    ) -> Result<String, ConversationError>;

    /// The last message on a conversation, if any.
    async fn last_message(
        &self,
        conversation_id: &str,
    ) -> Result<Option<ConversationSnapshot>, ConversationError>;
}
