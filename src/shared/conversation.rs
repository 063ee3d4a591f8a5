//! Conversation Data Structure
//!
//! Describes the conversation a session reconciles messages for.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::message::ConversationKind;

/// Represents a conversation (private or group thread)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Conversation {
    /// Unique conversation ID
    pub id: Uuid,
    /// Private (1:1) or group thread
    pub kind: ConversationKind,
    /// Display title (group name, or the peer's name for private threads)
    pub title: String,
}

impl Conversation {
    /// Create a private (1:1) conversation descriptor
    pub fn private(id: Uuid, title: impl Into<String>) -> Self {
        Self {
            id,
            kind: ConversationKind::Private,
            title: title.into(),
        }
    }

    /// Create a group conversation descriptor
    pub fn group(id: Uuid, title: impl Into<String>) -> Self {
        Self {
            id,
            kind: ConversationKind::Group,
            title: title.into(),
        }
    }
}
