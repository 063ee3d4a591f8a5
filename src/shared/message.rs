//! Chat Message Data Structure
//!
//! The canonical, source-independent message shape. Every record entering the
//! engine — an optimistic local write, a history page row, or a realtime
//! delta — is normalized into a [`ChatMessage`] before it is merged.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Kind of conversation a message belongs to
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ConversationKind {
    /// One-to-one conversation
    Private,
    /// Group conversation
    Group,
}

/// Delivery state of an outgoing operation
///
/// Only meaningful while the message id is provisional or a send/edit/delete
/// is in flight; settled messages are `Delivered`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryState {
    /// Waiting for server confirmation
    Pending,
    /// Confirmed by the server
    Delivered,
    /// The confirming network call failed; retry is caller-driven
    Failed,
}

/// Attachment reference carried on a message
///
/// Opaque to the engine; merged as a unit and never inspected.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Attachment {
    /// Attachment kind, e.g. "image" or "file"
    pub kind: String,
    /// Download URL
    pub url: String,
    /// Display name
    pub name: String,
}

/// Represents a chat message
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChatMessage {
    /// Unique message ID within the conversation; the cache key.
    /// Holds the client-generated provisional id until the server id is known.
    pub id: Uuid,
    /// Set to the provisional id exactly while the id is unresolved
    #[serde(default)]
    pub provisional_id: Option<Uuid>,
    /// Conversation this message belongs to
    pub conversation_id: Uuid,
    /// Kind of the owning conversation
    pub conversation_kind: ConversationKind,
    /// User who sent the message
    pub sender_id: Uuid,
    /// Message content
    pub content: String,
    /// When the message was created (client-estimated until server-confirmed)
    pub created_at: DateTime<Utc>,
    /// Present iff the message has been edited
    #[serde(default)]
    pub edited_at: Option<DateTime<Utc>>,
    /// Present iff the message is soft-deleted
    #[serde(default)]
    pub deleted_at: Option<DateTime<Utc>>,
    /// Delivery state of the latest outgoing operation on this message
    pub delivery_state: DeliveryState,
    /// Optional attachment reference
    #[serde(default)]
    pub attachment: Option<Attachment>,
}

impl ChatMessage {
    /// Create a provisional message for an optimistic local send
    pub fn new_provisional(
        conversation_id: Uuid,
        conversation_kind: ConversationKind,
        sender_id: Uuid,
        content: String,
    ) -> Self {
        let local_id = Uuid::new_v4();
        Self {
            id: local_id,
            provisional_id: Some(local_id),
            conversation_id,
            conversation_kind,
            sender_id,
            content,
            created_at: Utc::now(),
            edited_at: None,
            deleted_at: None,
            delivery_state: DeliveryState::Pending,
            attachment: None,
        }
    }

    /// Whether the id is still a client-generated provisional id
    pub fn is_provisional(&self) -> bool {
        self.provisional_id.is_some()
    }

    /// Whether the message is soft-deleted
    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }

    /// Whether an outgoing operation on this message is awaiting confirmation
    pub fn is_pending(&self) -> bool {
        self.delivery_state == DeliveryState::Pending
    }

    /// Whether the latest outgoing operation on this message failed
    pub fn is_failed(&self) -> bool {
        self.delivery_state == DeliveryState::Failed
    }

    /// The timestamp a merge compares: the edit time when present and newer,
    /// otherwise the creation time.
    pub fn effective_timestamp(&self) -> DateTime<Utc> {
        match self.edited_at {
            Some(edited) if edited > self.created_at => edited,
            _ => self.created_at,
        }
    }

    /// Deterministic ordering key: `created_at` ascending, ties broken by id
    pub fn sort_key(&self) -> (DateTime<Utc>, Uuid) {
        (self.created_at, self.id)
    }

    /// Get a preview of the message (first N characters)
    pub fn preview(&self, max_len: usize) -> String {
        if self.content.len() <= max_len {
            self.content.clone()
        } else {
            let mut preview: String =
                self.content.chars().take(max_len.saturating_sub(3)).collect();
            preview.push_str("...");
            preview
        }
    }
}
