//! # Realtime Adapter
//!
//! Translates push delta frames into canonical messages. Frames follow the
//! `object.action` convention (`message.new`, `message.edited`,
//! `message.deleted`), each carrying the full updated record. A frame that
//! does not match the declared schema is dropped and logged; ingestion of
//! subsequent frames is never affected.
//!
//! Frames can arrive before, during or after the send acknowledgment and
//! any history page, so each record is first offered to the Identity
//! Resolver: the echo of an own, still-unacknowledged send replaces the
//! provisional entry in place instead of inserting a duplicate.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Deserialize;
use uuid::Uuid;

use crate::engine::merge::RecordSource;
use crate::engine::session::SessionCore;
use crate::shared::error::EngineError;
use crate::shared::message::{Attachment, ChatMessage, ConversationKind, DeliveryState};

/// The exact delta frame schema this adapter accepts
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type")]
pub enum DeltaFrame {
    /// A new message was posted
    #[serde(rename = "message.new")]
    MessageNew {
        /// The full record
        message: RealtimeRecord,
    },
    /// A message's content was edited
    #[serde(rename = "message.edited")]
    MessageEdited {
        /// The full updated record
        message: RealtimeRecord,
    },
    /// A message was deleted (soft delete)
    #[serde(rename = "message.deleted")]
    MessageDeleted {
        /// The full updated record
        message: RealtimeRecord,
    },
}

/// Record shape carried by every delta frame
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RealtimeRecord {
    /// Server-assigned message id
    pub id: Uuid,
    /// Owning conversation
    pub conversation_id: Uuid,
    /// Sending user
    pub sender_id: Uuid,
    /// Message content
    pub content: String,
    /// Server-authoritative creation timestamp
    pub created_at: DateTime<Utc>,
    /// Present iff the message was edited
    #[serde(default)]
    pub edited_at: Option<DateTime<Utc>>,
    /// Present iff the message was deleted
    #[serde(default)]
    pub deleted_at: Option<DateTime<Utc>>,
    /// Optional attachment reference
    #[serde(default)]
    pub attachment: Option<RealtimeAttachment>,
}

/// Attachment shape within a delta frame
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RealtimeAttachment {
    /// Attachment kind
    pub kind: String,
    /// Download URL
    pub url: String,
    /// Display name
    pub name: String,
}

impl DeltaFrame {
    /// Normalize into the canonical message shape, validating that the
    /// frame type and the record state agree.
    pub fn into_message(self, kind: ConversationKind) -> Result<ChatMessage, EngineError> {
        let record = match self {
            DeltaFrame::MessageNew { message } => message,
            DeltaFrame::MessageEdited { message } => {
                if message.edited_at.is_none() {
                    return Err(EngineError::malformed(
                        "realtime",
                        "message.edited frame without edited_at",
                    ));
                }
                message
            }
            DeltaFrame::MessageDeleted { message } => {
                if message.deleted_at.is_none() {
                    return Err(EngineError::malformed(
                        "realtime",
                        "message.deleted frame without deleted_at",
                    ));
                }
                message
            }
        };
        Ok(ChatMessage {
            id: record.id,
            provisional_id: None,
            conversation_id: record.conversation_id,
            conversation_kind: kind,
            sender_id: record.sender_id,
            content: record.content,
            created_at: record.created_at,
            edited_at: record.edited_at,
            deleted_at: record.deleted_at,
            delivery_state: DeliveryState::Delivered,
            attachment: record.attachment.map(|a| Attachment {
                kind: a.kind,
                url: a.url,
                name: a.name,
            }),
        })
    }
}

/// Adapter for the realtime push source
#[derive(Clone)]
pub struct RealtimeAdapter {
    core: Arc<SessionCore>,
}

impl RealtimeAdapter {
    /// Create the adapter for one session
    pub fn new(core: Arc<SessionCore>) -> Self {
        Self { core }
    }

    /// Ingest one raw delta frame. Malformed frames are dropped and logged;
    /// this never fails. Returns whether the list changed.
    pub async fn handle_frame(&self, frame: serde_json::Value) -> bool {
        let frame: DeltaFrame = match serde_json::from_value(frame) {
            Ok(frame) => frame,
            Err(err) => {
                tracing::warn!("{}", EngineError::malformed("realtime", err.to_string()));
                return false;
            }
        };
        let record = match frame.into_message(self.core.conversation.kind) {
            Ok(record) => record,
            Err(err) => {
                tracing::warn!("{}", err);
                return false;
            }
        };
        if record.conversation_id != self.core.conversation.id {
            tracing::warn!(
                "dropping delta for foreign conversation {} (session is {})",
                record.conversation_id,
                self.core.conversation.id
            );
            return false;
        }

        let (changed, revision) = {
            let mut state = self.core.state.write().await;
            let adopted = state.adopt_incoming_identity(&record);
            let report = state.ingest(vec![record], RecordSource::Realtime);
            (adopted || report.changed(), state.cache.revision())
        };
        if changed {
            self.core.publish(revision);
        }
        changed
    }
}
