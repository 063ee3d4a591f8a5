//! # History Adapter
//!
//! Translates paginated REST history responses into canonical messages and
//! feeds them to the cache. The adapter declares the exact schema it accepts
//! and fails closed: a record that does not match is dropped and logged, the
//! rest of the page continues. A failed page fetch surfaces a retryable
//! error and leaves both the cache and the cursor untouched.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Deserialize;
use uuid::Uuid;

use crate::engine::merge::RecordSource;
use crate::engine::session::SessionCore;
use crate::shared::error::EngineError;
use crate::shared::message::{Attachment, ChatMessage, ConversationKind, DeliveryState};
use crate::transport::ChatTransport;

/// The exact history record schema this adapter accepts
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct HistoryRecord {
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
    pub attachment: Option<HistoryAttachment>,
}

/// Attachment shape within a history record
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct HistoryAttachment {
    /// Attachment kind
    pub kind: String,
    /// Download URL
    pub url: String,
    /// Display name
    pub name: String,
}

impl HistoryRecord {
    /// Normalize into the canonical message shape
    pub fn into_message(self, kind: ConversationKind) -> ChatMessage {
        ChatMessage {
            id: self.id,
            provisional_id: None,
            conversation_id: self.conversation_id,
            conversation_kind: kind,
            sender_id: self.sender_id,
            content: self.content,
            created_at: self.created_at,
            edited_at: self.edited_at,
            deleted_at: self.deleted_at,
            delivery_state: DeliveryState::Delivered,
            attachment: self.attachment.map(|a| Attachment {
                kind: a.kind,
                url: a.url,
                name: a.name,
            }),
        }
    }
}

/// Adapter for the paginated history source
#[derive(Clone)]
pub struct HistoryAdapter {
    core: Arc<SessionCore>,
    transport: Arc<dyn ChatTransport>,
}

impl HistoryAdapter {
    /// Create the adapter for one session
    pub fn new(core: Arc<SessionCore>, transport: Arc<dyn ChatTransport>) -> Self {
        Self { core, transport }
    }

    /// Fetch and merge the next page. Returns the number of records that
    /// changed the list; `Ok(0)` when the server has no more pages.
    pub async fn load_older(&self) -> Result<usize, EngineError> {
        let conversation_id = self.core.conversation.id;
        let kind = self.core.conversation.kind;
        let cursor = {
            let state = self.core.state.read().await;
            state.cache.cursor()
        };
        if !cursor.has_more {
            return Ok(0);
        }

        let page = self
            .transport
            .fetch_history(
                conversation_id,
                cursor.next_page,
                self.core.config.history_page_size,
            )
            .await
            .map_err(|err| EngineError::network("fetch_history", err.to_string()))?;

        let mut records = Vec::with_capacity(page.records.len());
        for value in page.records {
            match serde_json::from_value::<HistoryRecord>(value) {
                Ok(record) if record.conversation_id == conversation_id => {
                    records.push(record.into_message(kind));
                }
                Ok(record) => {
                    tracing::warn!(
                        "dropping history record {} addressed to foreign conversation {}",
                        record.id,
                        record.conversation_id
                    );
                }
                Err(err) => {
                    tracing::warn!("{}", EngineError::malformed("history", err.to_string()));
                }
            }
        }

        let (changed, revision, merged) = {
            let mut state = self.core.state.write().await;
            let mut adopted = false;
            for record in &records {
                adopted |= state.adopt_incoming_identity(record);
            }
            let report = state.ingest(records, RecordSource::History);
            state.cache.advance_cursor(cursor.next_page + 1, page.has_more);
            (
                adopted || report.changed(),
                state.cache.revision(),
                report.inserted + report.updated,
            )
        };
        if changed {
            self.core.publish(revision);
        }
        tracing::debug!(
            "history page {} of {} merged {} records",
            cursor.next_page,
            conversation_id,
            merged
        );
        Ok(merged)
    }
}
