//! # Chat Transport Boundary
//!
//! The narrow interface the engine calls out through. Authentication, REST
//! plumbing and the push stream all live behind [`ChatTransport`]; the
//! engine itself owns no wire protocol. Tests drive the engine with a
//! scripted implementation, production uses [`rest::RestTransport`].

pub mod rest;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::mpsc;
use uuid::Uuid;

/// Transport-level failures
#[derive(Debug, Error)]
pub enum TransportError {
    /// The server answered with a non-success status
    #[error("server returned {status}: {body}")]
    Http {
        /// HTTP status code
        status: u16,
        /// Response body, for diagnostics
        body: String,
    },
    /// The request could not be performed
    #[error("request failed: {0}")]
    Request(String),
    /// The response body could not be decoded
    #[error("invalid response payload: {0}")]
    Decode(String),
}

/// Server acknowledgment of a send
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SendReceipt {
    /// The server-assigned permanent message id
    pub message_id: Uuid,
    /// The server-authoritative creation timestamp
    pub created_at: DateTime<Utc>,
}

/// Server acknowledgment of an edit
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct EditReceipt {
    /// The server-authoritative edit timestamp
    pub edited_at: DateTime<Utc>,
}

/// Server acknowledgment of a delete
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DeleteReceipt {
    /// The server-authoritative deletion timestamp
    pub deleted_at: DateTime<Utc>,
}

/// One page of conversation history
///
/// Records are raw JSON: the History Adapter owns the schema and fails
/// closed per record, so a single malformed row cannot poison the page.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryPage {
    /// Raw records, oldest-first within the page
    pub records: Vec<serde_json::Value>,
    /// Whether the server has more pages
    pub has_more: bool,
}

/// The external collaborators the engine consumes
#[async_trait]
pub trait ChatTransport: Send + Sync {
    /// Send a new message; resolves with the permanent id
    async fn send_message(
        &self,
        conversation_id: Uuid,
        content: &str,
    ) -> Result<SendReceipt, TransportError>;

    /// Edit an existing message
    async fn edit_message(
        &self,
        message_id: Uuid,
        content: &str,
    ) -> Result<EditReceipt, TransportError>;

    /// Delete an existing message (soft delete server-side)
    async fn delete_message(&self, message_id: Uuid) -> Result<DeleteReceipt, TransportError>;

    /// Fetch one page of history
    async fn fetch_history(
        &self,
        conversation_id: Uuid,
        page: u32,
        page_size: u32,
    ) -> Result<HistoryPage, TransportError>;

    /// Subscribe to the conversation's delta stream. Frames arrive as raw
    /// JSON values, unordered relative to REST calls; the channel closes
    /// when the stream ends.
    async fn subscribe_deltas(
        &self,
        conversation_id: Uuid,
    ) -> Result<mpsc::Receiver<serde_json::Value>, TransportError>;
}
