//! Builders for canonical messages and wire-shaped records
//!
//! Tests construct timestamps from a fixed base so ordering assertions are
//! deterministic.

use chrono::{DateTime, Duration, TimeZone, Utc};
use serde_json::{json, Value};
use uuid::Uuid;

use xfchat::shared::message::{ChatMessage, ConversationKind, DeliveryState};

/// Fixed base timestamp all offsets are relative to
pub fn base_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap()
}

/// A delivered canonical message at `base_time() + offset_secs`
pub fn delivered_message(
    id: Uuid,
    conversation_id: Uuid,
    sender_id: Uuid,
    content: &str,
    offset_secs: i64,
) -> ChatMessage {
    ChatMessage {
        id,
        provisional_id: None,
        conversation_id,
        conversation_kind: ConversationKind::Group,
        sender_id,
        content: content.to_string(),
        created_at: base_time() + Duration::seconds(offset_secs),
        edited_at: None,
        deleted_at: None,
        delivery_state: DeliveryState::Delivered,
        attachment: None,
    }
}

/// A raw history record as the REST endpoint would serialize it
pub fn history_record_value(
    id: Uuid,
    conversation_id: Uuid,
    sender_id: Uuid,
    content: &str,
    created_at: DateTime<Utc>,
) -> Value {
    json!({
        "id": id,
        "conversation_id": conversation_id,
        "sender_id": sender_id,
        "content": content,
        "created_at": created_at,
    })
}

/// A `message.new` delta frame as the push stream would deliver it
pub fn delta_new_frame(
    id: Uuid,
    conversation_id: Uuid,
    sender_id: Uuid,
    content: &str,
    created_at: DateTime<Utc>,
) -> Value {
    json!({
        "type": "message.new",
        "message": {
            "id": id,
            "conversation_id": conversation_id,
            "sender_id": sender_id,
            "content": content,
            "created_at": created_at,
        }
    })
}

/// A `message.edited` delta frame carrying the full updated record
pub fn delta_edited_frame(
    id: Uuid,
    conversation_id: Uuid,
    sender_id: Uuid,
    content: &str,
    created_at: DateTime<Utc>,
    edited_at: Option<DateTime<Utc>>,
) -> Value {
    let mut message = json!({
        "id": id,
        "conversation_id": conversation_id,
        "sender_id": sender_id,
        "content": content,
        "created_at": created_at,
    });
    if let Some(edited_at) = edited_at {
        message["edited_at"] = json!(edited_at);
    }
    json!({ "type": "message.edited", "message": message })
}
