//! # Optimistic Adapter
//!
//! Turns local user actions into engine state the instant they happen and
//! reconciles them when the network answers. A send inserts a provisional
//! entry before the request leaves the process; edits and deletes write
//! their tombstone first, so no background source can undo them while the
//! confirmation is in flight.
//!
//! ## Outgoing state machine
//!
//! `composing -> pending (provisional id) -> delivered | failed`, with edits
//! and deletes re-entering a pending sub-state per message that resolves to
//! confirmed or reverted-with-error. Retry after failure is caller-driven
//! and produces a fresh provisional.

use std::sync::Arc;

use chrono::Utc;
use uuid::Uuid;

use crate::engine::merge::RecordSource;
use crate::engine::session::SessionCore;
use crate::shared::error::EngineError;
use crate::shared::message::{ChatMessage, DeliveryState};
use crate::transport::ChatTransport;

/// Adapter for optimistic local writes
#[derive(Clone)]
pub struct OptimisticAdapter {
    core: Arc<SessionCore>,
    transport: Arc<dyn ChatTransport>,
}

impl OptimisticAdapter {
    /// Create the adapter for one session
    pub fn new(core: Arc<SessionCore>, transport: Arc<dyn ChatTransport>) -> Self {
        Self { core, transport }
    }

    /// Send a message: provisional insert, bounded network call, resolve.
    /// Resolves to the permanent id.
    pub async fn send(&self, content: String) -> Result<Uuid, EngineError> {
        let conversation = &self.core.conversation;
        let provisional = ChatMessage::new_provisional(
            conversation.id,
            conversation.kind,
            self.core.current_user,
            content.clone(),
        );
        let local_id = provisional.id;

        let revision = {
            let mut state = self.core.state.write().await;
            state.identity.register_provisional(&provisional);
            state.ingest(vec![provisional], RecordSource::Optimistic);
            state.cache.revision()
        };
        self.core.publish(revision);
        tracing::debug!("optimistic send {} queued in {}", local_id, conversation.id);

        let result = tokio::time::timeout(
            self.core.config.send_timeout,
            self.transport.send_message(conversation.id, &content),
        )
        .await;

        match result {
            Ok(Ok(receipt)) => {
                let (canonical, before, after) = {
                    let mut state = self.core.state.write().await;
                    let before = state.cache.revision();
                    let canonical =
                        state.bind_acknowledged(local_id, receipt.message_id, receipt.created_at);
                    (canonical, before, state.cache.revision())
                };
                if after != before {
                    self.core.publish(after);
                }
                Ok(canonical)
            }
            Ok(Err(err)) => self.fail_send(local_id, err.to_string()).await,
            Err(_) => {
                let reason = format!("timed out after {:?}", self.core.config.send_timeout);
                self.fail_send(local_id, reason).await
            }
        }
    }

    /// Retry a failed send: remove and retire the failed provisional, then
    /// send the same content under a fresh provisional id.
    pub async fn retry(&self, failed_id: Uuid) -> Result<Uuid, EngineError> {
        let (content, revision) = {
            let mut state = self.core.state.write().await;
            let Some(entry) = state.cache.get(failed_id).cloned() else {
                return Err(EngineError::UnknownMessage { id: failed_id });
            };
            if !entry.is_failed() || !entry.is_provisional() {
                return Err(EngineError::network(
                    "retry",
                    "only failed unacknowledged sends can be retried",
                ));
            }
            state.identity.retire(failed_id);
            state.cache.remove(failed_id);
            (entry.content, state.cache.revision())
        };
        self.core.publish(revision);
        self.send(content).await
    }

    /// Edit a message: tombstone first, apply optimistically, then confirm
    /// or revert-with-error. Editing a still-provisional message stays local
    /// until the id resolves.
    pub async fn edit(&self, id: Uuid, content: String) -> Result<(), EngineError> {
        let edited_at = Utc::now();
        let (prior, was_provisional, changed, revision) = {
            let mut state = self.core.state.write().await;
            let Some(entry) = state.cache.get(id).cloned() else {
                return Err(EngineError::UnknownMessage { id });
            };
            if entry.is_deleted() {
                tracing::warn!("ignoring edit of deleted message {}", id);
                return Ok(());
            }
            state.tombstones.mark_edited(id, content.clone(), edited_at);

            let mut record = entry.clone();
            record.content = content.clone();
            record.edited_at = Some(edited_at);
            if !entry.is_provisional() {
                record.delivery_state = DeliveryState::Pending;
            }
            let report = state.ingest(vec![record], RecordSource::Optimistic);
            (
                entry.clone(),
                entry.is_provisional(),
                report.changed(),
                state.cache.revision(),
            )
        };
        if changed {
            self.core.publish(revision);
        }
        if was_provisional {
            // No permanent id to address yet; the tombstone rides along when
            // the send resolves.
            return Ok(());
        }

        let result = tokio::time::timeout(
            self.core.config.send_timeout,
            self.transport.edit_message(id, &content),
        )
        .await;

        match result {
            Ok(Ok(receipt)) => {
                let (changed, revision) = {
                    let mut state = self.core.state.write().await;
                    state.tombstones.mark_edited(id, content, receipt.edited_at);
                    let changed = state.cache.update_entry(id, |m| {
                        m.edited_at = Some(receipt.edited_at);
                        m.delivery_state = DeliveryState::Delivered;
                    });
                    (changed, state.cache.revision())
                };
                if changed {
                    self.core.publish(revision);
                }
                Ok(())
            }
            Ok(Err(err)) => self.revert_edit(id, edited_at, &prior, err.to_string()).await,
            Err(_) => {
                let reason = format!("timed out after {:?}", self.core.config.send_timeout);
                self.revert_edit(id, edited_at, &prior, reason).await
            }
        }
    }

    /// Delete a message: tombstone first, apply optimistically, then confirm
    /// or revert-with-error. Deleting a still-provisional message cancels
    /// the in-flight send's effect — the tombstone is keyed by the
    /// provisional id and re-keyed on resolution, so a late acknowledgment
    /// cannot resurrect it.
    pub async fn delete(&self, id: Uuid) -> Result<(), EngineError> {
        let deleted_at = Utc::now();
        let (prior, was_provisional, changed, revision) = {
            let mut state = self.core.state.write().await;
            let Some(entry) = state.cache.get(id).cloned() else {
                return Err(EngineError::UnknownMessage { id });
            };
            if entry.is_deleted() {
                return Ok(());
            }
            state.tombstones.mark_deleted(id, deleted_at);

            let mut record = entry.clone();
            record.deleted_at = Some(deleted_at);
            if !entry.is_provisional() {
                record.delivery_state = DeliveryState::Pending;
            }
            let report = state.ingest(vec![record], RecordSource::Optimistic);
            (
                entry.clone(),
                entry.is_provisional(),
                report.changed(),
                state.cache.revision(),
            )
        };
        if changed {
            self.core.publish(revision);
        }
        if was_provisional {
            return Ok(());
        }

        let result = tokio::time::timeout(
            self.core.config.send_timeout,
            self.transport.delete_message(id),
        )
        .await;

        match result {
            Ok(Ok(receipt)) => {
                let (changed, revision) = {
                    let mut state = self.core.state.write().await;
                    state.tombstones.mark_deleted(id, receipt.deleted_at);
                    let settled = state
                        .tombstones
                        .state(id)
                        .and_then(|t| t.deleted)
                        .unwrap_or(receipt.deleted_at);
                    let changed = state.cache.update_entry(id, |m| {
                        m.deleted_at = Some(settled);
                        m.delivery_state = DeliveryState::Delivered;
                    });
                    (changed, state.cache.revision())
                };
                if changed {
                    self.core.publish(revision);
                }
                Ok(())
            }
            Ok(Err(err)) => {
                self.revert_delete(id, deleted_at, &prior, err.to_string())
                    .await
            }
            Err(_) => {
                let reason = format!("timed out after {:?}", self.core.config.send_timeout);
                self.revert_delete(id, deleted_at, &prior, reason).await
            }
        }
    }

    /// Settle a failed send. If the realtime echo confirmed delivery while
    /// the acknowledgment itself failed, the send is treated as delivered.
    async fn fail_send(&self, local_id: Uuid, reason: String) -> Result<Uuid, EngineError> {
        let (outcome, changed, revision) = {
            let mut state = self.core.state.write().await;
            let canonical = state.identity.canonical_id(local_id);
            if canonical != local_id {
                let changed = state.cache.update_entry(canonical, |m| {
                    if m.delivery_state == DeliveryState::Pending {
                        m.delivery_state = DeliveryState::Delivered;
                    }
                });
                (Ok(canonical), changed, state.cache.revision())
            } else {
                let changed = state.cache.update_entry(local_id, |m| {
                    m.delivery_state = DeliveryState::Failed;
                });
                (
                    Err(EngineError::network("send", reason.clone())),
                    changed,
                    state.cache.revision(),
                )
            }
        };
        if changed {
            self.core.publish(revision);
        }
        match &outcome {
            Ok(canonical) => {
                tracing::warn!(
                    "send acknowledgment failed ({}) but echo already delivered {}",
                    reason,
                    canonical
                );
            }
            Err(_) => {
                tracing::warn!("send of provisional {} failed: {}", local_id, reason);
            }
        }
        outcome
    }

    /// Withdraw a failed edit, restoring the pre-edit entry unless a newer
    /// local edit was laid down meanwhile.
    async fn revert_edit(
        &self,
        id: Uuid,
        edited_at: chrono::DateTime<Utc>,
        prior: &ChatMessage,
        reason: String,
    ) -> Result<(), EngineError> {
        let (changed, revision) = {
            let mut state = self.core.state.write().await;
            let reverted = state.tombstones.revert_edit(id, edited_at);
            let changed = if reverted {
                state.cache.update_entry(id, |m| {
                    m.content = prior.content.clone();
                    m.edited_at = prior.edited_at;
                    m.delivery_state = prior.delivery_state;
                })
            } else {
                false
            };
            (changed, state.cache.revision())
        };
        if changed {
            self.core.publish(revision);
        }
        tracing::warn!("edit of {} reverted: {}", id, reason);
        Err(EngineError::network("edit", reason))
    }

    /// Withdraw a failed delete, restoring the entry unless a newer local
    /// delete was laid down meanwhile.
    async fn revert_delete(
        &self,
        id: Uuid,
        deleted_at: chrono::DateTime<Utc>,
        prior: &ChatMessage,
        reason: String,
    ) -> Result<(), EngineError> {
        let (changed, revision) = {
            let mut state = self.core.state.write().await;
            let reverted = state.tombstones.revert_delete(id, deleted_at);
            let changed = if reverted {
                state.cache.update_entry(id, |m| {
                    m.deleted_at = prior.deleted_at;
                    m.delivery_state = prior.delivery_state;
                })
            } else {
                false
            };
            (changed, state.cache.revision())
        };
        if changed {
            self.core.publish(revision);
        }
        tracing::warn!("delete of {} reverted: {}", id, reason);
        Err(EngineError::network("delete", reason))
    }
}
