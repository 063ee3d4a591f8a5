//! # Tombstone Store
//!
//! Records authoritative local intent — edits and deletes the user has
//! performed — so that later data from any source cannot silently revert
//! them. The Merge Engine consults this store before applying any incoming
//! record.
//!
//! Entries live for the conversation session only; a reload re-derives truth
//! from the server.

use chrono::{DateTime, Utc};
use std::collections::HashMap;
use uuid::Uuid;

/// A locally-recorded edit that must resist older external data
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EditTombstone {
    /// The locally-edited content
    pub content: String,
    /// When the local edit was made
    pub edited_at: DateTime<Utc>,
}

/// Tombstone state for a single message id
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TombstoneState {
    /// Present iff the message was locally edited
    pub edited: Option<EditTombstone>,
    /// Present iff the message was locally deleted
    pub deleted: Option<DateTime<Utc>>,
}

impl TombstoneState {
    fn is_empty(&self) -> bool {
        self.edited.is_none() && self.deleted.is_none()
    }
}

/// Stores local edit/delete intent per message id
#[derive(Debug, Default)]
pub struct TombstoneStore {
    entries: HashMap<Uuid, TombstoneState>,
}

impl TombstoneStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self {
            entries: HashMap::new(),
        }
    }

    /// Record a local edit. Re-marking with the same or an older timestamp
    /// is a no-op; a newer timestamp replaces the recorded content.
    pub fn mark_edited(&mut self, id: Uuid, content: String, edited_at: DateTime<Utc>) {
        let entry = self.entries.entry(id).or_default();
        match &entry.edited {
            Some(existing) if existing.edited_at >= edited_at => {
                tracing::debug!("ignoring edit tombstone for {} at {}: not newer", id, edited_at);
            }
            _ => {
                entry.edited = Some(EditTombstone { content, edited_at });
            }
        }
    }

    /// Record a local delete. Re-marking with the same or an older timestamp
    /// is a no-op.
    pub fn mark_deleted(&mut self, id: Uuid, deleted_at: DateTime<Utc>) {
        let entry = self.entries.entry(id).or_default();
        match entry.deleted {
            Some(existing) if existing >= deleted_at => {
                tracing::debug!("ignoring delete tombstone for {} at {}: not newer", id, deleted_at);
            }
            _ => {
                entry.deleted = Some(deleted_at);
            }
        }
    }

    /// Tombstone state for an id, if any intent was recorded
    pub fn state(&self, id: Uuid) -> Option<&TombstoneState> {
        self.entries.get(&id)
    }

    /// Whether any local intent is recorded for this id
    pub fn is_tombstoned(&self, id: Uuid) -> bool {
        self.entries.contains_key(&id)
    }

    /// Move tombstones recorded under a provisional id to the permanent id.
    ///
    /// Local intent applied while a send was still unconfirmed is keyed by
    /// the provisional id; identity resolution carries it over so a late
    /// acknowledgment cannot resurrect a deleted message. Returns whether an
    /// entry was moved.
    pub fn rekey(&mut self, old_id: Uuid, new_id: Uuid) -> bool {
        let Some(moved) = self.entries.remove(&old_id) else {
            return false;
        };
        let target = self.entries.entry(new_id).or_default();
        match (&target.edited, moved.edited) {
            (Some(existing), Some(incoming)) if incoming.edited_at > existing.edited_at => {
                target.edited = Some(incoming);
            }
            (None, Some(incoming)) => target.edited = Some(incoming),
            _ => {}
        }
        match (target.deleted, moved.deleted) {
            (Some(existing), Some(incoming)) if incoming > existing => {
                target.deleted = Some(incoming);
            }
            (None, Some(incoming)) => target.deleted = Some(incoming),
            _ => {}
        }
        true
    }

    /// Withdraw an edit tombstone after its confirming network call failed.
    ///
    /// Only removes the tombstone if the recorded timestamp still matches the
    /// failed operation, so a newer local edit laid down meanwhile is kept.
    /// Returns whether the tombstone was withdrawn.
    pub fn revert_edit(&mut self, id: Uuid, edited_at: DateTime<Utc>) -> bool {
        let Some(entry) = self.entries.get_mut(&id) else {
            return false;
        };
        match &entry.edited {
            Some(existing) if existing.edited_at == edited_at => {
                entry.edited = None;
                if entry.is_empty() {
                    self.entries.remove(&id);
                }
                true
            }
            _ => false,
        }
    }

    /// Withdraw a delete tombstone after its confirming network call failed.
    ///
    /// Same matching rule as [`revert_edit`](Self::revert_edit).
    pub fn revert_delete(&mut self, id: Uuid, deleted_at: DateTime<Utc>) -> bool {
        let Some(entry) = self.entries.get_mut(&id) else {
            return false;
        };
        match entry.deleted {
            Some(existing) if existing == deleted_at => {
                entry.deleted = None;
                if entry.is_empty() {
                    self.entries.remove(&id);
                }
                true
            }
            _ => false,
        }
    }

    /// Number of tombstoned ids
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the store holds no tombstones
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
