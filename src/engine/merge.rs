//! # Merge Engine
//!
//! Produces a single consistent message list from batches arriving out of
//! order from three independent sources. Local user intent recorded in the
//! [`TombstoneStore`] dominates any background data source, which is what
//! keeps a background refetch from undoing a delete or edit the user just
//! performed.
//!
//! ## Precedence, per incoming record
//!
//! 1. id tombstoned as deleted: the deletion and local content stand;
//!    only the server-authoritative creation timestamp may be adopted.
//! 2. id tombstoned as edited: the local content stands unless the record
//!    carries a strictly newer edit, which supersedes the tombstone.
//! 3. otherwise the record replaces the cached state — unless it is older
//!    than what the cache holds, in which case it is discarded as stale.
//! 4. unknown ids are inserted (with any tombstone applied) and the list
//!    re-sorted.
//!
//! Records must be identity-normalized by their adapter before merging;
//! provisional replacement (rule 5 of the contract) is the re-bind path in
//! the cache, shared between acknowledgment and echo handling.

use std::fmt;

use crate::engine::tombstone::TombstoneStore;
use crate::shared::message::{ChatMessage, DeliveryState};

/// The source a batch of records arrived from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordSource {
    /// Optimistic local writes
    Optimistic,
    /// Paginated history reads
    History,
    /// Realtime push deltas
    Realtime,
}

impl fmt::Display for RecordSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecordSource::Optimistic => write!(f, "optimistic"),
            RecordSource::History => write!(f, "history"),
            RecordSource::Realtime => write!(f, "realtime"),
        }
    }
}

/// Outcome counts for one merged batch
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MergeReport {
    /// Records inserted as new entries
    pub inserted: usize,
    /// Records that changed an existing entry
    pub updated: usize,
    /// Records discarded because the cache held newer state
    pub discarded_stale: usize,
    /// Records whose semantic fields were suppressed by a tombstone
    pub suppressed_tombstoned: usize,
}

impl MergeReport {
    /// Whether the merge changed the list (gates subscriber notification)
    pub fn changed(&self) -> bool {
        self.inserted > 0 || self.updated > 0
    }
}

/// Merge a batch of identity-normalized records into the message list.
///
/// The list is left sorted by `(created_at, id)` with at most one entry per
/// id. Merging the same batch twice leaves the list unchanged the second
/// time.
pub fn merge_batch(
    messages: &mut Vec<ChatMessage>,
    batch: Vec<ChatMessage>,
    source: RecordSource,
    tombstones: &mut TombstoneStore,
) -> MergeReport {
    let mut report = MergeReport::default();

    for mut record in batch {
        let index = messages.iter().position(|m| m.id == record.id);
        let state = tombstones.state(record.id).cloned().unwrap_or_default();

        // Rule 1: a local delete stands, whatever the record says.
        if let Some(deleted_at) = state.deleted {
            merge_deleted(messages, record, index, deleted_at, &state, source, &mut report);
            continue;
        }

        // Rule 2: a local edit stands unless the record is strictly newer.
        if let Some(edit) = &state.edited {
            match record.edited_at {
                Some(incoming) if incoming > edit.edited_at => {
                    // A genuinely newer remote edit supersedes the tombstone.
                    tombstones.mark_edited(record.id, record.content.clone(), incoming);
                }
                _ => {
                    record.content = edit.content.clone();
                    record.edited_at = Some(edit.edited_at);
                    report.suppressed_tombstoned += 1;
                }
            }
        }

        // Rules 3 and 4: newest state wins; unknown ids are inserted.
        match index {
            Some(i) => {
                let entry = &messages[i];
                if record.effective_timestamp() < entry.effective_timestamp() {
                    tracing::debug!(
                        "discarding stale {} record for message {}",
                        source,
                        record.id
                    );
                    report.discarded_stale += 1;
                } else {
                    // A deletion never un-deletes, even without a local
                    // tombstone (remote deletes are final too).
                    if entry.deleted_at.is_some() && record.deleted_at.is_none() {
                        record.deleted_at = entry.deleted_at;
                        record.content = entry.content.clone();
                        record.edited_at = entry.edited_at;
                    }
                    if *entry != record {
                        messages[i] = record;
                        report.updated += 1;
                    }
                }
            }
            None => {
                messages.push(record);
                report.inserted += 1;
            }
        }
    }

    if report.changed() {
        sort_messages(messages);
    }
    report
}

/// Rule 1: apply a record for a locally-deleted id. The deletion and the
/// local content are kept; only a newer server creation timestamp is adopted.
fn merge_deleted(
    messages: &mut Vec<ChatMessage>,
    record: ChatMessage,
    index: Option<usize>,
    deleted_at: chrono::DateTime<chrono::Utc>,
    state: &crate::engine::tombstone::TombstoneState,
    source: RecordSource,
    report: &mut MergeReport,
) {
    match index {
        Some(i) => {
            let entry = &mut messages[i];
            let mut changed = false;
            if entry.deleted_at != Some(deleted_at) {
                entry.deleted_at = Some(deleted_at);
                changed = true;
            }
            if !record.is_provisional()
                && record.effective_timestamp() > entry.effective_timestamp()
                && entry.created_at != record.created_at
            {
                entry.created_at = record.created_at;
                changed = true;
            }
            // Only the local source may advance the delivery state of a
            // deletion still in flight.
            if source == RecordSource::Optimistic && entry.delivery_state != record.delivery_state {
                entry.delivery_state = record.delivery_state;
                changed = true;
            }
            if changed {
                report.updated += 1;
            } else {
                report.suppressed_tombstoned += 1;
            }
        }
        None => {
            // A deleted-before-cached id: insert the record with local
            // intent applied on top.
            let mut insert = record;
            insert.deleted_at = Some(deleted_at);
            if let Some(edit) = &state.edited {
                if insert.edited_at.map_or(true, |ts| ts <= edit.edited_at) {
                    insert.content = edit.content.clone();
                    insert.edited_at = Some(edit.edited_at);
                }
            }
            if source != RecordSource::Optimistic {
                insert.delivery_state = DeliveryState::Delivered;
            }
            messages.push(insert);
            report.inserted += 1;
        }
    }
}

/// Sort by the canonical ordering key: `created_at` ascending, id tie-break
pub fn sort_messages(messages: &mut [ChatMessage]) {
    messages.sort_by(|a, b| a.sort_key().cmp(&b.sort_key()));
}
