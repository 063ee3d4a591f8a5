//! # Conversation Cache
//!
//! The externally visible state surface: one ordered message list per
//! conversation plus its pagination cursor. All mutation funnels through
//! [`ConversationCache::ingest`], which hands the batch to the Merge Engine
//! and bumps the revision counter whenever the list actually changes.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::engine::merge::{merge_batch, sort_messages, MergeReport, RecordSource};
use crate::engine::tombstone::TombstoneStore;
use crate::shared::message::{ChatMessage, ConversationKind};

/// Pagination state for the history source
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageCursor {
    /// Next page to request from the history endpoint
    pub next_page: u32,
    /// Whether the server reported more pages
    pub has_more: bool,
}

impl Default for PageCursor {
    fn default() -> Self {
        Self {
            next_page: 0,
            has_more: true,
        }
    }
}

/// Notification sent to subscribers when a conversation's list changes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheUpdate {
    /// The conversation whose list changed
    pub conversation_id: Uuid,
    /// The revision the cache reached with this change
    pub revision: u64,
}

/// Per-conversation ordered message list plus pagination cursor
#[derive(Debug)]
pub struct ConversationCache {
    conversation_id: Uuid,
    kind: ConversationKind,
    messages: Vec<ChatMessage>,
    cursor: PageCursor,
    revision: u64,
}

impl ConversationCache {
    /// Create an empty cache for one conversation
    pub fn new(conversation_id: Uuid, kind: ConversationKind) -> Self {
        Self {
            conversation_id,
            kind,
            messages: Vec::new(),
            cursor: PageCursor::default(),
            revision: 0,
        }
    }

    /// The conversation this cache belongs to
    pub fn conversation_id(&self) -> Uuid {
        self.conversation_id
    }

    /// The kind of the owning conversation
    pub fn kind(&self) -> ConversationKind {
        self.kind
    }

    /// The ordered message list
    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    /// Look up a message by id
    pub fn get(&self, id: Uuid) -> Option<&ChatMessage> {
        self.messages.iter().find(|m| m.id == id)
    }

    /// Whether an entry exists for this id
    pub fn contains(&self, id: Uuid) -> bool {
        self.messages.iter().any(|m| m.id == id)
    }

    /// Current pagination cursor
    pub fn cursor(&self) -> PageCursor {
        self.cursor
    }

    /// Advance the pagination cursor; only the History Adapter calls this
    pub fn advance_cursor(&mut self, next_page: u32, has_more: bool) {
        self.cursor = PageCursor {
            next_page,
            has_more,
        };
    }

    /// Monotonic revision, bumped on every structural change
    pub fn revision(&self) -> u64 {
        self.revision
    }

    /// Merge a batch of identity-normalized records into the list.
    /// Returns the merge report; the revision is bumped iff it changed.
    pub fn ingest(
        &mut self,
        batch: Vec<ChatMessage>,
        source: RecordSource,
        tombstones: &mut TombstoneStore,
    ) -> MergeReport {
        let report = merge_batch(&mut self.messages, batch, source, tombstones);
        if report.changed() {
            self.revision += 1;
        }
        report
    }

    /// Rewrite a provisional entry's id to its permanent id, preserving every
    /// other field (including any tombstone already applied to it).
    ///
    /// If an entry with the permanent id already exists — the realtime echo
    /// was ingested as its own record before the acknowledgment arrived — the
    /// provisional entry is dropped instead, keeping at most one entry per
    /// id. Returns whether anything changed.
    pub fn rebind(
        &mut self,
        local_id: Uuid,
        permanent_id: Uuid,
        server_created_at: Option<DateTime<Utc>>,
    ) -> bool {
        let Some(index) = self.messages.iter().position(|m| m.id == local_id) else {
            return false;
        };
        if self.contains(permanent_id) {
            tracing::warn!(
                "dropping provisional {} superseded by existing entry {}",
                local_id,
                permanent_id
            );
            self.messages.remove(index);
        } else {
            let entry = &mut self.messages[index];
            entry.id = permanent_id;
            entry.provisional_id = None;
            if let Some(created_at) = server_created_at {
                entry.created_at = created_at;
            }
            sort_messages(&mut self.messages);
        }
        self.revision += 1;
        true
    }

    /// Remove an entry outright. Reserved for failed local-only provisionals
    /// superseded by an explicit retry; acknowledged messages are only ever
    /// soft-deleted.
    pub fn remove(&mut self, id: Uuid) -> Option<ChatMessage> {
        let index = self.messages.iter().position(|m| m.id == id)?;
        self.revision += 1;
        Some(self.messages.remove(index))
    }

    /// Mutate a single entry in place. Returns whether the entry changed;
    /// the revision is bumped (and the list re-sorted) only when it did.
    pub fn update_entry<F>(&mut self, id: Uuid, mutate: F) -> bool
    where
        F: FnOnce(&mut ChatMessage),
    {
        let Some(entry) = self.messages.iter_mut().find(|m| m.id == id) else {
            return false;
        };
        let before = entry.clone();
        mutate(entry);
        if *entry == before {
            return false;
        }
        self.revision += 1;
        sort_messages(&mut self.messages);
        true
    }
}
