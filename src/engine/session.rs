//! # Conversation Session
//!
//! The per-conversation owner object. A session is constructed when a
//! conversation is opened and discarded when it closes; it owns the cache,
//! the tombstone store and the identity resolver for exactly one
//! conversation, and composes the three source adapters that feed them.
//! There are no ambient singletons — two sessions never share state.
//!
//! All mutation of the conversation's state goes through one
//! `tokio::sync::RwLock`, so merges for the same conversation are serialized
//! while distinct conversations proceed independently. The lock is never
//! held across a network await.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::{broadcast, RwLock};
use uuid::Uuid;

use crate::adapters::history::HistoryAdapter;
use crate::adapters::optimistic::OptimisticAdapter;
use crate::adapters::realtime::RealtimeAdapter;
use crate::engine::cache::{CacheUpdate, ConversationCache, PageCursor};
use crate::engine::identity::{IdentityResolver, ResolveOutcome};
use crate::engine::merge::{MergeReport, RecordSource};
use crate::engine::tombstone::TombstoneStore;
use crate::shared::config::EngineConfig;
use crate::shared::conversation::Conversation;
use crate::shared::error::EngineError;
use crate::shared::message::{ChatMessage, DeliveryState};
use crate::transport::ChatTransport;

/// Derived, tombstone-aware view flags for one message
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MessageFlags {
    /// The message is locally deleted and must render as deleted
    pub tombstoned_deleted: bool,
    /// The message carries a local edit that dominates background data
    pub tombstoned_edited: bool,
    /// An outgoing operation is awaiting confirmation
    pub pending: bool,
    /// The latest outgoing operation failed; retry is available
    pub failed: bool,
}

/// The mutable state of one conversation: cache, tombstones and identity.
///
/// Every adapter mutates this through the session's lock; the helpers here
/// are the shared paths both the acknowledgment and the echo flows use.
#[derive(Debug)]
pub struct ConversationState {
    /// Ordered message list plus pagination cursor
    pub cache: ConversationCache,
    /// Local edit/delete intent
    pub tombstones: TombstoneStore,
    /// Provisional id tracking
    pub identity: IdentityResolver,
}

impl ConversationState {
    /// Create the state for one conversation
    pub fn new(conversation: &Conversation, config: &EngineConfig) -> Self {
        Self {
            cache: ConversationCache::new(conversation.id, conversation.kind),
            tombstones: TombstoneStore::new(),
            identity: IdentityResolver::new(config.provisional_match_window),
        }
    }

    /// Merge a batch into the cache with the tombstone store applied
    pub fn ingest(&mut self, batch: Vec<ChatMessage>, source: RecordSource) -> MergeReport {
        self.cache.ingest(batch, source, &mut self.tombstones)
    }

    /// Try to adopt an incoming record as the echo of an open provisional.
    ///
    /// When the record heuristically matches an open provisional, the
    /// provisional is resolved to the record's id, tombstones are re-keyed
    /// and the cache entry is re-bound in place, so the subsequent merge
    /// updates the existing entry instead of inserting a duplicate. Returns
    /// whether an adoption happened.
    pub fn adopt_incoming_identity(&mut self, record: &ChatMessage) -> bool {
        if self.cache.contains(record.id) {
            return false;
        }
        let Some(local_id) = self.identity.match_incoming(record) else {
            return false;
        };
        if self.identity.resolve(local_id, record.id) != ResolveOutcome::Bound {
            return false;
        }
        tracing::debug!(
            "matched incoming record {} to open provisional {}",
            record.id,
            local_id
        );
        self.tombstones.rekey(local_id, record.id);
        self.cache.rebind(local_id, record.id, Some(record.created_at));
        true
    }

    /// Apply a send acknowledgment: bind the provisional to its permanent id
    /// and settle the delivery state. Safe against duplicate acknowledgments
    /// and echoes that resolved the identity first. Returns the canonical id.
    pub fn bind_acknowledged(
        &mut self,
        local_id: Uuid,
        permanent_id: Uuid,
        created_at: DateTime<Utc>,
    ) -> Uuid {
        match self.identity.resolve(local_id, permanent_id) {
            ResolveOutcome::Bound => {
                self.tombstones.rekey(local_id, permanent_id);
                self.cache.rebind(local_id, permanent_id, Some(created_at));
                self.cache.update_entry(permanent_id, |m| {
                    m.delivery_state = DeliveryState::Delivered;
                });
                permanent_id
            }
            ResolveOutcome::Duplicate | ResolveOutcome::Unknown => {
                // The realtime echo resolved the identity first, or a retry
                // retired the provisional; settle whatever entry remains.
                let canonical = self.identity.canonical_id(local_id);
                self.cache.update_entry(canonical, |m| {
                    if m.delivery_state == DeliveryState::Pending {
                        m.delivery_state = DeliveryState::Delivered;
                    }
                });
                canonical
            }
            ResolveOutcome::Conflict { previous } => {
                // Last write wins; move the entry under the newer binding.
                self.cache.rebind(previous, permanent_id, Some(created_at));
                self.cache.update_entry(permanent_id, |m| {
                    m.delivery_state = DeliveryState::Delivered;
                });
                permanent_id
            }
        }
    }

    /// Compute the derived view flags for one message
    pub fn flags(&self, id: Uuid) -> Option<MessageFlags> {
        let message = self.cache.get(id)?;
        let tombstone = self.tombstones.state(id);
        Some(MessageFlags {
            tombstoned_deleted: tombstone.map_or(false, |t| t.deleted.is_some()),
            tombstoned_edited: tombstone.map_or(false, |t| t.edited.is_some()),
            pending: message.is_pending(),
            failed: message.is_failed(),
        })
    }
}

/// Shared core of one session: configuration, state lock and change channel
#[derive(Debug)]
pub struct SessionCore {
    pub(crate) conversation: Conversation,
    pub(crate) current_user: Uuid,
    pub(crate) config: EngineConfig,
    pub(crate) state: RwLock<ConversationState>,
    pub(crate) changes: broadcast::Sender<CacheUpdate>,
}

impl SessionCore {
    /// Notify subscribers that the list reached `revision`
    pub(crate) fn publish(&self, revision: u64) {
        let update = CacheUpdate {
            conversation_id: self.conversation.id,
            revision,
        };
        match self.changes.send(update) {
            Ok(subscriber_count) => {
                tracing::debug!(
                    "cache update revision {} sent to {} subscribers",
                    revision,
                    subscriber_count
                );
            }
            Err(_) => {
                // No subscribers, that's okay
                tracing::debug!("cache update revision {} had no subscribers", revision);
            }
        }
    }
}

/// Reconciles one conversation's messages from optimistic writes, history
/// pages and realtime deltas
#[derive(Clone)]
pub struct ConversationSession {
    core: Arc<SessionCore>,
    optimistic: OptimisticAdapter,
    history: HistoryAdapter,
    realtime: RealtimeAdapter,
}

impl ConversationSession {
    /// Open a session for one conversation
    pub fn new(
        conversation: Conversation,
        current_user: Uuid,
        transport: Arc<dyn ChatTransport>,
        config: EngineConfig,
    ) -> Self {
        let (changes, _) = broadcast::channel(config.broadcast_capacity);
        let state = ConversationState::new(&conversation, &config);
        let core = Arc::new(SessionCore {
            conversation,
            current_user,
            config,
            state: RwLock::new(state),
            changes,
        });
        Self {
            optimistic: OptimisticAdapter::new(core.clone(), transport.clone()),
            history: HistoryAdapter::new(core.clone(), transport),
            realtime: RealtimeAdapter::new(core.clone()),
            core,
        }
    }

    /// The conversation this session reconciles
    pub fn conversation(&self) -> &Conversation {
        &self.core.conversation
    }

    /// Send a message. The provisional entry is visible to subscribers
    /// before the network call starts; the future resolves to the permanent
    /// id once the server acknowledges the send.
    pub async fn send_message(&self, content: impl Into<String>) -> Result<Uuid, EngineError> {
        self.optimistic.send(content.into()).await
    }

    /// Retry a failed send. Creates a fresh provisional for the same content
    /// and removes the failed local-only entry.
    pub async fn retry_send(&self, failed_id: Uuid) -> Result<Uuid, EngineError> {
        self.optimistic.retry(failed_id).await
    }

    /// Edit a message. The edit is applied and tombstoned immediately and
    /// reverted if the confirming call fails.
    pub async fn edit_message(
        &self,
        id: Uuid,
        content: impl Into<String>,
    ) -> Result<(), EngineError> {
        self.optimistic.edit(id, content.into()).await
    }

    /// Delete a message (soft delete). The tombstone is recorded before any
    /// network call, so no background source can resurrect the message.
    pub async fn delete_message(&self, id: Uuid) -> Result<(), EngineError> {
        self.optimistic.delete(id).await
    }

    /// Fetch and merge the next history page. Returns the number of records
    /// that changed the list.
    pub async fn load_older(&self) -> Result<usize, EngineError> {
        self.history.load_older().await
    }

    /// Ingest one realtime delta frame. Malformed frames are dropped and
    /// logged; this never fails. Returns whether the list changed.
    pub async fn handle_delta(&self, frame: serde_json::Value) -> bool {
        self.realtime.handle_frame(frame).await
    }

    /// Snapshot of the ordered message list
    pub async fn messages(&self) -> Vec<ChatMessage> {
        self.core.state.read().await.cache.messages().to_vec()
    }

    /// Snapshot of a single message
    pub async fn message(&self, id: Uuid) -> Option<ChatMessage> {
        self.core.state.read().await.cache.get(id).cloned()
    }

    /// Derived view flags for one message
    pub async fn flags(&self, id: Uuid) -> Option<MessageFlags> {
        self.core.state.read().await.flags(id)
    }

    /// Subscribe to cache updates. One notification is sent per ingest that
    /// changes the list, not per record.
    pub fn subscribe(&self) -> broadcast::Receiver<CacheUpdate> {
        self.core.changes.subscribe()
    }

    /// Current pagination cursor
    pub async fn cursor(&self) -> PageCursor {
        self.core.state.read().await.cache.cursor()
    }

    /// Whether the history endpoint reported more pages
    pub async fn has_more_history(&self) -> bool {
        self.core.state.read().await.cache.cursor().has_more
    }

    /// Current cache revision
    pub async fn revision(&self) -> u64 {
        self.core.state.read().await.cache.revision()
    }
}
