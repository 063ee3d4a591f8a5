//! # Identity Resolver
//!
//! Maps client-generated provisional message ids to server-assigned permanent
//! ids. A send is registered here the moment it is created; once the server
//! acknowledges it (or its realtime echo arrives first) the provisional id is
//! retired and every later reference goes through the permanent id.
//!
//! ## Echo matching
//!
//! Push delivery of "my own message" can race ahead of the send
//! acknowledgment. Such records know nothing of the local provisional id, so
//! [`IdentityResolver::match_incoming`] matches them heuristically against
//! still-open provisionals: same sender, equal content, and timestamps within
//! a bounded window. When several open provisionals qualify, the earliest
//! registration wins — a deterministic tie-break for simultaneous identical
//! sends.

use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use uuid::Uuid;

use crate::shared::message::ChatMessage;

/// Handle returned when a send registers its provisional id
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProvisionalHandle {
    /// The client-generated provisional id
    pub local_id: Uuid,
    /// Registration order, used for deterministic echo tie-breaks
    pub sequence: u64,
}

/// An open (not yet resolved) provisional send
#[derive(Debug, Clone)]
struct OpenProvisional {
    sender_id: Uuid,
    content: String,
    client_timestamp: DateTime<Utc>,
    sequence: u64,
}

/// Outcome of a resolution attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolveOutcome {
    /// First resolution; the provisional id is now retired
    Bound,
    /// The same binding was announced again (duplicate acknowledgment)
    Duplicate,
    /// The provisional was already bound to a different permanent id;
    /// last write wins and the previous binding is returned
    Conflict {
        /// The permanent id from the earlier resolution
        previous: Uuid,
    },
    /// The local id was never registered
    Unknown,
}

/// Resolves provisional ids to permanent ids
#[derive(Debug)]
pub struct IdentityResolver {
    /// Still-open provisionals, keyed by local id
    open: HashMap<Uuid, OpenProvisional>,
    /// Retired bindings, kept for duplicate-acknowledgment detection
    resolved: HashMap<Uuid, Uuid>,
    /// Monotonic registration counter
    next_sequence: u64,
    /// Echo match window
    match_window: Duration,
}

impl IdentityResolver {
    /// Create a resolver with the given echo match window
    pub fn new(match_window: std::time::Duration) -> Self {
        Self {
            open: HashMap::new(),
            resolved: HashMap::new(),
            next_sequence: 0,
            match_window: Duration::from_std(match_window).unwrap_or_else(|_| Duration::seconds(10)),
        }
    }

    /// Register a provisional send. The message must still carry its
    /// provisional id as its cache key.
    pub fn register_provisional(&mut self, message: &ChatMessage) -> ProvisionalHandle {
        let sequence = self.next_sequence;
        self.next_sequence += 1;
        self.open.insert(
            message.id,
            OpenProvisional {
                sender_id: message.sender_id,
                content: message.content.clone(),
                client_timestamp: message.created_at,
                sequence,
            },
        );
        ProvisionalHandle {
            local_id: message.id,
            sequence,
        }
    }

    /// Whether an id is a still-open provisional
    pub fn is_provisional(&self, id: Uuid) -> bool {
        self.open.contains_key(&id)
    }

    /// The canonical id for `id`: the permanent binding if one exists,
    /// otherwise `id` itself.
    pub fn canonical_id(&self, id: Uuid) -> Uuid {
        self.resolved.get(&id).copied().unwrap_or(id)
    }

    /// Bind a provisional id to its server-assigned permanent id.
    ///
    /// Unknown local ids and duplicate acknowledgments are warnings, not
    /// failures; an inconsistent second resolution logs an identity conflict
    /// and the newer binding wins.
    pub fn resolve(&mut self, local_id: Uuid, permanent_id: Uuid) -> ResolveOutcome {
        if self.open.remove(&local_id).is_some() {
            self.resolved.insert(local_id, permanent_id);
            return ResolveOutcome::Bound;
        }
        match self.resolved.get(&local_id).copied() {
            Some(existing) if existing == permanent_id => {
                tracing::warn!(
                    "duplicate acknowledgment for provisional {} -> {}",
                    local_id,
                    permanent_id
                );
                ResolveOutcome::Duplicate
            }
            Some(existing) => {
                tracing::warn!(
                    "identity conflict for provisional {}: bound to {}, re-bound to {}",
                    local_id,
                    existing,
                    permanent_id
                );
                self.resolved.insert(local_id, permanent_id);
                ResolveOutcome::Conflict { previous: existing }
            }
            None => {
                tracing::warn!("resolve for unknown provisional {} ignored", local_id);
                ResolveOutcome::Unknown
            }
        }
    }

    /// Retire a provisional without binding it (a failed send superseded by
    /// an explicit retry). Returns whether it was open.
    pub fn retire(&mut self, local_id: Uuid) -> bool {
        self.open.remove(&local_id).is_some()
    }

    /// Heuristically match an incoming record against open provisionals.
    ///
    /// A candidate matches when the sender is identical, the content is
    /// equal, and the timestamps lie within the match window. Ties go to the
    /// earliest registration.
    pub fn match_incoming(&self, candidate: &ChatMessage) -> Option<Uuid> {
        self.open
            .iter()
            .filter(|(_, open)| {
                open.sender_id == candidate.sender_id
                    && open.content == candidate.content
                    && (candidate.created_at - open.client_timestamp).abs() <= self.match_window
            })
            .min_by_key(|(_, open)| open.sequence)
            .map(|(local_id, _)| *local_id)
    }

    /// Number of still-open provisionals
    pub fn open_count(&self) -> usize {
        self.open.len()
    }
}
