//! Engine Error Types
//!
//! This module defines the error taxonomy of the reconciliation engine.
//!
//! # Error Categories
//!
//! - `IdentityConflict` - a provisional id was resolved twice inconsistently
//! - `StaleRecord` - an older snapshot arrived after a newer one
//! - `MalformedRecord` - an adapter could not normalize an external payload
//! - `NetworkFailure` - a send/edit/delete/fetch call failed or timed out
//!
//! # Propagation
//!
//! Adapter-level and identity-level errors are recovered locally and never
//! escape `ingest`; only the future of the initiating send/edit/delete/fetch
//! rejects, and only with `NetworkFailure`. Nothing here is fatal.
use thiserror::Error;
use uuid::Uuid;

/// Errors produced by the reconciliation engine
#[derive(Debug, Error, Clone)]
pub enum EngineError {
    /// A provisional id was resolved to two different permanent ids
    #[error("identity conflict for {local_id}: bound to {existing}, re-bound to {incoming}")]
    IdentityConflict {
        /// The provisional id that was resolved twice
        local_id: Uuid,
        /// The permanent id from the first resolution
        existing: Uuid,
        /// The permanent id from the conflicting resolution
        incoming: Uuid,
    },

    /// An incoming record is older than the cached state for the same id
    #[error("stale record for message {id} discarded")]
    StaleRecord {
        /// The message id the stale record carried
        id: Uuid,
    },

    /// An external payload could not be normalized into the canonical shape
    #[error("malformed {adapter} record: {reason}")]
    MalformedRecord {
        /// The adapter that rejected the payload
        adapter: String,
        /// Human-readable parse failure
        reason: String,
    },

    /// A network call backing a local operation failed
    #[error("network failure during {operation}: {reason}")]
    NetworkFailure {
        /// The operation that failed, e.g. "send" or "fetch_history"
        operation: String,
        /// Human-readable failure description
        reason: String,
    },

    /// An operation referenced a message the cache does not hold
    #[error("unknown message {id}")]
    UnknownMessage {
        /// The id that was not found
        id: Uuid,
    },
}

impl EngineError {
    /// Create a new malformed record error
    pub fn malformed(source: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::MalformedRecord {
            adapter: source.into(),
            reason: reason.into(),
        }
    }

    /// Create a new network failure error
    pub fn network(operation: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::NetworkFailure {
            operation: operation.into(),
            reason: reason.into(),
        }
    }
}
