//! XFChat - Conversation Message Reconciliation Engine
//!
//! XFChat maintains, per conversation, a single consistent ordered list of
//! messages built from three independently-arriving, non-ordered,
//! non-idempotent sources: optimistic local writes, paginated history reads
//! and an asynchronous push stream of realtime deltas.
//!
//! # Overview
//!
//! The hard part of a chat client is not talking to the server — it is that
//! three sources race each other for the same message list. This library
//! resolves identity between client-generated provisional ids and
//! server-assigned permanent ids, preserves user intent across races (a
//! background refetch can never undo a delete or edit the user just
//! performed), and guarantees at most one authoritative state per message.
//!
//! # Module Structure
//!
//! - **`shared`** - Canonical, transport-independent types
//!   - Message and conversation structures
//!   - Engine error taxonomy and configuration
//!
//! - **`engine`** - The reconciliation core
//!   - Identity Resolver, Tombstone Store, Merge Engine
//!   - Conversation Cache and the per-conversation session object
//!
//! - **`adapters`** - The three symmetric source adapters
//!   - Optimistic local actions, paginated history, realtime deltas
//!   - Each declares the exact external schema it accepts and fails closed
//!
//! - **`transport`** - The narrow outward interface
//!   - `ChatTransport` trait consumed by the engine
//!   - `RestTransport`, the reqwest-backed production implementation
//!
//! # Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use uuid::Uuid;
//! use xfchat::engine::ConversationSession;
//! use xfchat::shared::{Conversation, EngineConfig};
//! use xfchat::transport::rest::RestTransport;
//!
//! # async fn example() -> Result<(), xfchat::shared::EngineError> {
//! let transport = Arc::new(RestTransport::new("http://127.0.0.1:3000").with_token("jwt"));
//! let conversation = Conversation::group(Uuid::new_v4(), "Team");
//! let session = ConversationSession::new(
//!     conversation,
//!     Uuid::new_v4(),
//!     transport,
//!     EngineConfig::default(),
//! );
//!
//! let _updates = session.subscribe();
//! session.load_older().await?;
//! session.send_message("hello").await?;
//! let messages = session.messages().await;
//! # Ok(())
//! # }
//! ```
//!
//! # Concurrency
//!
//! Each conversation has a single owner: its [`engine::ConversationSession`].
//! All mutation for one conversation is serialized behind one lock, while
//! distinct conversations proceed independently. Network calls never hold
//! the lock; optimistic state is applied immediately and reconciled when the
//! call completes.
//!
//! # Error Handling
//!
//! The library uses Rust's standard error handling:
//!
//! - `Result<T, E>` for fallible operations
//! - Recovered-locally errors (stale records, malformed payloads, duplicate
//!   acknowledgments) are logged, never thrown out of ingestion
//! - Only the future of an initiating send/edit/delete/fetch rejects, with
//!   [`shared::EngineError::NetworkFailure`]

/// Canonical shared types
pub mod shared;

/// The reconciliation engine core
pub mod engine;

/// Source adapters for the three data sources
pub mod adapters;

/// The outward transport boundary
pub mod transport;

// Re-export the main entry points
pub use engine::{CacheUpdate, ConversationSession, MessageFlags};
pub use shared::{ChatMessage, Conversation, ConversationKind, DeliveryState, EngineConfig, EngineError};
pub use transport::ChatTransport;
