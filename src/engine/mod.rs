//! # Reconciliation Engine
//!
//! Maintains, per conversation, a single consistent ordered message list
//! built from three independently-arriving, non-ordered sources: optimistic
//! local writes, paginated history reads and realtime push deltas.
//!
//! ## Architecture
//!
//! - **Identity Resolver**: binds client-generated provisional ids to
//!   server-assigned permanent ids, including heuristic matching of a
//!   message's own realtime echo.
//! - **Tombstone Store**: records local edit/delete intent so background
//!   data can never silently revert it.
//! - **Merge Engine**: tombstone-dominant precedence rules producing the
//!   next consistent list from any batch.
//! - **Conversation Cache**: the ordered list and pagination cursor, the
//!   only state surface consumers read.
//! - **Conversation Session**: the per-conversation owner object wiring the
//!   pieces to the three source adapters.

pub mod cache;
pub mod identity;
pub mod merge;
pub mod session;
pub mod tombstone;

// Re-export main types
pub use cache::{CacheUpdate, ConversationCache, PageCursor};
pub use identity::{IdentityResolver, ProvisionalHandle, ResolveOutcome};
pub use merge::{merge_batch, MergeReport, RecordSource};
pub use session::{ConversationSession, ConversationState, MessageFlags};
pub use tombstone::{TombstoneState, TombstoneStore};
