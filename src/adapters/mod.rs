//! # Source Adapters
//!
//! Three symmetric adapters, one per data source. Each adapter's sole job is
//! to translate its transport-specific payload into the canonical message
//! shape and hand it to the cache — failure handling is adapter-local, so a
//! bad page or a malformed frame never takes down ingestion.
//!
//! ## Key Components
//!
//! - `optimistic.rs`: local send/edit/delete flows and the outgoing state
//!   machine
//! - `history.rs`: paginated history fetches, fail-closed record parsing
//! - `realtime.rs`: push delta frames, provisional echo matching

pub mod history;
pub mod optimistic;
pub mod realtime;

// Re-export main types
pub use history::{HistoryAdapter, HistoryRecord};
pub use optimistic::OptimisticAdapter;
pub use realtime::{DeltaFrame, RealtimeAdapter, RealtimeRecord};
