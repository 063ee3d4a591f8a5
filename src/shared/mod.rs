//! Shared Module
//!
//! This module contains the canonical types of the reconciliation engine.
//! Everything here is transport-independent: source adapters normalize their
//! external payloads into these shapes before any merge happens.

/// Canonical message data structure
pub mod message;

/// Conversation descriptor
pub mod conversation;

/// Engine error taxonomy
pub mod error;

/// Engine configuration
pub mod config;

/// Re-export commonly used types for convenience
pub use config::{ConfigError, EngineConfig, EngineConfigBuilder};
pub use conversation::Conversation;
pub use error::EngineError;
pub use message::{Attachment, ChatMessage, ConversationKind, DeliveryState};
