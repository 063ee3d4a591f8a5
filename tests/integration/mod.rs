//! Integration tests
//!
//! Engine tests drive a full `ConversationSession` against a scripted
//! transport; transport tests drive `RestTransport` against a mock server.

pub mod transport;
