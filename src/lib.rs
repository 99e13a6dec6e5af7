//! Loan Underwriting Orchestrator
//!
//! Builds a structured loan risk profile from uploaded financial documents
//! and answers follow-up questions grounded in the same file:
//! - Encodes PDF and image documents for inline transport
//! - Delegates all interpretation to the Gemini multimodal API
//! - Constrains extraction output to a declarative profile schema
//! - Replays full history and re-attaches documents on every chat turn
//! - Surfaces every failure to the caller; nothing is retried or defaulted
//!
//! FLOW:
//! ENCODE → ANALYZE → PROFILE → ASK → ASK → ...

pub mod api;
pub mod config;
pub mod conversation;
pub mod encoder;
pub mod error;
pub mod extraction;
pub mod gemini;
pub mod models;
pub mod schema;

pub use error::Result;

// Re-export common types
pub use models::*;
pub use conversation::ConversationLog;
