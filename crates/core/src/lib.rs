//! # Pincer Core
//!
//! Domain types, traits, and error definitions for the Pincer agent
//! orchestrator. This crate has **zero framework dependencies** — it defines
//! the domain model that all other crates implement against.
//!
//! ## Design Philosophy
//!
//! The seams are defined as traits here (`ChatBackend`, `Tool`).
//! Implementations live in their respective crates. This enables:
//! - Swapping the model backend for a scripted mock in tests
//! - A clean dependency graph (all crates depend inward on core)

pub mod backend;
pub mod error;
pub mod message;
pub mod tool;

// Re-export key types at crate root for ergonomics
pub use backend::{ChatBackend, ChatReply, TokenSink};
pub use error::{BackendError, Error, Result, ToolError};
pub use message::{Message, Role, ToolCall};
pub use tool::{NotifyFn, Tool, ToolContext, ToolSchema, ToolSettings};
