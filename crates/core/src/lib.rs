//! # Potager Core
//!
//! Domain types, traits, and error definitions for the potager garden
//! assistant. This crate has **zero framework dependencies** — it defines
//! the domain model that all other crates implement against.
//!
//! ## Design Philosophy
//!
//! Every subsystem is defined as a trait here. Implementations live in
//! their respective crates:
//! - `GenerationBackend` — text generation (blocking + streaming), see
//!   `potager-providers`
//! - `Tool` / `ToolRegistry` — garden actions, see `potager-tools`
//!
//! All crates depend inward on core, which keeps the dependency graph
//! clean and makes every seam substitutable with a fake in tests.

pub mod backend;
pub mod error;
pub mod message;
pub mod tool;

// Re-export key types at crate root for ergonomics
pub use backend::{GenerationBackend, TextChunk, Usage};
pub use error::{BackendError, Error, Result, ToolError};
pub use message::{ConversationId, HistoryMessage, Segment, SegmentKind};
pub use tool::{Tool, ToolOutcome, ToolRegistry, ToolSchema};
