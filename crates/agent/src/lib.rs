//! The conversation loop for potager.
//!
//! A bounded multi-turn tool-calling loop over a plain-text generation
//! backend: the model's stream is classified on the fly into hidden
//! reasoning, visible prose and an embedded tool block; the block is
//! parsed after the turn, the tool runs, and its result is re-prompted
//! for the next turn.
//!
//! - [`prompt`] — deterministic prompt assembly
//! - [`classifier`] — incremental stream classification
//! - [`extractor`] — best-effort tool-call parsing
//! - [`runner`] — the loop driver
//! - [`stream_event`] — the events sent to the transport

pub mod classifier;
pub mod extractor;
pub mod marker;
pub mod prompt;
pub mod runner;
pub mod stream_event;

pub use classifier::{ChunkTag, StreamClassifier, TaggedChunk};
pub use extractor::{ToolCallExtractor, ToolInvocation};
pub use prompt::{DEFAULT_SYSTEM_PROMPT, PromptAssembler};
pub use runner::{AgentRequest, AgentRunner};
pub use stream_event::AgentStreamEvent;
