//! Events emitted by the conversation loop, in arrival order.

use serde::{Deserialize, Serialize};

/// One record of the newline-delimited stream sent to the client.
///
/// `Done` is internal bookkeeping: the transport turns it into the
/// terminal empty marker instead of serializing it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AgentStreamEvent {
    /// A fragment of hidden reasoning (shown dimmed or collapsed).
    ThoughtToken { content: String },

    /// A fragment of the user-visible reply.
    MessageToken { content: String },

    /// A tool is about to run.
    StepStart {
        tool: String,
        args: serde_json::Value,
    },

    /// The tool finished; `result` is the serialized outcome.
    StepEnd {
        tool: String,
        /// Wall-clock milliseconds spent in the tool.
        duration: u64,
        result: String,
    },

    /// Terminal failure notice (generation failed).
    Error { message: String },

    /// The loop finished; carries final accounting.
    Done {
        conversation_id: String,
        turns: usize,
    },
}

impl AgentStreamEvent {
    /// Whether this event ends the stream.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Error { .. } | Self::Done { .. })
    }
}
