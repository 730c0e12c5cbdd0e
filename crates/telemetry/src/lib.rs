//! Interaction tracing for potager.
//!
//! Every completed agent session produces one `InteractionTrace` — who
//! answered, with which model, the full prompt and response, token counts
//! and wall time. Recording is fire-and-forget: the sink keeps a bounded
//! in-memory ring and its failures are logged locally, never surfaced on
//! the response path.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::RwLock;
use tracing::{debug, warn};
use uuid::Uuid;

/// One recorded agent interaction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InteractionTrace {
    pub id: String,
    pub conversation_id: Option<String>,
    pub agent_name: String,
    pub agent_version: String,
    pub model: String,
    /// The initial assembled prompt (not the grown transcript).
    pub prompt: String,
    /// The final user-visible response text.
    pub response: String,
    pub input_tokens: u32,
    pub output_tokens: u32,
    pub turns: usize,
    pub duration_ms: u64,
    pub created_at: DateTime<Utc>,
}

impl InteractionTrace {
    pub fn new(agent_name: impl Into<String>, agent_version: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            conversation_id: None,
            agent_name: agent_name.into(),
            agent_version: agent_version.into(),
            model: String::new(),
            prompt: String::new(),
            response: String::new(),
            input_tokens: 0,
            output_tokens: 0,
            turns: 0,
            duration_ms: 0,
            created_at: Utc::now(),
        }
    }
}

/// Bounded in-memory trace sink.
///
/// Oldest traces are evicted once `capacity` is reached. A poisoned lock
/// means some recording thread panicked; we log and drop the trace rather
/// than propagate — telemetry must never take a session down.
pub struct TraceStore {
    traces: RwLock<VecDeque<InteractionTrace>>,
    capacity: usize,
}

impl TraceStore {
    pub fn new(capacity: usize) -> Self {
        Self {
            traces: RwLock::new(VecDeque::with_capacity(capacity.min(256))),
            capacity: capacity.max(1),
        }
    }

    /// Record a trace. Never fails from the caller's point of view.
    pub fn record(&self, trace: InteractionTrace) {
        match self.traces.write() {
            Ok(mut traces) => {
                debug!(
                    agent = %trace.agent_name,
                    turns = trace.turns,
                    duration_ms = trace.duration_ms,
                    "interaction trace recorded"
                );
                if traces.len() == self.capacity {
                    traces.pop_front();
                }
                traces.push_back(trace);
            }
            Err(e) => {
                warn!("trace store lock poisoned, dropping trace: {e}");
            }
        }
    }

    /// The most recent traces, newest first.
    pub fn recent(&self, limit: usize) -> Vec<InteractionTrace> {
        match self.traces.read() {
            Ok(traces) => traces.iter().rev().take(limit).cloned().collect(),
            Err(e) => {
                warn!("trace store lock poisoned on read: {e}");
                Vec::new()
            }
        }
    }

    pub fn len(&self) -> usize {
        self.traces.read().map(|t| t.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for TraceStore {
    fn default() -> Self {
        Self::new(1_000)
    }
}
