//! Scripted fake backend for tests.
//!
//! Replays a fixed sequence of turns; each `generate_stream` call pops
//! the next turn and yields its chunks exactly as scripted, which is how
//! classifier boundary conditions (markers split across chunks, fences
//! arriving byte by byte) are reproduced deterministically.

use async_trait::async_trait;
use potager_core::backend::{GenerationBackend, TextChunk, Usage};
use potager_core::error::BackendError;
use std::sync::Mutex;

/// One scripted generation turn: the chunks to stream, in order.
#[derive(Debug, Clone)]
pub struct ScriptedTurn {
    pub chunks: Vec<String>,
    pub usage: Option<Usage>,
}

impl ScriptedTurn {
    /// A turn streamed as a single chunk.
    pub fn whole(text: impl Into<String>) -> Self {
        Self {
            chunks: vec![text.into()],
            usage: Some(Usage {
                prompt_tokens: 10,
                completion_tokens: 5,
                total_tokens: 15,
            }),
        }
    }

    /// A turn streamed in the given pieces.
    pub fn pieces(chunks: &[&str]) -> Self {
        Self {
            chunks: chunks.iter().map(|c| c.to_string()).collect(),
            usage: Some(Usage {
                prompt_tokens: 10,
                completion_tokens: 5,
                total_tokens: 15,
            }),
        }
    }
}

/// A backend that returns scripted turns in sequence.
///
/// Returns `BackendError::EmptyResponse` when the script runs out, which
/// surfaces loudly in a test instead of hanging.
pub struct ScriptedBackend {
    turns: Mutex<std::collections::VecDeque<ScriptedTurn>>,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedBackend {
    pub fn new(turns: Vec<ScriptedTurn>) -> Self {
        Self {
            turns: Mutex::new(turns.into()),
            prompts: Mutex::new(Vec::new()),
        }
    }

    /// Every prompt the loop sent, in order. Lets tests assert on the
    /// re-prompt content (continuation blocks, tool results).
    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }

    pub fn calls(&self) -> usize {
        self.prompts.lock().unwrap().len()
    }

    fn next_turn(&self, prompt: &str) -> Result<ScriptedTurn, BackendError> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        self.turns
            .lock()
            .unwrap()
            .pop_front()
            .ok_or(BackendError::EmptyResponse)
    }
}

#[async_trait]
impl GenerationBackend for ScriptedBackend {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn generate(&self, prompt: &str) -> Result<(String, Option<Usage>), BackendError> {
        let turn = self.next_turn(prompt)?;
        Ok((turn.chunks.concat(), turn.usage))
    }

    async fn generate_stream(
        &self,
        prompt: &str,
    ) -> Result<tokio::sync::mpsc::Receiver<Result<TextChunk, BackendError>>, BackendError> {
        let turn = self.next_turn(prompt)?;
        let (tx, rx) = tokio::sync::mpsc::channel(16);

        tokio::spawn(async move {
            for chunk in turn.chunks {
                if tx
                    .send(Ok(TextChunk {
                        text: chunk,
                        usage: None,
                        done: false,
                    }))
                    .await
                    .is_err()
                {
                    return;
                }
            }
            let _ = tx
                .send(Ok(TextChunk {
                    text: String::new(),
                    usage: turn.usage,
                    done: true,
                }))
                .await;
        });

        Ok(rx)
    }
}
