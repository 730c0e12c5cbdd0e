//! GenerationBackend trait — the abstraction over text-generation services.
//!
//! The conversation loop drives a backend through two calls: a blocking
//! `generate` returning the full text, and a streaming `generate_stream`
//! returning incremental chunks. The contract is deliberately plain
//! text in / plain text out: tool calls travel *inside* the generated
//! text (fenced JSON blocks) and are recovered downstream by the
//! extractor, so the loop works against backends with no native
//! function-calling channel.
//!
//! Backends are constructed explicitly and injected — there is no lazy
//! process-wide client. Tests substitute a scripted fake.

use crate::error::BackendError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Token usage statistics, when the backend reports them.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct Usage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

impl Usage {
    /// Accumulate another usage report into this one.
    pub fn absorb(&mut self, other: Usage) {
        self.prompt_tokens += other.prompt_tokens;
        self.completion_tokens += other.completion_tokens;
        self.total_tokens += other.total_tokens;
    }
}

/// A single chunk in a streaming generation.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TextChunk {
    /// Partial text delta. May be empty on usage-only chunks.
    #[serde(default)]
    pub text: String,

    /// Usage info (typically only on the final chunk).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage: Option<Usage>,

    /// Whether this is the final chunk.
    #[serde(default)]
    pub done: bool,
}

/// The core generation trait.
///
/// The conversation loop calls `generate_stream` per turn without knowing
/// which backend is behind it — pure polymorphism.
#[async_trait]
pub trait GenerationBackend: Send + Sync {
    /// A human-readable name for this backend (e.g., "openai-compat").
    fn name(&self) -> &str;

    /// Send a prompt and get the complete generated text plus usage.
    async fn generate(&self, prompt: &str) -> Result<(String, Option<Usage>), BackendError>;

    /// Send a prompt and get a stream of text chunks.
    ///
    /// Default implementation calls `generate` and wraps the result as a
    /// single chunk, so simple backends only implement one method.
    async fn generate_stream(
        &self,
        prompt: &str,
    ) -> Result<tokio::sync::mpsc::Receiver<Result<TextChunk, BackendError>>, BackendError> {
        let (text, usage) = self.generate(prompt).await?;
        let (tx, rx) = tokio::sync::mpsc::channel(1);
        let _ = tx
            .send(Ok(TextChunk {
                text,
                usage,
                done: true,
            }))
            .await;
        Ok(rx)
    }

    /// Health check — can we reach the backend?
    async fn health_check(&self) -> Result<bool, BackendError> {
        Ok(true)
    }
}
