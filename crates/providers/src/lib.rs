//! Generation backend connectors for potager.
//!
//! `OpenAiCompatBackend` talks to any OpenAI-compatible completion
//! endpoint (Ollama, vLLM, OpenRouter, ...) over plain prompts; the
//! free-text tool protocol means no function-calling support is needed
//! from the backend.
//!
//! `ScriptedBackend` is the in-process fake every loop/classifier test
//! is driven with: it replays pre-chunked turns, one per `generate_stream`
//! call.
//!
//! Backends are constructed explicitly and handed to the conversation
//! loop — there is no process-wide lazy client.

pub mod openai_compat;
pub mod scripted;

pub use openai_compat::OpenAiCompatBackend;
pub use scripted::ScriptedBackend;
