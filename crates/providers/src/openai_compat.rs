//! OpenAI-compatible backend implementation.
//!
//! Works with: OpenAI, OpenRouter, Ollama, vLLM, Together AI, and any
//! endpoint exposing `/chat/completions`. The assembled prompt travels
//! as one user message; tool use rides inside the generated text, so
//! only plain chat completion (non-streaming and streaming SSE) is used.

use async_trait::async_trait;
use futures::StreamExt;
use potager_core::backend::{GenerationBackend, TextChunk, Usage};
use potager_core::error::BackendError;
use serde::Deserialize;
use tracing::{debug, trace, warn};

/// An OpenAI-compatible generation backend.
pub struct OpenAiCompatBackend {
    name: String,
    base_url: String,
    api_key: String,
    model: String,
    temperature: f32,
    client: reqwest::Client,
}

impl OpenAiCompatBackend {
    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        model: impl Into<String>,
        temperature: f32,
    ) -> Self {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(120))
            .build()
            .expect("Failed to create HTTP client");

        Self {
            name: "openai-compat".into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            model: model.into(),
            temperature,
            client,
        }
    }

    /// Create an Ollama backend (convenience constructor).
    pub fn ollama(base_url: Option<&str>, model: impl Into<String>) -> Self {
        Self::new(
            base_url.unwrap_or("http://localhost:11434/v1"),
            "ollama", // Ollama doesn't need a real key
            model,
            0.2,
        )
    }

    fn request_body(&self, prompt: &str, stream: bool) -> serde_json::Value {
        let mut body = serde_json::json!({
            "model": self.model,
            "messages": [{ "role": "user", "content": prompt }],
            "temperature": self.temperature,
            "stream": stream,
        });
        if stream {
            body["stream_options"] = serde_json::json!({ "include_usage": true });
        }
        body
    }

    fn status_error(status: u16, body: String) -> BackendError {
        match status {
            429 => BackendError::RateLimited {
                retry_after_secs: 5,
            },
            401 | 403 => BackendError::AuthenticationFailed(
                "Invalid API key or insufficient permissions".into(),
            ),
            _ => {
                warn!(status, body = %body, "backend returned error");
                BackendError::ApiError {
                    status_code: status,
                    message: body,
                }
            }
        }
    }
}

#[async_trait]
impl GenerationBackend for OpenAiCompatBackend {
    fn name(&self) -> &str {
        &self.name
    }

    async fn generate(&self, prompt: &str) -> Result<(String, Option<Usage>), BackendError> {
        let url = format!("{}/chat/completions", self.base_url);
        debug!(backend = %self.name, model = %self.model, "sending completion request");

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&self.request_body(prompt, false))
            .send()
            .await
            .map_err(|e| BackendError::Network(e.to_string()))?;

        let status = response.status().as_u16();
        if status != 200 {
            let body = response.text().await.unwrap_or_default();
            return Err(Self::status_error(status, body));
        }

        let api_response: ApiResponse =
            response.json().await.map_err(|e| BackendError::ApiError {
                status_code: 200,
                message: format!("Failed to parse response: {e}"),
            })?;

        let choice = api_response
            .choices
            .into_iter()
            .next()
            .ok_or(BackendError::EmptyResponse)?;

        let usage = api_response.usage.map(|u| Usage {
            prompt_tokens: u.prompt_tokens,
            completion_tokens: u.completion_tokens,
            total_tokens: u.total_tokens,
        });

        Ok((choice.message.content.unwrap_or_default(), usage))
    }

    async fn generate_stream(
        &self,
        prompt: &str,
    ) -> Result<tokio::sync::mpsc::Receiver<Result<TextChunk, BackendError>>, BackendError> {
        let url = format!("{}/chat/completions", self.base_url);
        debug!(backend = %self.name, model = %self.model, "sending streaming request");

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .header("Accept", "text/event-stream")
            .json(&self.request_body(prompt, true))
            .send()
            .await
            .map_err(|e| BackendError::Network(e.to_string()))?;

        let status = response.status().as_u16();
        if status != 200 {
            let body = response.text().await.unwrap_or_default();
            return Err(Self::status_error(status, body));
        }

        let (tx, rx) = tokio::sync::mpsc::channel(64);
        let backend_name = self.name.clone();

        // Read the SSE byte stream and forward parsed text deltas.
        tokio::spawn(async move {
            let mut byte_stream = response.bytes_stream();
            let mut buffer = String::new();

            while let Some(chunk_result) = byte_stream.next().await {
                let bytes = match chunk_result {
                    Ok(b) => b,
                    Err(e) => {
                        let _ = tx
                            .send(Err(BackendError::StreamInterrupted(e.to_string())))
                            .await;
                        return;
                    }
                };

                buffer.push_str(&String::from_utf8_lossy(&bytes));

                // Process complete lines
                while let Some(line_end) = buffer.find('\n') {
                    let line = buffer[..line_end].trim_end_matches('\r').to_string();
                    buffer = buffer[line_end + 1..].to_string();

                    // Skip empty lines and SSE comments
                    if line.is_empty() || line.starts_with(':') {
                        continue;
                    }

                    let Some(data) = line.strip_prefix("data: ") else {
                        continue;
                    };
                    let data = data.trim();

                    if data == "[DONE]" {
                        let _ = tx
                            .send(Ok(TextChunk {
                                text: String::new(),
                                usage: None,
                                done: true,
                            }))
                            .await;
                        return;
                    }

                    match serde_json::from_str::<StreamResponse>(data) {
                        Ok(stream_resp) => {
                            if let Some(choice) = stream_resp.choices.first()
                                && let Some(content) = &choice.delta.content
                                && !content.is_empty()
                            {
                                let chunk = TextChunk {
                                    text: content.clone(),
                                    usage: None,
                                    done: false,
                                };
                                if tx.send(Ok(chunk)).await.is_err() {
                                    return; // receiver dropped, stop pulling
                                }
                            }

                            // Usage arrives on a trailing chunk with stream_options
                            if let Some(usage) = stream_resp.usage {
                                let chunk = TextChunk {
                                    text: String::new(),
                                    usage: Some(Usage {
                                        prompt_tokens: usage.prompt_tokens,
                                        completion_tokens: usage.completion_tokens,
                                        total_tokens: usage.total_tokens,
                                    }),
                                    done: true,
                                };
                                let _ = tx.send(Ok(chunk)).await;
                                return;
                            }
                        }
                        Err(e) => {
                            trace!(
                                backend = %backend_name,
                                data = %data,
                                error = %e,
                                "ignoring unparseable SSE chunk"
                            );
                        }
                    }
                }
            }
        });

        Ok(rx)
    }

    async fn health_check(&self) -> Result<bool, BackendError> {
        let url = format!("{}/models", self.base_url);
        let response = self
            .client
            .get(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .send()
            .await
            .map_err(|e| BackendError::Network(e.to_string()))?;

        Ok(response.status().is_success())
    }
}

// ── API wire types ────────────────────────────────────────────────────────

#[derive(Deserialize)]
struct ApiResponse {
    choices: Vec<ApiChoice>,
    usage: Option<ApiUsage>,
}

#[derive(Deserialize)]
struct ApiChoice {
    message: ApiMessage,
}

#[derive(Deserialize)]
struct ApiMessage {
    content: Option<String>,
}

#[derive(Deserialize)]
struct ApiUsage {
    prompt_tokens: u32,
    completion_tokens: u32,
    total_tokens: u32,
}

#[derive(Deserialize)]
struct StreamResponse {
    #[serde(default)]
    choices: Vec<StreamChoice>,
    usage: Option<ApiUsage>,
}

#[derive(Deserialize)]
struct StreamChoice {
    delta: StreamDelta,
}

#[derive(Deserialize, Default)]
struct StreamDelta {
    content: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_url_trailing_slash_trimmed() {
        let backend = OpenAiCompatBackend::new("http://localhost:11434/v1/", "k", "mistral", 0.2);
        assert_eq!(backend.base_url, "http://localhost:11434/v1");
    }

    #[test]
    fn stream_body_requests_usage() {
        let backend = OpenAiCompatBackend::ollama(None, "mistral");
        let body = backend.request_body("Bonjour", true);
        assert_eq!(body["stream"], true);
        assert_eq!(body["stream_options"]["include_usage"], true);
        assert_eq!(body["messages"][0]["content"], "Bonjour");
    }

    #[test]
    fn status_mapping() {
        assert!(matches!(
            OpenAiCompatBackend::status_error(429, String::new()),
            BackendError::RateLimited { .. }
        ));
        assert!(matches!(
            OpenAiCompatBackend::status_error(401, String::new()),
            BackendError::AuthenticationFailed(_)
        ));
        assert!(matches!(
            OpenAiCompatBackend::status_error(500, "boom".into()),
            BackendError::ApiError {
                status_code: 500,
                ..
            }
        ));
    }

    #[test]
    fn stream_response_parses_delta() {
        let data = r#"{"choices":[{"delta":{"content":"PENS"}}]}"#;
        let resp: StreamResponse = serde_json::from_str(data).unwrap();
        assert_eq!(resp.choices[0].delta.content.as_deref(), Some("PENS"));
    }
}
