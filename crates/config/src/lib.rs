//! Configuration loading and validation for potager.
//!
//! Loads configuration from a TOML file (default `potager.toml`) with
//! environment variable overrides. Validates settings at startup.

use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// The root configuration structure.
#[derive(Clone, Serialize, Deserialize, Default)]
pub struct AppConfig {
    /// Generation backend settings
    #[serde(default)]
    pub backend: BackendConfig,

    /// Agent behavior settings
    #[serde(default)]
    pub agent: AgentConfig,

    /// HTTP gateway settings
    #[serde(default)]
    pub gateway: GatewayConfig,
}

/// Settings for the text-generation backend connector.
#[derive(Clone, Serialize, Deserialize)]
pub struct BackendConfig {
    /// Base URL of an OpenAI-compatible endpoint
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// API key (overridable via POTAGER_API_KEY)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Model name requested from the backend
    #[serde(default = "default_model")]
    pub model: String,

    /// Sampling temperature. Low by default: the free-text tool protocol
    /// needs faithful instruction following.
    #[serde(default = "default_temperature")]
    pub temperature: f32,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            api_key: None,
            model: default_model(),
            temperature: default_temperature(),
        }
    }
}

fn default_base_url() -> String {
    "http://localhost:11434/v1".into()
}
fn default_model() -> String {
    "mistral".into()
}
fn default_temperature() -> f32 {
    0.2
}

/// Settings for the conversation loop and stream classifier.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AgentConfig {
    /// Display name of the agent (used in traces)
    #[serde(default = "default_agent_name")]
    pub name: String,

    /// Agent version tag (used in traces)
    #[serde(default = "default_agent_version")]
    pub version: String,

    /// Hard bound on generation/tool turns per request
    #[serde(default = "default_max_turns")]
    pub max_turns: usize,

    /// Inject the confirmation-gate instruction before mutating actions.
    /// Prompt-level only — not programmatically enforced.
    #[serde(default)]
    pub safety_confirmation: bool,

    /// Marker the model opens its hidden reasoning with
    #[serde(default = "default_thought_marker")]
    pub thought_marker: String,

    /// Marker the model switches to its user-visible reply with
    #[serde(default = "default_answer_marker")]
    pub answer_marker: String,

    /// Opening marker of an embedded tool block
    #[serde(default = "default_tool_block_marker")]
    pub tool_block_marker: String,

    /// Override for the built-in system instructions
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_prompt: Option<String>,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            name: default_agent_name(),
            version: default_agent_version(),
            max_turns: default_max_turns(),
            safety_confirmation: false,
            thought_marker: default_thought_marker(),
            answer_marker: default_answer_marker(),
            tool_block_marker: default_tool_block_marker(),
            system_prompt: None,
        }
    }
}

fn default_agent_name() -> String {
    "Chef de Culture".into()
}
fn default_agent_version() -> String {
    "1.0".into()
}
fn default_max_turns() -> usize {
    5
}
fn default_thought_marker() -> String {
    "PENSÉE".into()
}
fn default_answer_marker() -> String {
    "RÉPONSE".into()
}
fn default_tool_block_marker() -> String {
    "```json".into()
}

/// HTTP gateway settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    /// Origin allowed by CORS (the web frontend)
    #[serde(default = "default_allowed_origin")]
    pub allowed_origin: String,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            allowed_origin: default_allowed_origin(),
        }
    }
}

fn default_host() -> String {
    "127.0.0.1".into()
}
fn default_port() -> u16 {
    8000
}
fn default_allowed_origin() -> String {
    "http://localhost:5173".into()
}

// Never print the API key.
impl std::fmt::Debug for BackendConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BackendConfig")
            .field("base_url", &self.base_url)
            .field(
                "api_key",
                &self.api_key.as_ref().map(|_| "[REDACTED]"),
            )
            .field("model", &self.model)
            .field("temperature", &self.temperature)
            .finish()
    }
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("backend", &self.backend)
            .field("agent", &self.agent)
            .field("gateway", &self.gateway)
            .finish()
    }
}

impl AppConfig {
    /// Load configuration: file (if it exists) → env overrides → validate.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let path = path.unwrap_or_else(|| Path::new("potager.toml"));

        let mut config = if path.exists() {
            let raw = std::fs::read_to_string(path)?;
            toml::from_str(&raw)?
        } else {
            tracing::debug!(path = %path.display(), "no config file, using defaults");
            Self::default()
        };

        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Apply `POTAGER_*` environment variable overrides.
    fn apply_env_overrides(&mut self) {
        if let Ok(v) = std::env::var("POTAGER_API_KEY") {
            self.backend.api_key = Some(v);
        }
        if let Ok(v) = std::env::var("POTAGER_BASE_URL") {
            self.backend.base_url = v;
        }
        if let Ok(v) = std::env::var("POTAGER_MODEL") {
            self.backend.model = v;
        }
        if let Ok(v) = std::env::var("POTAGER_PORT")
            && let Ok(port) = v.parse()
        {
            self.gateway.port = port;
        }
    }

    /// Validate settings that would otherwise fail deep inside a request.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.agent.max_turns == 0 {
            return Err(ConfigError::Invalid(
                "agent.max_turns must be at least 1".into(),
            ));
        }
        if self.agent.thought_marker.trim().is_empty()
            || self.agent.answer_marker.trim().is_empty()
        {
            return Err(ConfigError::Invalid(
                "agent markers must not be empty".into(),
            ));
        }
        if self.agent.tool_block_marker.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "agent.tool_block_marker must not be empty".into(),
            ));
        }
        if !(0.0..=2.0).contains(&self.backend.temperature) {
            return Err(ConfigError::Invalid(
                "backend.temperature must be within [0, 2]".into(),
            ));
        }
        Ok(())
    }
}
