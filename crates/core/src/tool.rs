//! Tool trait — the abstraction over garden actions.
//!
//! Tools are what give the assistant the ability to act on the garden:
//! search the referentiel, create a culture subject, log an event, list
//! the inventory or the journal. Side effects live in the tools; the
//! conversation loop only dispatches.

use crate::error::ToolError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A tool's declaration, surfaced to the model inside the prompt so it
/// can compose calls.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolSchema {
    /// The tool name
    pub name: String,

    /// Description of what the tool does
    pub description: String,

    /// JSON Schema describing the tool's parameters
    pub parameters: serde_json::Value,
}

/// The outcome of executing one tool invocation.
///
/// A failed execution is still an `Ok` value from the loop's point of
/// view: `success` is false and `error` carries the reason, and the whole
/// thing is serialized back into the transcript so the model can retry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolOutcome {
    /// Whether the tool executed successfully
    pub success: bool,

    /// The result payload (any serializable value)
    pub payload: serde_json::Value,

    /// Error description when `success` is false
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ToolOutcome {
    pub fn ok(payload: serde_json::Value) -> Self {
        Self {
            success: true,
            payload,
            error: None,
        }
    }

    pub fn err(message: impl Into<String>) -> Self {
        let message = message.into();
        Self {
            success: false,
            payload: serde_json::json!({ "error": message }),
            error: Some(message),
        }
    }
}

/// The core Tool trait.
///
/// Each garden tool implements this trait and is registered in the
/// `ToolRegistry`, which the conversation loop dispatches through.
#[async_trait]
pub trait Tool: Send + Sync {
    /// The unique name of this tool (e.g., "search_garden").
    fn name(&self) -> &str;

    /// A description of what this tool does (surfaced to the model).
    fn description(&self) -> &str;

    /// JSON Schema describing this tool's parameters.
    fn parameters_schema(&self) -> serde_json::Value;

    /// Execute the tool with the given arguments.
    async fn execute(&self, arguments: serde_json::Value) -> Result<ToolOutcome, ToolError>;

    /// Convert this tool into a schema for prompt assembly.
    fn to_schema(&self) -> ToolSchema {
        ToolSchema {
            name: self.name().to_string(),
            description: self.description().to_string(),
            parameters: self.parameters_schema(),
        }
    }
}

/// A registry of available tools.
///
/// The conversation loop uses this to:
/// 1. Get tool schemas to inject into the prompt
/// 2. Look up and execute exactly one invocation per turn
///
/// `dispatch` never panics and never lets a tool failure escape: unknown
/// names and execution errors both come back as error `ToolOutcome`s.
pub struct ToolRegistry {
    // BTreeMap keeps prompt listings in a stable order.
    tools: BTreeMap<String, Box<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self {
            tools: BTreeMap::new(),
        }
    }

    /// Register a tool. Replaces any existing tool with the same name.
    pub fn register(&mut self, tool: Box<dyn Tool>) {
        let name = tool.name().to_string();
        self.tools.insert(name, tool);
    }

    /// Get a tool by name.
    pub fn get(&self, name: &str) -> Option<&dyn Tool> {
        self.tools.get(name).map(|t| t.as_ref())
    }

    /// Get all tool schemas (for prompt assembly).
    pub fn schemas(&self) -> Vec<ToolSchema> {
        self.tools.values().map(|t| t.to_schema()).collect()
    }

    /// List all registered tool names.
    pub fn names(&self) -> Vec<&str> {
        self.tools.keys().map(|s| s.as_str()).collect()
    }

    /// Execute one invocation, converting every failure mode into an
    /// error outcome. The session must never abort because a tool did.
    pub async fn dispatch(&self, name: &str, arguments: serde_json::Value) -> ToolOutcome {
        let Some(tool) = self.tools.get(name) else {
            return ToolOutcome::err(format!("Tool '{name}' not found"));
        };

        match tool.execute(arguments).await {
            Ok(outcome) => outcome,
            Err(e) => ToolOutcome::err(e.to_string()),
        }
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct EchoTool;

    #[async_trait]
    impl Tool for EchoTool {
        fn name(&self) -> &str {
            "echo"
        }
        fn description(&self) -> &str {
            "Echoes back the input"
        }
        fn parameters_schema(&self) -> serde_json::Value {
            serde_json::json!({
                "type": "object",
                "properties": {
                    "text": { "type": "string" }
                },
                "required": ["text"]
            })
        }
        async fn execute(&self, arguments: serde_json::Value) -> Result<ToolOutcome, ToolError> {
            let text = arguments["text"]
                .as_str()
                .ok_or_else(|| ToolError::InvalidArguments("Missing 'text' argument".into()))?;
            Ok(ToolOutcome::ok(serde_json::json!({ "echo": text })))
        }
    }

    #[test]
    fn registry_register_and_lookup() {
        let mut registry = ToolRegistry::new();
        registry.register(Box::new(EchoTool));
        assert!(registry.get("echo").is_some());
        assert!(registry.get("nonexistent").is_none());
    }

    #[test]
    fn registry_schemas() {
        let mut registry = ToolRegistry::new();
        registry.register(Box::new(EchoTool));
        let schemas = registry.schemas();
        assert_eq!(schemas.len(), 1);
        assert_eq!(schemas[0].name, "echo");
    }

    #[tokio::test]
    async fn dispatch_success() {
        let mut registry = ToolRegistry::new();
        registry.register(Box::new(EchoTool));

        let outcome = registry
            .dispatch("echo", serde_json::json!({"text": "salut"}))
            .await;
        assert!(outcome.success);
        assert_eq!(outcome.payload["echo"], "salut");
    }

    #[tokio::test]
    async fn dispatch_unknown_tool_is_error_outcome() {
        let registry = ToolRegistry::new();
        let outcome = registry.dispatch("nonexistent", serde_json::json!({})).await;
        assert!(!outcome.success);
        assert!(outcome.error.as_deref().unwrap().contains("not found"));
    }

    #[tokio::test]
    async fn dispatch_bad_arguments_is_error_outcome() {
        let mut registry = ToolRegistry::new();
        registry.register(Box::new(EchoTool));

        let outcome = registry.dispatch("echo", serde_json::json!({})).await;
        assert!(!outcome.success);
        assert!(outcome.error.as_deref().unwrap().contains("text"));
    }
}
