//! Tool trait and per-call context — the abstraction over agent capabilities.
//!
//! Tools are what give the agent the ability to act in the world: execute
//! shell commands, read/write files, search the web, etc. A tool is a name,
//! a JSON-schema parameter description, and a string-returning execute
//! function; the registry in `pincer-tools` owns dispatch, truncation, and
//! error conversion.

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::ToolError;

/// Callback used by tools to push a message to the user out of band
/// (e.g. progress from a scheduled task).
pub type NotifyFn = dyn Fn(&str) + Send + Sync;

/// A tool definition sent to the model so it knows what it can call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolSchema {
    /// Unique name within a registry
    pub name: String,

    /// Description of what the tool does
    pub description: String,

    /// JSON Schema describing the tool's parameters
    pub parameters: serde_json::Value,
}

/// Configuration values tools may consult, mapped from the app config.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolSettings {
    /// Brave Search API key ("" = unconfigured)
    #[serde(default)]
    pub web_search_api_key: String,

    /// Default number of web search results
    #[serde(default = "default_search_results")]
    pub web_search_max_results: usize,

    /// Default shell wall-clock cap in seconds
    #[serde(default = "default_shell_timeout")]
    pub shell_timeout_secs: u64,
}

fn default_search_results() -> usize {
    5
}
fn default_shell_timeout() -> u64 {
    30
}

impl Default for ToolSettings {
    fn default() -> Self {
        Self {
            web_search_api_key: String::new(),
            web_search_max_results: default_search_results(),
            shell_timeout_secs: default_shell_timeout(),
        }
    }
}

/// Per-call read-only bundle handed to every tool execution.
///
/// Owned by the registry and constructed fresh per call; tools never
/// mutate it.
#[derive(Clone)]
pub struct ToolContext {
    /// Active tool settings
    pub settings: Arc<ToolSettings>,

    /// Workspace root path
    pub workspace: PathBuf,

    /// Whether file/shell access is restricted to the workspace
    pub restrict_to_workspace: bool,

    /// Outbound-notification function, when the transport provides one
    pub notify: Option<Arc<NotifyFn>>,
}

impl ToolContext {
    /// A context with default settings rooted at `workspace`. Test helper
    /// and default for callers that have no config.
    pub fn rooted(workspace: impl Into<PathBuf>) -> Self {
        Self {
            settings: Arc::new(ToolSettings::default()),
            workspace: workspace.into(),
            restrict_to_workspace: false,
            notify: None,
        }
    }
}

/// The core Tool trait.
///
/// Each tool (shell, read_file, web_search, ...) implements this trait and
/// is registered explicitly in the ToolRegistry — no reflection, no
/// import-time side effects.
#[async_trait]
pub trait Tool: Send + Sync {
    /// The unique name of this tool (e.g. "shell", "read_file").
    fn name(&self) -> &str;

    /// A description of what this tool does (sent to the model).
    fn description(&self) -> &str;

    /// JSON Schema describing this tool's parameters.
    fn parameters_schema(&self) -> serde_json::Value;

    /// Execute the tool with the given arguments (always a JSON object).
    async fn execute(
        &self,
        arguments: serde_json::Value,
        ctx: &ToolContext,
    ) -> std::result::Result<String, ToolError>;

    /// The schema entry for this tool.
    fn schema(&self) -> ToolSchema {
        ToolSchema {
            name: self.name().to_string(),
            description: self.description().to_string(),
            parameters: self.parameters_schema(),
        }
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
                "properties": { "text": { "type": "string" } },
                "required": ["text"]
            })
        }
        async fn execute(
            &self,
            arguments: serde_json::Value,
            _ctx: &ToolContext,
        ) -> Result<String, ToolError> {
            Ok(arguments["text"].as_str().unwrap_or("").to_string())
        }
    }

    #[test]
    fn schema_from_trait() {
        let schema = EchoTool.schema();
        assert_eq!(schema.name, "echo");
        assert_eq!(schema.parameters["required"], serde_json::json!(["text"]));
    }

    #[tokio::test]
    async fn execute_echo() {
        let ctx = ToolContext::rooted("/tmp");
        let out = EchoTool
            .execute(serde_json::json!({"text": "hello"}), &ctx)
            .await
            .unwrap();
        assert_eq!(out, "hello");
    }

    #[test]
    fn default_settings() {
        let settings = ToolSettings::default();
        assert_eq!(settings.shell_timeout_secs, 30);
        assert_eq!(settings.web_search_max_results, 5);
        assert!(settings.web_search_api_key.is_empty());
    }
}
