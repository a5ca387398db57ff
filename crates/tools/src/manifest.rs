//! Manifest tool source — user-defined tools from `workspace/tools/*.toml`.
//!
//! Each manifest declares a name, a description, a shell command template
//! with `{param}` placeholders, and the parameters the model may supply.
//! The source's fingerprint covers every manifest's path, mtime, and size,
//! so adding, editing, or removing one takes effect on the next schema
//! listing or call without a restart.
//!
//! Example manifest:
//!
//! ```toml
//! name = "disk_usage"
//! description = "Show disk usage for a directory"
//! command = "du -sh {path}"
//! timeout_secs = 10
//!
//! [[param]]
//! name = "path"
//! description = "The directory to measure"
//! required = true
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use pincer_core::error::ToolError;
use pincer_core::tool::{Tool, ToolContext};
use serde::Deserialize;
use tracing::warn;

use crate::registry::{Fingerprint, ToolSource};
use crate::shell::run_command;

#[derive(Debug, Deserialize)]
struct Manifest {
    name: String,
    description: String,
    command: String,
    #[serde(default, rename = "param")]
    params: Vec<ManifestParam>,
    #[serde(default)]
    timeout_secs: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct ManifestParam {
    name: String,
    #[serde(default = "default_param_type", rename = "type")]
    param_type: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    required: bool,
}

fn default_param_type() -> String {
    "string".to_string()
}

/// A tool whose execution is a templated shell command.
pub struct CommandTool {
    manifest: Manifest,
    schema: serde_json::Value,
}

impl CommandTool {
    fn new(manifest: Manifest) -> Self {
        let mut properties = serde_json::Map::new();
        let mut required = Vec::new();
        for param in &manifest.params {
            properties.insert(
                param.name.clone(),
                serde_json::json!({
                    "type": param.param_type,
                    "description": param.description,
                }),
            );
            if param.required {
                required.push(serde_json::Value::String(param.name.clone()));
            }
        }
        let schema = serde_json::json!({
            "type": "object",
            "properties": properties,
            "required": required,
        });
        Self { manifest, schema }
    }

    /// Substitute `{param}` placeholders with shell-quoted argument values.
    fn render(&self, arguments: &serde_json::Value) -> Result<String, ToolError> {
        let mut command = self.manifest.command.clone();
        for param in &self.manifest.params {
            let placeholder = format!("{{{}}}", param.name);
            let value = match arguments.get(&param.name) {
                Some(serde_json::Value::String(s)) => s.clone(),
                Some(serde_json::Value::Null) | None => {
                    if param.required {
                        return Err(ToolError::InvalidArguments(format!(
                            "Missing '{}' argument",
                            param.name
                        )));
                    }
                    String::new()
                }
                Some(other) => other.to_string(),
            };
            command = command.replace(&placeholder, &shell_quote(&value));
        }
        Ok(command)
    }
}

/// Single-quote a value for `sh -c`, escaping embedded quotes.
fn shell_quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', r"'\''"))
}

#[async_trait]
impl Tool for CommandTool {
    fn name(&self) -> &str {
        &self.manifest.name
    }

    fn description(&self) -> &str {
        &self.manifest.description
    }

    fn parameters_schema(&self) -> serde_json::Value {
        self.schema.clone()
    }

    async fn execute(
        &self,
        arguments: serde_json::Value,
        ctx: &ToolContext,
    ) -> Result<String, ToolError> {
        let command = self.render(&arguments)?;
        let timeout = self
            .manifest
            .timeout_secs
            .unwrap_or(ctx.settings.shell_timeout_secs);
        run_command(&command, ctx, timeout).await
    }
}

/// Watches a directory of `*.toml` manifests.
pub struct ManifestSource {
    dir: PathBuf,
}

impl ManifestSource {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn manifest_paths(&self) -> Vec<PathBuf> {
        let Ok(reader) = std::fs::read_dir(&self.dir) else {
            return Vec::new();
        };
        let mut paths: Vec<PathBuf> = reader
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.path())
            .filter(|path| path.extension().is_some_and(|ext| ext == "toml"))
            .collect();
        paths.sort();
        paths
    }
}

impl ToolSource for ManifestSource {
    fn name(&self) -> &str {
        "manifest"
    }

    fn fingerprint(&self) -> Fingerprint {
        self.manifest_paths()
            .into_iter()
            .filter_map(|path| {
                let meta = std::fs::metadata(&path).ok()?;
                let mtime = meta.modified().ok()?;
                Some((path, mtime, meta.len()))
            })
            .collect()
    }

    fn load(&self) -> Vec<Arc<dyn Tool>> {
        let mut tools: Vec<Arc<dyn Tool>> = Vec::new();
        for path in self.manifest_paths() {
            let text = match std::fs::read_to_string(&path) {
                Ok(text) => text,
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "Skipping unreadable tool manifest");
                    continue;
                }
            };
            match toml::from_str::<Manifest>(&text) {
                Ok(manifest) => tools.push(Arc::new(CommandTool::new(manifest))),
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "Skipping invalid tool manifest");
                }
            }
        }
        tools
    }
}
