//! File tools — read, write, list, delete within the workspace.
//!
//! Relative paths anchor at the workspace root. When the context restricts
//! access, any path resolving outside the workspace is refused. A missing
//! file is a descriptive result string, not an error: the model should see
//! it and move on.

use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;
use pincer_core::error::ToolError;
use pincer_core::tool::{Tool, ToolContext};

/// Resolve `raw` against the workspace and enforce the restriction policy.
///
/// Normalization is purely lexical so paths to files that do not exist yet
/// still resolve (write_file needs that).
pub(crate) fn resolve_path(ctx: &ToolContext, tool_name: &str, raw: &str) -> Result<PathBuf, ToolError> {
    let candidate = Path::new(raw);
    let resolved = if candidate.is_absolute() {
        candidate.to_path_buf()
    } else {
        ctx.workspace.join(candidate)
    };

    if !ctx.restrict_to_workspace {
        return Ok(resolved);
    }

    let normalized = normalize(&resolved);
    if normalized.starts_with(normalize(&ctx.workspace)) {
        Ok(normalized)
    } else {
        Err(ToolError::PermissionDenied {
            tool_name: tool_name.into(),
            reason: format!("path escapes the workspace: {raw}"),
        })
    }
}

fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::ParentDir => {
                out.pop();
            }
            Component::CurDir => {}
            other => out.push(other),
        }
    }
    out
}

fn missing_path_arg() -> ToolError {
    ToolError::InvalidArguments("Missing 'path' argument".into())
}

pub struct ReadFileTool;

#[async_trait]
impl Tool for ReadFileTool {
    fn name(&self) -> &str {
        "read_file"
    }

    fn description(&self) -> &str {
        "Read the contents of a file. Relative paths are resolved against the workspace."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "path": { "type": "string", "description": "The file path to read" }
            },
            "required": ["path"]
        })
    }

    async fn execute(
        &self,
        arguments: serde_json::Value,
        ctx: &ToolContext,
    ) -> Result<String, ToolError> {
        let raw = arguments["path"].as_str().ok_or_else(missing_path_arg)?;
        let path = resolve_path(ctx, self.name(), raw)?;

        match tokio::fs::read_to_string(&path).await {
            Ok(content) => Ok(content),
            Err(e) => Ok(format!("Cannot read {raw}: {e}")),
        }
    }
}

pub struct WriteFileTool;

#[async_trait]
impl Tool for WriteFileTool {
    fn name(&self) -> &str {
        "write_file"
    }

    fn description(&self) -> &str {
        "Write content to a file, creating parent directories as needed. Overwrites existing content."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "path": { "type": "string", "description": "The file path to write" },
                "content": { "type": "string", "description": "The content to write" }
            },
            "required": ["path", "content"]
        })
    }

    async fn execute(
        &self,
        arguments: serde_json::Value,
        ctx: &ToolContext,
    ) -> Result<String, ToolError> {
        let raw = arguments["path"].as_str().ok_or_else(missing_path_arg)?;
        let content = arguments["content"]
            .as_str()
            .ok_or_else(|| ToolError::InvalidArguments("Missing 'content' argument".into()))?;
        let path = resolve_path(ctx, self.name(), raw)?;

        if let Some(parent) = path.parent() {
            if let Err(e) = tokio::fs::create_dir_all(parent).await {
                return Ok(format!("Cannot create directory for {raw}: {e}"));
            }
        }
        match tokio::fs::write(&path, content).await {
            Ok(()) => Ok(format!("Wrote {} bytes to {raw}", content.len())),
            Err(e) => Ok(format!("Cannot write {raw}: {e}")),
        }
    }
}

pub struct ListFilesTool;

#[async_trait]
impl Tool for ListFilesTool {
    fn name(&self) -> &str {
        "list_files"
    }

    fn description(&self) -> &str {
        "List the entries of a directory. Defaults to the workspace root."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "path": { "type": "string", "description": "The directory to list (default: workspace root)" }
            }
        })
    }

    async fn execute(
        &self,
        arguments: serde_json::Value,
        ctx: &ToolContext,
    ) -> Result<String, ToolError> {
        let raw = arguments["path"].as_str().unwrap_or(".");
        let path = resolve_path(ctx, self.name(), raw)?;

        let mut reader = match tokio::fs::read_dir(&path).await {
            Ok(reader) => reader,
            Err(e) => return Ok(format!("Cannot list {raw}: {e}")),
        };

        let mut entries = Vec::new();
        while let Ok(Some(entry)) = reader.next_entry().await {
            let name = entry.file_name().to_string_lossy().into_owned();
            let is_dir = entry
                .file_type()
                .await
                .map(|t| t.is_dir())
                .unwrap_or(false);
            entries.push(if is_dir { format!("{name}/") } else { name });
        }
        entries.sort();

        if entries.is_empty() {
            Ok("(empty directory)".to_string())
        } else {
            Ok(entries.join("\n"))
        }
    }
}

pub struct DeleteFileTool;

#[async_trait]
impl Tool for DeleteFileTool {
    fn name(&self) -> &str {
        "delete_file"
    }

    fn description(&self) -> &str {
        "Delete a file."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "path": { "type": "string", "description": "The file path to delete" }
            },
            "required": ["path"]
        })
    }

    async fn execute(
        &self,
        arguments: serde_json::Value,
        ctx: &ToolContext,
    ) -> Result<String, ToolError> {
        let raw = arguments["path"].as_str().ok_or_else(missing_path_arg)?;
        let path = resolve_path(ctx, self.name(), raw)?;

        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(format!("Deleted {raw}")),
            Err(e) => Ok(format!("Cannot delete {raw}: {e}")),
        }
    }
}
