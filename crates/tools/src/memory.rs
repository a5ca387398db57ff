//! User-memory tools — persistent notes about the user in workspace USER.md.

use async_trait::async_trait;
use pincer_core::error::ToolError;
use pincer_core::tool::{Tool, ToolContext};

const MEMORY_FILE: &str = "USER.md";

pub struct ReadUserMemoryTool;

#[async_trait]
impl Tool for ReadUserMemoryTool {
    fn name(&self) -> &str {
        "read_user_memory"
    }

    fn description(&self) -> &str {
        "Read the persistent notes kept about the user."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({ "type": "object", "properties": {} })
    }

    async fn execute(
        &self,
        _arguments: serde_json::Value,
        ctx: &ToolContext,
    ) -> Result<String, ToolError> {
        match tokio::fs::read_to_string(ctx.workspace.join(MEMORY_FILE)).await {
            Ok(content) if !content.trim().is_empty() => Ok(content),
            _ => Ok("(no user memory recorded yet)".to_string()),
        }
    }
}

pub struct UpdateUserMemoryTool;

#[async_trait]
impl Tool for UpdateUserMemoryTool {
    fn name(&self) -> &str {
        "update_user_memory"
    }

    fn description(&self) -> &str {
        "Replace the persistent notes kept about the user. Write the complete new content."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "content": {
                    "type": "string",
                    "description": "The full new memory content"
                }
            },
            "required": ["content"]
        })
    }

    async fn execute(
        &self,
        arguments: serde_json::Value,
        ctx: &ToolContext,
    ) -> Result<String, ToolError> {
        let content = arguments["content"]
            .as_str()
            .ok_or_else(|| ToolError::InvalidArguments("Missing 'content' argument".into()))?;

        let path = ctx.workspace.join(MEMORY_FILE);
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| ToolError::ExecutionFailed {
                    tool_name: "update_user_memory".into(),
                    reason: e.to_string(),
                })?;
        }
        tokio::fs::write(&path, content)
            .await
            .map_err(|e| ToolError::ExecutionFailed {
                tool_name: "update_user_memory".into(),
                reason: e.to_string(),
            })?;
        Ok("User memory updated.".to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn empty_memory_reads_as_placeholder() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = ToolContext::rooted(dir.path());
        let out = ReadUserMemoryTool
            .execute(serde_json::json!({}), &ctx)
            .await
            .unwrap();
        assert!(out.contains("no user memory"));
    }

    #[tokio::test]
    async fn update_then_read() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = ToolContext::rooted(dir.path());

        UpdateUserMemoryTool
            .execute(serde_json::json!({"content": "Prefers short answers."}), &ctx)
            .await
            .unwrap();

        let out = ReadUserMemoryTool
            .execute(serde_json::json!({}), &ctx)
            .await
            .unwrap();
        assert_eq!(out, "Prefers short answers.");
    }
}
