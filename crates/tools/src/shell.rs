//! Shell tool — execute system commands with a wall-clock cap.

use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use pincer_core::error::ToolError;
use pincer_core::tool::{Tool, ToolContext};
use tokio::process::Command;
use tracing::{debug, warn};

/// Hard ceiling on any shell execution, regardless of configuration.
const MAX_TIMEOUT_SECS: u64 = 300;

/// Run a command through `sh -c` and return its combined output.
pub struct ShellTool;

/// Format child output the way the model expects to read it: stdout first,
/// then a `[stderr]` section, then the exit code when nonzero.
pub(crate) fn format_output(stdout: &str, stderr: &str, code: Option<i32>) -> String {
    let mut sections = Vec::new();
    if !stdout.trim().is_empty() {
        sections.push(stdout.trim().to_string());
    }
    if !stderr.trim().is_empty() {
        sections.push(format!("[stderr]\n{}", stderr.trim()));
    }
    match code {
        Some(0) | None => {}
        Some(code) => sections.push(format!("[exit code: {code}]")),
    }
    if sections.is_empty() {
        "(no output)".to_string()
    } else {
        sections.join("\n")
    }
}

/// Spawn `sh -c command` and wait at most `timeout_secs`; the child is
/// killed on expiry.
pub(crate) async fn run_command(
    command: &str,
    ctx: &ToolContext,
    timeout_secs: u64,
) -> Result<String, ToolError> {
    let timeout_secs = timeout_secs.clamp(1, MAX_TIMEOUT_SECS);

    let mut cmd = Command::new("sh");
    cmd.args(["-c", command])
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);
    if ctx.restrict_to_workspace {
        cmd.current_dir(&ctx.workspace);
    }

    debug!(command = %command, timeout_secs, "Executing shell command");

    let child = cmd.spawn().map_err(|e| ToolError::ExecutionFailed {
        tool_name: "shell".into(),
        reason: format!("failed to spawn: {e}"),
    })?;

    match tokio::time::timeout(Duration::from_secs(timeout_secs), child.wait_with_output()).await {
        Ok(Ok(output)) => {
            let stdout = String::from_utf8_lossy(&output.stdout);
            let stderr = String::from_utf8_lossy(&output.stderr);
            if !output.status.success() {
                warn!(
                    command = %command,
                    exit_code = output.status.code().unwrap_or(-1),
                    "Command failed"
                );
            }
            Ok(format_output(&stdout, &stderr, output.status.code()))
        }
        Ok(Err(e)) => Err(ToolError::ExecutionFailed {
            tool_name: "shell".into(),
            reason: e.to_string(),
        }),
        Err(_) => {
            warn!(command = %command, timeout_secs, "Command timed out, child killed");
            Ok(format!("Command timed out after {timeout_secs} seconds"))
        }
    }
}

#[async_trait]
impl Tool for ShellTool {
    fn name(&self) -> &str {
        "shell"
    }

    fn description(&self) -> &str {
        "Execute a shell command and return its output. Use this for running programs, inspecting files, git operations, etc."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "command": {
                    "type": "string",
                    "description": "The shell command to execute"
                }
            },
            "required": ["command"]
        })
    }

    async fn execute(
        &self,
        arguments: serde_json::Value,
        ctx: &ToolContext,
    ) -> Result<String, ToolError> {
        let command = arguments["command"]
            .as_str()
            .ok_or_else(|| ToolError::InvalidArguments("Missing 'command' argument".into()))?;

        run_command(command, ctx, ctx.settings.shell_timeout_secs).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn output_sections() {
        assert_eq!(format_output("hi", "", Some(0)), "hi");
        assert_eq!(format_output("", "", Some(0)), "(no output)");
        assert_eq!(format_output("", "oops", Some(1)), "[stderr]\noops\n[exit code: 1]");
        assert_eq!(format_output("out", "err", Some(0)), "out\n[stderr]\nerr");
    }

    #[tokio::test]
    async fn execute_echo() {
        let ctx = ToolContext::rooted("/tmp");
        let out = ShellTool
            .execute(serde_json::json!({"command": "echo hello"}), &ctx)
            .await
            .unwrap();
        assert_eq!(out, "hello");
    }

    #[tokio::test]
    async fn nonzero_exit_reported() {
        let ctx = ToolContext::rooted("/tmp");
        let out = ShellTool
            .execute(serde_json::json!({"command": "exit 3"}), &ctx)
            .await
            .unwrap();
        assert!(out.contains("[exit code: 3]"));
    }

    #[tokio::test]
    async fn timeout_kills_child() {
        let ctx = ToolContext::rooted("/tmp");
        let out = run_command("sleep 30", &ctx, 1).await.unwrap();
        assert!(out.contains("timed out after 1 seconds"));
    }

    #[tokio::test]
    async fn missing_command_argument() {
        let ctx = ToolContext::rooted("/tmp");
        let result = ShellTool.execute(serde_json::json!({}), &ctx).await;
        assert!(matches!(result, Err(ToolError::InvalidArguments(_))));
    }

    #[tokio::test]
    async fn restricted_runs_in_workspace() {
        let dir = tempfile::tempdir().unwrap();
        let mut ctx = ToolContext::rooted(dir.path());
        ctx.restrict_to_workspace = true;
        let out = ShellTool
            .execute(serde_json::json!({"command": "pwd"}), &ctx)
            .await
            .unwrap();
        let canonical = dir.path().canonicalize().unwrap();
        assert_eq!(out.trim(), canonical.to_string_lossy());
    }
}
