//! Small utility tools: current time and out-of-band messaging.

use async_trait::async_trait;
use pincer_core::error::ToolError;
use pincer_core::tool::{Tool, ToolContext};

pub struct CurrentTimeTool;

#[async_trait]
impl Tool for CurrentTimeTool {
    fn name(&self) -> &str {
        "current_time"
    }

    fn description(&self) -> &str {
        "Get the current local date and time."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({ "type": "object", "properties": {} })
    }

    async fn execute(
        &self,
        _arguments: serde_json::Value,
        _ctx: &ToolContext,
    ) -> Result<String, ToolError> {
        Ok(chrono::Local::now().format("%Y-%m-%d %H:%M:%S (%A)").to_string())
    }
}

/// Push a message to the user through the session's notification channel.
/// Used by scheduled prompts (heartbeat, cron) to reach the user without a
/// pending request.
pub struct SendMessageTool;

#[async_trait]
impl Tool for SendMessageTool {
    fn name(&self) -> &str {
        "send_message"
    }

    fn description(&self) -> &str {
        "Send a message to the user immediately, outside the normal reply."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "message": {
                    "type": "string",
                    "description": "The message text to deliver"
                }
            },
            "required": ["message"]
        })
    }

    async fn execute(
        &self,
        arguments: serde_json::Value,
        ctx: &ToolContext,
    ) -> Result<String, ToolError> {
        let message = arguments["message"]
            .as_str()
            .ok_or_else(|| ToolError::InvalidArguments("Missing 'message' argument".into()))?;

        match &ctx.notify {
            Some(notify) => {
                notify(message);
                Ok("Message sent.".to_string())
            }
            None => Ok("No notification channel is attached to this session.".to_string()),
        }
    }
}
