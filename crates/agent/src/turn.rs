//! The agent turn-loop.
//!
//! One `run()` call is one turn: assemble the prompt, ask the model,
//! execute any requested tools, feed the results back, repeat until the
//! model answers in plain text or the iteration bound trips. Failures never
//! escape as errors; callers receive a bracketed sentinel string instead.

use std::sync::{Arc, Mutex};

use pincer_backend::ChatClient;
use pincer_config::AppConfig;
use pincer_core::backend::{ChatBackend, TokenSink};
use pincer_core::error::{BackendError, Error};
use pincer_core::message::Message;
use pincer_core::tool::{NotifyFn, ToolContext};
use pincer_tools::{ToolRegistry, standard_registry};
use tracing::{debug, info, warn};

use crate::prompt::{PromptAssembler, ensure_identity_files};

/// Returned when a turn burns through its tool-iteration budget.
pub const MAX_ITERATIONS_REACHED: &str = "[Max tool iterations reached]";

pub struct Agent {
    backend: Arc<dyn ChatBackend>,
    tools: Arc<ToolRegistry>,
    prompt: Mutex<PromptAssembler>,
    max_iterations: u32,
}

impl Agent {
    pub fn new(
        backend: Arc<dyn ChatBackend>,
        tools: Arc<ToolRegistry>,
        prompt: PromptAssembler,
    ) -> Self {
        Self {
            backend,
            tools,
            prompt: Mutex::new(prompt),
            max_iterations: 20,
        }
    }

    pub fn with_max_iterations(mut self, max: u32) -> Self {
        self.max_iterations = max;
        self
    }

    /// Build a fully wired agent from the app config: resolve the active
    /// provider, construct the chat client and the standard tool registry,
    /// and seed the workspace identity files.
    pub fn from_config(
        config: &AppConfig,
        notify: Option<Arc<NotifyFn>>,
    ) -> Result<Self, Error> {
        let provider = config.active_provider().ok_or_else(|| {
            Error::Backend(BackendError::NotConfigured(
                "no provider has an API key; add one to ~/.pincer/config.toml".into(),
            ))
        })?;

        let client = ChatClient::new(
            provider.name.clone(),
            provider.api_base,
            provider.api_key,
            provider.model,
        )
        .with_max_tokens(config.agent.max_tokens)
        .with_temperature(config.agent.temperature);

        let workspace = config.agent.workspace.clone();
        ensure_identity_files(&workspace).map_err(|e| Error::Internal(format!(
            "cannot prepare workspace {}: {e}",
            workspace.display()
        )))?;

        let context = ToolContext {
            settings: Arc::new(config.tool_settings()),
            workspace: workspace.clone(),
            restrict_to_workspace: config.agent.restrict_to_workspace,
            notify,
        };
        let registry = standard_registry(context, config.agent.max_tool_output_chars);

        info!(provider = %provider.name, "Agent ready");
        Ok(
            Self::new(Arc::new(client), Arc::new(registry), PromptAssembler::new(workspace))
                .with_max_iterations(config.agent.max_tool_iterations),
        )
    }

    /// Run one turn. Returns the answer text, "" when the whole answer was
    /// already streamed through the sink, or a bracketed sentinel on
    /// failure.
    pub async fn run(
        &self,
        user_message: &str,
        history: &[Message],
        sink: Option<&TokenSink>,
    ) -> String {
        let system = {
            let mut prompt = self.prompt.lock().unwrap_or_else(|e| e.into_inner());
            prompt.build()
        };

        let mut messages = Vec::with_capacity(history.len() + 2);
        messages.push(Message::system(system));
        messages.extend_from_slice(history);
        messages.push(Message::user(user_message));

        // One schema snapshot per turn; mid-turn manifest edits land next turn.
        let schemas = self.tools.schema();

        for iteration in 0..self.max_iterations {
            // Only the first model call of a turn streams; tool follow-ups
            // would interleave garbage into the caller's token stream.
            let call_sink = if iteration == 0 { sink } else { None };

            let reply = match self.backend.chat(&messages, &schemas, call_sink).await {
                Ok(reply) => reply,
                Err(e) => {
                    warn!(error = %e, "Model call failed");
                    return format!("[Model call failed: {e}]");
                }
            };

            let assistant = reply.message;
            messages.push(assistant.clone());

            if assistant.tool_calls.is_empty() {
                let content = assistant
                    .content
                    .as_deref()
                    .unwrap_or("")
                    .trim()
                    .to_string();
                return if call_sink.is_some() {
                    String::new()
                } else {
                    content
                };
            }

            for call in &assistant.tool_calls {
                let arguments = call.parse_arguments();
                info!(tool = %call.name, id = %call.id, "Executing tool call");
                let result = self.tools.call(&call.name, arguments).await;
                debug!(tool = %call.name, chars = result.len(), "Tool call finished");
                messages.push(Message::tool_result(&call.id, result));
            }
        }

        warn!(max = self.max_iterations, "Tool iteration budget exhausted");
        MAX_ITERATIONS_REACHED.to_string()
    }
}
