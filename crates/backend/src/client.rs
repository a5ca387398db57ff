//! The OpenAI-compatible chat client.
//!
//! Speaks the `/chat/completions` protocol in both modes:
//! - non-streaming: the full JSON body is the result;
//! - streaming: SSE `data: {...}` chunks are folded into the same reply
//!   shape, with text tokens forwarded to the caller's sink as they arrive
//!   and tool-call fragments reassembled by index.

use std::collections::BTreeMap;

use async_trait::async_trait;
use futures::StreamExt;
use pincer_core::backend::{ChatBackend, ChatReply, TokenSink};
use pincer_core::error::BackendError;
use pincer_core::message::{Message, Role, ToolCall};
use pincer_core::tool::ToolSchema;
use serde::{Deserialize, Serialize};
use tracing::{debug, trace, warn};

use crate::retry::{RetryPolicy, retry_with_backoff};

const ANTHROPIC_VERSION: &str = "2023-06-01";

/// How request auth headers are built.
///
/// Selected by provider identity, never inferred from the URL: Anthropic's
/// native endpoint wants `x-api-key` + `anthropic-version` instead of a
/// bearer token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthScheme {
    Bearer,
    AnthropicHeaders,
}

impl AuthScheme {
    pub fn for_provider(name: &str) -> Self {
        if name == "anthropic" {
            Self::AnthropicHeaders
        } else {
            Self::Bearer
        }
    }

    /// The auth headers to attach to a request.
    pub fn headers(&self, api_key: &str) -> Vec<(&'static str, String)> {
        match self {
            Self::Bearer => vec![("Authorization", format!("Bearer {api_key}"))],
            Self::AnthropicHeaders => vec![
                ("x-api-key", api_key.to_string()),
                ("anthropic-version", ANTHROPIC_VERSION.to_string()),
            ],
        }
    }
}

/// A chat client for one configured provider.
pub struct ChatClient {
    provider: String,
    api_base: String,
    api_key: String,
    model: String,
    max_tokens: u32,
    temperature: f32,
    auth: AuthScheme,
    policy: RetryPolicy,
    http: reqwest::Client,
}

impl ChatClient {
    /// Create a client for the given provider endpoint.
    pub fn new(
        provider: impl Into<String>,
        api_base: impl Into<String>,
        api_key: impl Into<String>,
        model: impl Into<String>,
    ) -> Self {
        let provider = provider.into();
        let http = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(120))
            .build()
            .expect("Failed to create HTTP client");

        Self {
            auth: AuthScheme::for_provider(&provider),
            provider,
            api_base: api_base.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            model: model.into(),
            max_tokens: 8192,
            temperature: 0.7,
            policy: RetryPolicy::default(),
            http,
        }
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn build_payload(
        &self,
        messages: &[Message],
        tools: &[ToolSchema],
        streaming: bool,
    ) -> serde_json::Value {
        let mut body = serde_json::json!({
            "model": self.model,
            "messages": to_api_messages(messages),
            "max_tokens": self.max_tokens,
            "temperature": self.temperature,
            "stream": streaming,
        });
        if !tools.is_empty() {
            body["tools"] = serde_json::json!(to_api_tools(tools));
            body["tool_choice"] = serde_json::json!("auto");
        }
        body
    }

    async fn post_with_retry(
        &self,
        url: &str,
        payload: &serde_json::Value,
        streaming: bool,
    ) -> Result<reqwest::Response, BackendError> {
        retry_with_backoff(self.policy, move || async move {
            let mut req = self
                .http
                .post(url)
                .header("Content-Type", "application/json");
            for (name, value) in self.auth.headers(&self.api_key) {
                req = req.header(name, value);
            }
            if streaming {
                req = req.header("Accept", "text/event-stream");
            }

            let response = req
                .json(payload)
                .send()
                .await
                .map_err(|e| BackendError::Network(format!("{url}: {e}")))?;

            let status = response.status();
            if status.is_success() {
                return Ok(response);
            }
            let body = response.text().await.unwrap_or_default();
            warn!(status = status.as_u16(), body = %clip(&body, 200), "Backend returned error");
            Err(BackendError::Api {
                status: status.as_u16(),
                message: clip(&body, 400).to_string(),
            })
        })
        .await
    }

    async fn parse_response(response: reqwest::Response) -> Result<ChatReply, BackendError> {
        let api: ApiResponse = response
            .json()
            .await
            .map_err(|e| BackendError::MalformedResponse(e.to_string()))?;

        let choice = api
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| BackendError::MalformedResponse("no choices in response".into()))?;

        let tool_calls: Vec<ToolCall> = choice
            .message
            .tool_calls
            .unwrap_or_default()
            .into_iter()
            .map(|tc| ToolCall {
                id: tc.id,
                name: tc.function.name,
                arguments: tc.function.arguments,
            })
            .collect();

        Ok(ChatReply {
            message: Message {
                role: Role::Assistant,
                content: choice.message.content,
                tool_calls,
                tool_call_id: None,
            },
            finish_reason: choice.finish_reason,
        })
    }

    async fn collect_stream(
        &self,
        response: reqwest::Response,
        sink: &TokenSink,
    ) -> Result<ChatReply, BackendError> {
        let mut collector = StreamCollector::new();
        let mut byte_stream = response.bytes_stream();
        let mut buffer = String::new();

        'stream: while let Some(chunk) = byte_stream.next().await {
            let bytes =
                chunk.map_err(|e| BackendError::StreamInterrupted(e.to_string()))?;
            buffer.push_str(&String::from_utf8_lossy(&bytes));

            while let Some(pos) = buffer.find('\n') {
                let line: String = buffer.drain(..=pos).collect();
                let done = collector.absorb_line(
                    line.trim_end_matches(['\n', '\r']),
                    &mut |token| sink(token),
                );
                if done {
                    break 'stream;
                }
            }
        }

        Ok(collector.finish())
    }
}

#[async_trait]
impl ChatBackend for ChatClient {
    fn name(&self) -> &str {
        &self.provider
    }

    async fn chat(
        &self,
        messages: &[Message],
        tools: &[ToolSchema],
        sink: Option<&TokenSink>,
    ) -> Result<ChatReply, BackendError> {
        let streaming = sink.is_some();
        let url = format!("{}/chat/completions", self.api_base);
        let payload = self.build_payload(messages, tools, streaming);

        debug!(
            provider = %self.provider,
            model = %self.model,
            streaming,
            messages = messages.len(),
            "Sending chat request"
        );

        let response = self.post_with_retry(&url, &payload, streaming).await?;
        match sink {
            Some(sink) => self.collect_stream(response, sink).await,
            None => Self::parse_response(response).await,
        }
    }
}

/// Folds SSE chunks into one reply.
///
/// A single tool call's name and argument text may arrive split across many
/// events, indexed by position. The first fragment bearing an id seeds the
/// entry at that index; every later fragment with the same index appends its
/// name/argument text. A BTreeMap keeps finalization in index order no
/// matter the arrival order.
#[derive(Default)]
struct StreamCollector {
    content: String,
    finish_reason: Option<String>,
    partial: BTreeMap<u32, PartialToolCall>,
}

#[derive(Default)]
struct PartialToolCall {
    id: String,
    name: String,
    arguments: String,
}

impl StreamCollector {
    fn new() -> Self {
        Self::default()
    }

    /// Absorb one SSE line, emitting any text token. Returns true on the
    /// `[DONE]` terminator.
    fn absorb_line(&mut self, line: &str, emit: &mut dyn FnMut(&str)) -> bool {
        let line = line.trim();
        // Skip blank lines and SSE comments
        if line.is_empty() || line.starts_with(':') {
            return false;
        }
        let Some(data) = line.strip_prefix("data:") else {
            return false;
        };
        let data = data.trim();
        if data == "[DONE]" {
            return true;
        }

        match serde_json::from_str::<StreamResponse>(data) {
            Ok(resp) => {
                for choice in &resp.choices {
                    if let Some(token) = &choice.delta.content {
                        if !token.is_empty() {
                            emit(token);
                            self.content.push_str(token);
                        }
                    }
                    if let Some(deltas) = &choice.delta.tool_calls {
                        for delta in deltas {
                            self.absorb_tool_delta(delta);
                        }
                    }
                    if let Some(reason) = &choice.finish_reason {
                        self.finish_reason = Some(reason.clone());
                    }
                }
            }
            Err(e) => {
                trace!(data = %data, error = %e, "Ignoring unparseable SSE chunk");
            }
        }
        false
    }

    fn absorb_tool_delta(&mut self, delta: &StreamToolCallDelta) {
        let acc = self.partial.entry(delta.index).or_default();
        if let Some(id) = &delta.id {
            if acc.id.is_empty() {
                acc.id = id.clone();
            }
        }
        if let Some(function) = &delta.function {
            if let Some(name) = &function.name {
                acc.name.push_str(name);
            }
            if let Some(arguments) = &function.arguments {
                acc.arguments.push_str(arguments);
            }
        }
    }

    /// Synthesize the final reply in the same shape as a non-streaming
    /// result: content is the accumulated text, or null when empty and tool
    /// calls exist.
    fn finish(self) -> ChatReply {
        let tool_calls: Vec<ToolCall> = self
            .partial
            .into_values()
            .map(|p| ToolCall {
                id: p.id,
                name: p.name,
                arguments: p.arguments,
            })
            .collect();

        let content = if self.content.is_empty() && !tool_calls.is_empty() {
            None
        } else {
            Some(self.content)
        };

        ChatReply {
            message: Message {
                role: Role::Assistant,
                content,
                tool_calls,
                tool_call_id: None,
            },
            finish_reason: self.finish_reason,
        }
    }
}

/// Clip to at most `max` characters, respecting char boundaries.
fn clip(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((i, _)) => &s[..i],
        None => s,
    }
}

// --- Wire types (internal) ---

#[derive(Debug, Serialize, Deserialize)]
struct ApiMessage {
    role: String,
    content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_calls: Option<Vec<ApiToolCall>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_call_id: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
struct ApiToolCall {
    id: String,
    r#type: String,
    function: ApiFunction,
}

#[derive(Debug, Serialize, Deserialize)]
struct ApiFunction {
    name: String,
    arguments: String,
}

#[derive(Debug, Serialize)]
struct ApiToolDefinition {
    r#type: String,
    function: ApiToolFunction,
}

#[derive(Debug, Serialize)]
struct ApiToolFunction {
    name: String,
    description: String,
    parameters: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct ApiResponse {
    choices: Vec<ApiChoice>,
}

#[derive(Debug, Deserialize)]
struct ApiChoice {
    message: ApiMessage,
    #[serde(default)]
    finish_reason: Option<String>,
}

/// A single SSE `data: {...}` chunk from a streaming response.
#[derive(Debug, Deserialize)]
struct StreamResponse {
    #[serde(default)]
    choices: Vec<StreamChoice>,
}

#[derive(Debug, Deserialize)]
struct StreamChoice {
    delta: StreamDelta,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct StreamDelta {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    tool_calls: Option<Vec<StreamToolCallDelta>>,
}

/// A tool-call delta — arrives incrementally across chunks.
#[derive(Debug, Deserialize)]
struct StreamToolCallDelta {
    index: u32,
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    function: Option<StreamFunctionDelta>,
}

#[derive(Debug, Deserialize)]
struct StreamFunctionDelta {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    arguments: Option<String>,
}

fn to_api_messages(messages: &[Message]) -> Vec<ApiMessage> {
    messages
        .iter()
        .map(|m| ApiMessage {
            role: match m.role {
                Role::System => "system".into(),
                Role::User => "user".into(),
                Role::Assistant => "assistant".into(),
                Role::Tool => "tool".into(),
            },
            content: m.content.clone(),
            tool_calls: if m.tool_calls.is_empty() {
                None
            } else {
                Some(
                    m.tool_calls
                        .iter()
                        .map(|tc| ApiToolCall {
                            id: tc.id.clone(),
                            r#type: "function".into(),
                            function: ApiFunction {
                                name: tc.name.clone(),
                                arguments: tc.arguments.clone(),
                            },
                        })
                        .collect(),
                )
            },
            tool_call_id: m.tool_call_id.clone(),
        })
        .collect()
}

fn to_api_tools(tools: &[ToolSchema]) -> Vec<ApiToolDefinition> {
    tools
        .iter()
        .map(|t| ApiToolDefinition {
            r#type: "function".into(),
            function: ApiToolFunction {
                name: t.name.clone(),
                description: t.description.clone(),
                parameters: t.parameters.clone(),
            },
        })
        .collect()
}
