//! ChatBackend trait — the abstraction over the model backend.
//!
//! A backend knows how to send a message list (plus tool schemas) to a
//! chat-completion endpoint and return the resulting assistant message.
//! The one production implementation lives in `pincer-backend`; tests
//! substitute scripted mocks.

use async_trait::async_trait;

use crate::error::BackendError;
use crate::message::Message;
use crate::tool::ToolSchema;

/// Sink that observes text tokens as they stream in.
///
/// This is the only place in the system where partial output is observable
/// before a turn completes. A caller that stops listening simply misses
/// tokens; it does not cancel the turn.
pub type TokenSink = dyn Fn(&str) + Send + Sync;

/// The complete result of one chat call, streaming or not.
#[derive(Debug, Clone, PartialEq)]
pub struct ChatReply {
    /// The assistant message (synthesized from deltas in streaming mode)
    pub message: Message,

    /// Terminal finish reason reported by the backend, when present
    pub finish_reason: Option<String>,
}

/// The model backend contract.
#[async_trait]
pub trait ChatBackend: Send + Sync {
    /// A human-readable provider name (e.g. "openrouter", "anthropic").
    fn name(&self) -> &str;

    /// Send a chat request. Streaming is enabled iff `sink` is supplied;
    /// each text token is emitted to the sink as it arrives, and the same
    /// synthesized reply is returned once the stream is exhausted.
    async fn chat(
        &self,
        messages: &[Message],
        tools: &[ToolSchema],
        sink: Option<&TokenSink>,
    ) -> std::result::Result<ChatReply, BackendError>;
}
