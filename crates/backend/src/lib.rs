//! Chat backend client for Pincer.
//!
//! One client covers every OpenAI-compatible `/chat/completions` endpoint
//! (OpenAI, OpenRouter, Groq, Mistral, DeepSeek, Ollama, ...); only the base
//! URL and the auth header scheme differ per provider. Transient failures
//! are retried with exponential backoff before anything is surfaced to the
//! agent loop.

pub mod client;
pub mod retry;

pub use client::{AuthScheme, ChatClient};
pub use retry::{RetryPolicy, retry_with_backoff};
