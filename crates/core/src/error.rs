//! Error types for the Pincer domain.
//!
//! Uses `thiserror` for ergonomic error definitions.
//! Each bounded context has its own error variant.

use thiserror::Error;

/// HTTP statuses the backend client treats as transient.
pub const RETRYABLE_STATUS: [u16; 5] = [429, 500, 502, 503, 504];

/// The top-level error type for all Pincer operations.
#[derive(Debug, Error)]
pub enum Error {
    #[error("Backend error: {0}")]
    Backend(#[from] BackendError),

    #[error("Tool error: {0}")]
    Tool(#[from] ToolError),

    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias using our Error.
pub type Result<T> = std::result::Result<T, Error>;

// --- Bounded context errors ---

/// Errors from the chat-completion backend.
#[derive(Debug, Clone, Error)]
pub enum BackendError {
    #[error("API error {status}: {message}")]
    Api { status: u16, message: String },

    #[error("Cannot connect to backend: {0}")]
    Network(String),

    #[error("Stream interrupted: {0}")]
    StreamInterrupted(String),

    #[error("Malformed response: {0}")]
    MalformedResponse(String),

    #[error("No backend configured: {0}")]
    NotConfigured(String),
}

impl BackendError {
    /// Whether the retry policy should try again after this error.
    ///
    /// Connection failures and the transient HTTP statuses (429, 5xx) retry;
    /// anything else fails immediately with the response body surfaced.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Network(_) => true,
            Self::Api { status, .. } => RETRYABLE_STATUS.contains(status),
            _ => false,
        }
    }
}

/// Errors from tool execution.
///
/// These never cross the registry boundary — `ToolRegistry::call` converts
/// them into a descriptive string the model can see and act on.
#[derive(Debug, Error)]
pub enum ToolError {
    #[error("tool not found: {0}")]
    NotFound(String),

    #[error("{tool_name}: {reason}")]
    ExecutionFailed { tool_name: String, reason: String },

    #[error("{tool_name} timed out after {timeout_secs}s")]
    Timeout { tool_name: String, timeout_secs: u64 },

    #[error("{tool_name}: {reason}")]
    PermissionDenied { tool_name: String, reason: String },

    #[error("invalid arguments: {0}")]
    InvalidArguments(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn api_error_displays_status_and_body() {
        let err = Error::Backend(BackendError::Api {
            status: 429,
            message: "Too many requests".into(),
        });
        assert!(err.to_string().contains("429"));
        assert!(err.to_string().contains("Too many requests"));
    }

    #[test]
    fn retryable_statuses() {
        for status in RETRYABLE_STATUS {
            let err = BackendError::Api {
                status,
                message: String::new(),
            };
            assert!(err.is_retryable(), "{status} should be retryable");
        }
        let err = BackendError::Api {
            status: 400,
            message: String::new(),
        };
        assert!(!err.is_retryable());
    }

    #[test]
    fn network_errors_are_retryable() {
        assert!(BackendError::Network("connection refused".into()).is_retryable());
        assert!(!BackendError::StreamInterrupted("eof".into()).is_retryable());
    }

    #[test]
    fn tool_error_displays_tool_name() {
        let err = Error::Tool(ToolError::PermissionDenied {
            tool_name: "shell".into(),
            reason: "path is outside the workspace".into(),
        });
        assert!(err.to_string().contains("shell"));
        assert!(err.to_string().contains("workspace"));
    }
}
