//! Domain-level error taxonomy.
//!
//! These are the abstract error kinds a server connection or session can
//! raise. Retryability is a property of the kind, not of the call site —
//! [`McpError::is_retryable`] is the single source of truth the session's
//! retry loop consults.

use thiserror::Error;

/// Errors that can occur while talking to an MCP server.
#[derive(Error, Debug)]
pub enum McpError {
    /// A line could not be parsed as a JSON-RPC message, or a required
    /// field was missing or of the wrong JSON-RPC version.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// The server replied with a JSON-RPC `error` object.
    #[error("server returned error {code}: {message}")]
    Method {
        code: i64,
        message: String,
        data: Option<serde_json::Value>,
    },

    /// No response arrived before the caller's deadline.
    #[error("request timed out after {0:?}")]
    Timeout(std::time::Duration),

    /// The transport is closed: the pipe broke, the child exited, or a
    /// write failed.
    #[error("transport closed: {0}")]
    Transport(String),

    /// The server failed to start or complete its handshake in time.
    #[error("server failed to start: {0}")]
    Startup(String),

    /// A bare tool name matched more than one server's catalog.
    #[error("tool name `{name}` is ambiguous between servers: {}", .namespaces.join(", "))]
    AmbiguousToolName { name: String, namespaces: Vec<String> },

    /// No server advertises a tool by this name.
    #[error("unknown tool: {0}")]
    UnknownTool(String),

    /// The operation was cancelled before it completed.
    #[error("operation cancelled")]
    Cancelled,
}

impl McpError {
    /// Whether a session should retry the request that produced this error.
    ///
    /// Matches the taxonomy: parse/method errors that name a client-side
    /// mistake (bad params, unknown method, malformed request) are never
    /// retried; everything transient is.
    pub fn is_retryable(&self) -> bool {
        match self {
            McpError::Timeout(_) => true,
            McpError::Method { code, .. } => !matches!(code, -32601 | -32600 | -32602),
            McpError::Protocol(_)
            | McpError::Transport(_)
            | McpError::Startup(_)
            | McpError::AmbiguousToolName { .. }
            | McpError::UnknownTool(_)
            | McpError::Cancelled => false,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, McpError::Cancelled)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timeout_is_retryable() {
        assert!(McpError::Timeout(std::time::Duration::from_secs(1)).is_retryable());
    }

    #[test]
    fn method_not_found_is_not_retryable() {
        let err = McpError::Method {
            code: -32601,
            message: "nope".into(),
            data: None,
        };
        assert!(!err.is_retryable());
    }

    #[test]
    fn server_range_error_is_retryable() {
        let err = McpError::Method {
            code: -32000,
            message: "busy".into(),
            data: None,
        };
        assert!(err.is_retryable());
    }

    #[test]
    fn cancelled_is_cancelled() {
        assert!(McpError::Cancelled.is_cancelled());
        assert!(!McpError::UnknownTool("x".into()).is_cancelled());
    }
}
