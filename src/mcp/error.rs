use crate::error::{Classify, ErrorKind};
use std::fmt;

/// Failures raised by the MCP tool-server client.
#[derive(Debug, Clone, PartialEq)]
pub enum McpClientError {
    NotConnected,
    Transport(String),
    Http { status: u16, message: String },
    Timeout(u64),
    Protocol(String),
    Rpc { code: i64, message: String },
    InvalidArguments { tool: String, errors: Vec<String> },
    UnknownTool(String),
    Config(String),
}

impl McpClientError {
    pub fn transport(err: impl fmt::Display) -> Self {
        McpClientError::Transport(err.to_string())
    }

    /// Faults that a fresh connection may clear.
    pub fn is_connection_fault(&self) -> bool {
        match self {
            McpClientError::Transport(_)
            | McpClientError::Timeout(_)
            | McpClientError::NotConnected => true,
            McpClientError::Http { status, .. } => *status >= 500 || *status == 404,
            _ => false,
        }
    }
}

impl fmt::Display for McpClientError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            McpClientError::NotConnected => write!(f, "MCP session is not connected"),
            McpClientError::Transport(message) => write!(f, "MCP transport error: {message}"),
            McpClientError::Http { status, message } => {
                write!(f, "MCP server returned HTTP {status}: {message}")
            }
            McpClientError::Timeout(secs) => write!(f, "MCP request timed out after {secs}s"),
            McpClientError::Protocol(message) => write!(f, "MCP protocol error: {message}"),
            McpClientError::Rpc { code, message } => write!(f, "MCP error {code}: {message}"),
            McpClientError::InvalidArguments { tool, errors } => {
                write!(f, "Invalid arguments for tool '{tool}': {}", errors.join("; "))
            }
            McpClientError::UnknownTool(name) => write!(f, "Unknown MCP tool '{name}'"),
            McpClientError::Config(message) => write!(f, "MCP configuration error: {message}"),
        }
    }
}

impl std::error::Error for McpClientError {}

impl Classify for McpClientError {
    fn kind(&self) -> ErrorKind {
        match self {
            McpClientError::NotConnected
            | McpClientError::Transport(_)
            | McpClientError::Timeout(_) => ErrorKind::Network,
            McpClientError::Http { .. }
            | McpClientError::Protocol(_)
            | McpClientError::Rpc { .. } => ErrorKind::Api,
            McpClientError::InvalidArguments { .. } | McpClientError::UnknownTool(_) => {
                ErrorKind::Validation
            }
            McpClientError::Config(_) => ErrorKind::Config,
        }
    }
}
