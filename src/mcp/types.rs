//! Data model for MCP context providers: conversation contexts, replies,
//! and the error codes reported back to the UI.

use crate::core::message::now_rfc3339;
use crate::error::{Classify, ErrorKind};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum McpErrorCode {
    McpProviderNotFound,
    McpProviderInitializationFailed,
    McpContextNotFound,
    McpContextCreationFailed,
    McpMessageSendFailed,
    McpProtocolViolation,
    McpConfigurationError,
    McpTimeoutError,
    McpAuthenticationError,
    McpRateLimitExceeded,
}

impl McpErrorCode {
    pub fn as_str(self) -> &'static str {
        match self {
            McpErrorCode::McpProviderNotFound => "MCP_PROVIDER_NOT_FOUND",
            McpErrorCode::McpProviderInitializationFailed => "MCP_PROVIDER_INITIALIZATION_FAILED",
            McpErrorCode::McpContextNotFound => "MCP_CONTEXT_NOT_FOUND",
            McpErrorCode::McpContextCreationFailed => "MCP_CONTEXT_CREATION_FAILED",
            McpErrorCode::McpMessageSendFailed => "MCP_MESSAGE_SEND_FAILED",
            McpErrorCode::McpProtocolViolation => "MCP_PROTOCOL_VIOLATION",
            McpErrorCode::McpConfigurationError => "MCP_CONFIGURATION_ERROR",
            McpErrorCode::McpTimeoutError => "MCP_TIMEOUT_ERROR",
            McpErrorCode::McpAuthenticationError => "MCP_AUTHENTICATION_ERROR",
            McpErrorCode::McpRateLimitExceeded => "MCP_RATE_LIMIT_EXCEEDED",
        }
    }
}

impl fmt::Display for McpErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Failure carried inside an unsuccessful [`McpResponse`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct McpError {
    pub code: McpErrorCode,
    pub message: String,
    /// True when retrying the same request may succeed.
    pub recoverable: bool,
}

impl McpError {
    pub fn new(code: McpErrorCode, message: impl Into<String>, recoverable: bool) -> Self {
        Self {
            code,
            message: message.into(),
            recoverable,
        }
    }
}

impl fmt::Display for McpError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

impl std::error::Error for McpError {}

impl Classify for McpError {
    fn kind(&self) -> ErrorKind {
        match self.code {
            McpErrorCode::McpProviderNotFound
            | McpErrorCode::McpConfigurationError
            | McpErrorCode::McpAuthenticationError => ErrorKind::Config,
            McpErrorCode::McpTimeoutError | McpErrorCode::McpMessageSendFailed => {
                ErrorKind::Network
            }
            McpErrorCode::McpProtocolViolation | McpErrorCode::McpRateLimitExceeded => {
                ErrorKind::Api
            }
            _ => ErrorKind::Unknown,
        }
    }
}

/// Errors returned directly by the context service, as opposed to failures
/// folded into a response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct McpServiceError(pub McpError);

impl McpServiceError {
    pub fn provider_not_found(provider_id: &str) -> Self {
        Self(McpError::new(
            McpErrorCode::McpProviderNotFound,
            format!("MCP provider '{provider_id}' is not registered"),
            false,
        ))
    }

    pub fn code(&self) -> McpErrorCode {
        self.0.code
    }
}

impl fmt::Display for McpServiceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl std::error::Error for McpServiceError {}

impl Classify for McpServiceError {
    fn kind(&self) -> ErrorKind {
        self.0.kind()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum McpRole {
    User,
    Assistant,
    System,
}

impl McpRole {
    pub fn as_str(self) -> &'static str {
        match self {
            McpRole::User => "user",
            McpRole::Assistant => "assistant",
            McpRole::System => "system",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct McpMessage {
    pub id: String,
    pub content: String,
    pub role: McpRole,
    pub timestamp: String,
    #[serde(default)]
    pub metadata: Map<String, Value>,
}

impl McpMessage {
    pub fn new(id: impl Into<String>, role: McpRole, content: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            content: content.into(),
            role,
            timestamp: now_rfc3339(),
            metadata: Map::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct McpContext {
    pub session_id: String,
    pub messages: Vec<McpMessage>,
    #[serde(default)]
    pub metadata: Map<String, Value>,
    /// Last modification time.
    pub timestamp: String,
}

impl McpContext {
    pub fn new(session_id: impl Into<String>) -> Self {
        Self {
            session_id: session_id.into(),
            messages: Vec::new(),
            metadata: Map::new(),
            timestamp: now_rfc3339(),
        }
    }

    pub fn push(&mut self, message: McpMessage) {
        self.timestamp = message.timestamp.clone();
        self.messages.push(message);
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct McpResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<McpMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<McpContext>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<McpError>,
}

impl McpResponse {
    pub fn ok(message: McpMessage, context: McpContext) -> Self {
        Self {
            success: true,
            message: Some(message),
            context: Some(context),
            error: None,
        }
    }

    pub fn failed(error: McpError) -> Self {
        Self {
            success: false,
            message: None,
            context: None,
            error: Some(error),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderState {
    Idle,
    Active,
    Error,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct McpProviderStatus {
    pub provider_id: String,
    pub status: ProviderState,
    pub last_activity: Option<String>,
    pub context_count: usize,
    pub error_count: u32,
    pub capabilities: Vec<String>,
}

#[derive(Debug, Clone, Default)]
pub struct SendOptions {
    /// Overrides the provider's request timeout.
    pub timeout: Option<Duration>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_serialize_in_screaming_case() {
        for code in [
            McpErrorCode::McpTimeoutError,
            McpErrorCode::McpProviderNotFound,
            McpErrorCode::McpRateLimitExceeded,
        ] {
            assert_eq!(
                serde_json::to_value(code).unwrap(),
                serde_json::Value::String(code.as_str().to_string())
            );
        }
    }

    #[test]
    fn failed_response_shape() {
        let response = McpResponse::failed(McpError::new(
            McpErrorCode::McpTimeoutError,
            "timed out",
            true,
        ));
        let value = serde_json::to_value(&response).unwrap();
        assert_eq!(value["success"], false);
        assert_eq!(value["error"]["code"], "MCP_TIMEOUT_ERROR");
        assert_eq!(value["error"]["recoverable"], true);
        assert!(value.get("message").is_none());
    }

    #[test]
    fn context_push_updates_timestamp() {
        let mut context = McpContext::new("s1");
        let message = McpMessage::new("m1", McpRole::User, "hi");
        let stamp = message.timestamp.clone();
        context.push(message);
        assert_eq!(context.timestamp, stamp);
        assert_eq!(serde_json::to_value(McpRole::Assistant).unwrap(), "assistant");
    }
}
