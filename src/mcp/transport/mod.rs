//! Transports for the remote MCP tool server.
//!
//! Both backends carry one JSON-RPC request at a time and hand back the
//! matching response frame, so the session layer never sees wire details.

use crate::core::config::McpSettings;
use crate::mcp::error::McpClientError;
use crate::utils::url::is_websocket_url;
use async_trait::async_trait;
use rust_mcp_schema::schema_utils::{ClientMessage, ServerMessage};
use std::time::Duration;

pub mod http;
pub mod sse;
pub mod websocket;

pub use http::HttpTransport;
pub use websocket::WebSocketTransport;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportKind {
    /// One JSON-RPC message per POST; JSON or event-stream replies.
    Http,
    /// A persistent socket carrying text frames.
    WebSocket,
}

impl TransportKind {
    pub fn from_config(value: Option<&str>, url: &str) -> Result<Self, McpClientError> {
        match value.map(|v| v.trim().to_ascii_lowercase()) {
            Some(kind) if kind.is_empty() => Ok(Self::infer(url)),
            None => Ok(Self::infer(url)),
            Some(kind) => match kind.as_str() {
                "http" | "streamable-http" | "streamable_http" => Ok(TransportKind::Http),
                "websocket" | "ws" => Ok(TransportKind::WebSocket),
                other => Err(McpClientError::Config(format!(
                    "unknown transport '{other}' (expected http or websocket)"
                ))),
            },
        }
    }

    fn infer(url: &str) -> Self {
        if is_websocket_url(url) {
            TransportKind::WebSocket
        } else {
            TransportKind::Http
        }
    }
}

#[derive(Debug, Clone)]
pub struct TransportConfig {
    pub url: String,
    pub kind: TransportKind,
    pub protocol_version: Option<String>,
    /// Per-request deadline.
    pub timeout: Duration,
}

impl TransportConfig {
    pub fn new(url: impl Into<String>, kind: TransportKind) -> Self {
        Self {
            url: url.into(),
            kind,
            protocol_version: None,
            timeout: Duration::from_secs(crate::core::config::data::DEFAULT_MCP_TIMEOUT_SECS),
        }
    }

    pub fn from_settings(settings: &McpSettings) -> Result<Self, McpClientError> {
        let url = settings
            .server_url
            .as_deref()
            .map(str::trim)
            .filter(|url| !url.is_empty())
            .ok_or_else(|| McpClientError::Config("no MCP server URL configured".to_string()))?;
        let kind = TransportKind::from_config(settings.transport.as_deref(), url)?;
        Ok(Self {
            url: url.to_string(),
            kind,
            protocol_version: settings.protocol_version.clone(),
            timeout: Duration::from_secs(settings.timeout_secs()),
        })
    }
}

#[async_trait]
pub trait McpTransport: Send + Sync {
    /// Sends a request and waits for the response frame carrying `id`.
    async fn request(&self, id: i64, message: ClientMessage)
        -> Result<ServerMessage, McpClientError>;

    async fn notify(&self, message: ClientMessage) -> Result<(), McpClientError>;

    /// Records the negotiated protocol version for subsequent requests.
    fn set_protocol_version(&self, version: String);

    async fn close(&self);
}

pub async fn open_transport(
    config: &TransportConfig,
    client: reqwest::Client,
) -> Result<Box<dyn McpTransport>, McpClientError> {
    match config.kind {
        TransportKind::Http => Ok(Box::new(HttpTransport::new(client, &config.url))),
        TransportKind::WebSocket => Ok(Box::new(WebSocketTransport::connect(&config.url).await?)),
    }
}
