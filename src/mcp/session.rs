//! One connection to a remote MCP tool server.
//!
//! The session walks `Disconnected -> Connecting -> Connected ->
//! ListingTools -> Ready`. Any transport fault moves it to `Error`; the
//! supervisor decides whether to reconnect.

use crate::mcp::error::McpClientError;
use crate::mcp::protocol::{
    client_details, effective_protocol_version, initialized_notification, is_method_not_found,
    paginated_params, parse_call_tool, parse_initialize_result, parse_list_tools,
    requested_protocol_version, request_message,
};
use crate::mcp::tools::{McpTool, MCP_MAX_TOOL_LIST};
use crate::mcp::transport::{open_transport, McpTransport, TransportConfig};
use rust_mcp_schema::schema_utils::{RequestFromClient, ServerMessage};
use rust_mcp_schema::{CallToolRequestParams, CallToolResult};
use serde::Serialize;
use serde_json::{Map, Value};
use std::time::Duration;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum SessionState {
    Disconnected,
    Connecting,
    Connected,
    ListingTools,
    Ready,
    Error,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionStatus {
    pub state: SessionState,
    pub server_url: Option<String>,
    pub protocol_version: Option<String>,
    pub server_name: Option<String>,
    pub tool_count: Option<usize>,
    pub last_error: Option<String>,
}

struct Connection {
    transport: Box<dyn McpTransport>,
    protocol_version: String,
    server_name: String,
}

pub struct McpSession {
    client: reqwest::Client,
    config: Option<TransportConfig>,
    connection: Option<Connection>,
    state: SessionState,
    tools: Option<Vec<McpTool>>,
    next_id: i64,
    last_error: Option<String>,
}

impl McpSession {
    pub fn new(client: reqwest::Client) -> Self {
        Self {
            client,
            config: None,
            connection: None,
            state: SessionState::Disconnected,
            tools: None,
            next_id: 0,
            last_error: None,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn config(&self) -> Option<&TransportConfig> {
        self.config.as_ref()
    }

    /// Tools from the last successful listing, if any.
    pub fn cached_tools(&self) -> Option<&[McpTool]> {
        self.tools.as_deref()
    }

    pub fn status(&self) -> SessionStatus {
        SessionStatus {
            state: self.state,
            server_url: self.config.as_ref().map(|config| config.url.clone()),
            protocol_version: self
                .connection
                .as_ref()
                .map(|connection| connection.protocol_version.clone()),
            server_name: self
                .connection
                .as_ref()
                .map(|connection| connection.server_name.clone()),
            tool_count: self.tools.as_ref().map(Vec::len),
            last_error: self.last_error.clone(),
        }
    }

    /// Opens the transport and performs the initialize handshake. Any
    /// previous connection is dropped first, along with its tool cache.
    pub async fn connect(&mut self, config: TransportConfig) -> Result<(), McpClientError> {
        self.disconnect().await;
        self.state = SessionState::Connecting;
        self.config = Some(config.clone());
        info!(url = %config.url, kind = ?config.kind, "connecting to MCP server");

        match self.handshake(&config).await {
            Ok(connection) => {
                info!(
                    server = %connection.server_name,
                    protocol = %connection.protocol_version,
                    "MCP session initialized"
                );
                self.connection = Some(connection);
                self.state = SessionState::Connected;
                self.last_error = None;
                Ok(())
            }
            Err(err) => {
                self.fail(&err);
                Err(err)
            }
        }
    }

    async fn handshake(&mut self, config: &TransportConfig) -> Result<Connection, McpClientError> {
        let transport = with_timeout(
            config.timeout,
            open_transport(config, self.client.clone()),
        )
        .await?;

        let requested = requested_protocol_version(config.protocol_version.as_deref());
        transport.set_protocol_version(requested.clone());
        let id = self.next_request_id();
        let message = request_message(
            RequestFromClient::InitializeRequest(client_details(requested)),
            id,
        )
        .map_err(McpClientError::Protocol)?;

        let outcome = async {
            let reply = with_timeout(config.timeout, transport.request(id, message)).await?;
            let result = parse_initialize_result(rpc_checked(reply)?)
                .map_err(McpClientError::Protocol)?;
            let protocol_version = effective_protocol_version(
                config.protocol_version.as_deref(),
                Some(result.protocol_version.as_str()),
            );
            transport.set_protocol_version(protocol_version.clone());

            let notification = initialized_notification().map_err(McpClientError::Protocol)?;
            with_timeout(config.timeout, transport.notify(notification)).await?;
            Ok::<_, McpClientError>((protocol_version, result.server_info.name))
        }
        .await;

        match outcome {
            Ok((protocol_version, server_name)) => Ok(Connection {
                transport,
                protocol_version,
                server_name,
            }),
            Err(err) => {
                transport.close().await;
                Err(err)
            }
        }
    }

    /// Lists tools once per connection; later calls return the cache.
    pub async fn list_tools(&mut self) -> Result<Vec<McpTool>, McpClientError> {
        if let Some(tools) = &self.tools {
            return Ok(tools.clone());
        }
        if self.connection.is_none() {
            return Err(McpClientError::NotConnected);
        }

        self.state = SessionState::ListingTools;
        match self.fetch_tools().await {
            Ok(tools) => {
                info!(count = tools.len(), "MCP tools listed");
                self.tools = Some(tools.clone());
                self.state = SessionState::Ready;
                Ok(tools)
            }
            Err(err) => {
                self.fail(&err);
                Err(err)
            }
        }
    }

    async fn fetch_tools(&mut self) -> Result<Vec<McpTool>, McpClientError> {
        let mut tools = Vec::new();
        let mut cursor: Option<String> = None;

        loop {
            let reply = self
                .send(RequestFromClient::ListToolsRequest(paginated_params(
                    cursor.take(),
                )))
                .await?;
            if is_method_not_found(&reply) {
                debug!("server does not implement tools/list");
                return Ok(Vec::new());
            }

            let page = parse_list_tools(rpc_checked(reply)?).map_err(McpClientError::Protocol)?;
            tools.extend(page.tools.iter().map(McpTool::from_schema_tool));
            if tools.len() >= MCP_MAX_TOOL_LIST {
                tools.truncate(MCP_MAX_TOOL_LIST);
                break;
            }
            match page.next_cursor {
                Some(next) if !next.is_empty() => cursor = Some(next),
                _ => break,
            }
        }

        Ok(tools)
    }

    /// Calls a listed tool after checking `arguments` against its schema.
    pub async fn call_tool(
        &mut self,
        name: &str,
        arguments: Map<String, Value>,
    ) -> Result<CallToolResult, McpClientError> {
        let tools = self.list_tools().await?;
        let tool = tools
            .iter()
            .find(|tool| tool.name == name)
            .ok_or_else(|| McpClientError::UnknownTool(name.to_string()))?;
        tool.validate_arguments(&arguments)?;

        debug!(tool = %name, "calling MCP tool");
        let request = RequestFromClient::CallToolRequest(
            CallToolRequestParams::new(name).with_arguments(arguments),
        );
        let reply = match self.send(request).await {
            Ok(reply) => reply,
            Err(err) => {
                if err.is_connection_fault() {
                    self.fail(&err);
                }
                return Err(err);
            }
        };
        parse_call_tool(rpc_checked(reply)?).map_err(McpClientError::Protocol)
    }

    pub async fn disconnect(&mut self) {
        if let Some(connection) = self.connection.take() {
            connection.transport.close().await;
            info!("MCP session closed");
        }
        self.tools = None;
        self.state = SessionState::Disconnected;
    }

    async fn send(&mut self, request: RequestFromClient) -> Result<ServerMessage, McpClientError> {
        let id = self.next_request_id();
        let message = request_message(request, id).map_err(McpClientError::Protocol)?;
        let timeout = self.request_timeout();
        let connection = self.connection.as_ref().ok_or(McpClientError::NotConnected)?;
        with_timeout(timeout, connection.transport.request(id, message)).await
    }

    fn request_timeout(&self) -> Duration {
        self.config
            .as_ref()
            .map(|config| config.timeout)
            .unwrap_or(Duration::from_secs(
                crate::core::config::data::DEFAULT_MCP_TIMEOUT_SECS,
            ))
    }

    fn next_request_id(&mut self) -> i64 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    fn fail(&mut self, err: &McpClientError) {
        warn!(error = %err, "MCP session error");
        self.state = SessionState::Error;
        self.last_error = Some(err.to_string());
    }
}

async fn with_timeout<T>(
    timeout: Duration,
    future: impl std::future::Future<Output = Result<T, McpClientError>>,
) -> Result<T, McpClientError> {
    tokio::time::timeout(timeout, future)
        .await
        .unwrap_or(Err(McpClientError::Timeout(timeout.as_secs())))
}

fn rpc_checked(message: ServerMessage) -> Result<ServerMessage, McpClientError> {
    match message {
        ServerMessage::Error(error) => Err(McpClientError::Rpc {
            code: error.error.code,
            message: error.error.message,
        }),
        other => Ok(other),
    }
}
