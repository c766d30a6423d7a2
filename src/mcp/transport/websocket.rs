use crate::mcp::error::McpClientError;
use crate::mcp::protocol::frame_id;
use crate::mcp::transport::McpTransport;
use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use rust_mcp_schema::schema_utils::{ClientMessage, ServerMessage};
use serde_json::Value;
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tokio_tungstenite::tungstenite::Message as Frame;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, info};

type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Persistent socket transport. The socket lock is held for the whole
/// request, so a session has at most one request in flight.
pub struct WebSocketTransport {
    url: String,
    socket: Mutex<Option<Socket>>,
}

impl WebSocketTransport {
    pub async fn connect(url: &str) -> Result<Self, McpClientError> {
        let url = url.trim();
        let (socket, _response) = connect_async(url)
            .await
            .map_err(McpClientError::transport)?;
        info!(%url, "MCP websocket connected");
        Ok(Self {
            url: url.to_string(),
            socket: Mutex::new(Some(socket)),
        })
    }

    async fn send_frame(
        socket: &mut Socket,
        message: &ClientMessage,
    ) -> Result<(), McpClientError> {
        let payload = serde_json::to_string(message)
            .map_err(|err| McpClientError::Protocol(err.to_string()))?;
        socket
            .send(Frame::Text(payload))
            .await
            .map_err(McpClientError::transport)
    }
}

/// Response or error frame for `id`; anything else is skipped.
fn match_response(text: &str, id: i64) -> Result<Option<ServerMessage>, McpClientError> {
    let frame: Value =
        serde_json::from_str(text).map_err(|err| McpClientError::Protocol(err.to_string()))?;
    if frame.get("method").is_some() {
        debug!(method = ?frame.get("method"), "skipping server-initiated frame");
        return Ok(None);
    }
    if frame_id(&frame) != Some(id) {
        debug!(expected = id, got = ?frame.get("id"), "skipping frame for another request");
        return Ok(None);
    }
    serde_json::from_value::<ServerMessage>(frame)
        .map(Some)
        .map_err(|err| McpClientError::Protocol(err.to_string()))
}

#[async_trait]
impl McpTransport for WebSocketTransport {
    async fn request(
        &self,
        id: i64,
        message: ClientMessage,
    ) -> Result<ServerMessage, McpClientError> {
        let mut guard = self.socket.lock().await;
        let socket = guard.as_mut().ok_or(McpClientError::NotConnected)?;
        debug!(url = %self.url, id, "sending MCP websocket request");
        Self::send_frame(socket, &message).await?;

        loop {
            let frame = match socket.next().await {
                Some(Ok(frame)) => frame,
                Some(Err(err)) => {
                    *guard = None;
                    return Err(McpClientError::transport(err));
                }
                None => {
                    *guard = None;
                    return Err(McpClientError::Transport(
                        "websocket closed by server".to_string(),
                    ));
                }
            };

            match frame {
                Frame::Text(text) => {
                    if let Some(message) = match_response(&text, id)? {
                        return Ok(message);
                    }
                }
                Frame::Close(_) => {
                    *guard = None;
                    return Err(McpClientError::Transport(
                        "websocket closed by server".to_string(),
                    ));
                }
                _ => {}
            }
        }
    }

    async fn notify(&self, message: ClientMessage) -> Result<(), McpClientError> {
        let mut guard = self.socket.lock().await;
        let socket = guard.as_mut().ok_or(McpClientError::NotConnected)?;
        Self::send_frame(socket, &message).await
    }

    fn set_protocol_version(&self, _version: String) {}

    async fn close(&self) {
        if let Some(mut socket) = self.socket.lock().await.take() {
            let _ = socket.close(None).await;
        }
    }
}
