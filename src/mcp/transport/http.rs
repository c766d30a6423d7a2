use crate::mcp::error::McpClientError;
use crate::mcp::transport::sse::{is_event_stream_content_type, next_sse_server_message};
use crate::mcp::transport::McpTransport;
use async_trait::async_trait;
use rust_mcp_schema::schema_utils::{ClientMessage, ServerMessage};
use std::sync::Mutex;
use tracing::debug;

pub const MCP_JSON_CONTENT_TYPE: &str = "application/json";
pub const MCP_JSON_AND_SSE_ACCEPT: &str = "application/json, text/event-stream";
pub const MCP_PROTOCOL_VERSION_HEADER: &str = "MCP-Protocol-Version";
pub const MCP_SESSION_ID_HEADER: &str = "mcp-session-id";

const MAX_ERROR_BODY_CHARS: usize = 300;

pub fn apply_client_post_headers(request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
    request
        .header("Content-Type", MCP_JSON_CONTENT_TYPE)
        .header("Accept", MCP_JSON_AND_SSE_ACCEPT)
}

pub fn apply_protocol_version_header(
    request: reqwest::RequestBuilder,
    protocol_version: Option<&str>,
) -> reqwest::RequestBuilder {
    match protocol_version {
        Some(protocol_version) if !protocol_version.trim().is_empty() => {
            request.header(MCP_PROTOCOL_VERSION_HEADER, protocol_version)
        }
        _ => request,
    }
}

#[derive(Default)]
struct HttpState {
    session_id: Option<String>,
    protocol_version: Option<String>,
}

/// Streamable HTTP: every JSON-RPC message is its own POST.
pub struct HttpTransport {
    client: reqwest::Client,
    url: String,
    state: Mutex<HttpState>,
}

impl HttpTransport {
    pub fn new(client: reqwest::Client, url: &str) -> Self {
        Self {
            client,
            url: url.trim().to_string(),
            state: Mutex::new(HttpState::default()),
        }
    }

    pub fn session_id(&self) -> Option<String> {
        self.lock_state().session_id.clone()
    }

    fn lock_state(&self) -> std::sync::MutexGuard<'_, HttpState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    async fn post(&self, message: &ClientMessage) -> Result<reqwest::Response, McpClientError> {
        let payload = serde_json::to_string(message)
            .map_err(|err| McpClientError::Protocol(err.to_string()))?;
        let (session_id, protocol_version) = {
            let state = self.lock_state();
            (state.session_id.clone(), state.protocol_version.clone())
        };

        let mut request = apply_protocol_version_header(
            apply_client_post_headers(self.client.post(&self.url)),
            protocol_version.as_deref(),
        )
        .body(payload);
        if let Some(session_id) = session_id {
            request = request.header(MCP_SESSION_ID_HEADER, session_id);
        }

        let response = request.send().await.map_err(McpClientError::transport)?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message: String = body.trim().chars().take(MAX_ERROR_BODY_CHARS).collect();
            return Err(McpClientError::Http {
                status: status.as_u16(),
                message: if message.is_empty() {
                    status.to_string()
                } else {
                    message
                },
            });
        }

        if let Some(session_id) = response
            .headers()
            .get(MCP_SESSION_ID_HEADER)
            .and_then(|value| value.to_str().ok())
        {
            self.lock_state().session_id = Some(session_id.to_string());
        }
        Ok(response)
    }
}

#[async_trait]
impl McpTransport for HttpTransport {
    async fn request(
        &self,
        id: i64,
        message: ClientMessage,
    ) -> Result<ServerMessage, McpClientError> {
        debug!(url = %self.url, id, "sending MCP HTTP request");
        let response = self.post(&message).await?;
        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .unwrap_or("")
            .to_string();

        if is_event_stream_content_type(&content_type) {
            next_sse_server_message(response).await
        } else {
            let body = response.bytes().await.map_err(McpClientError::transport)?;
            serde_json::from_slice::<ServerMessage>(&body)
                .map_err(|err| McpClientError::Protocol(err.to_string()))
        }
    }

    async fn notify(&self, message: ClientMessage) -> Result<(), McpClientError> {
        self.post(&message).await.map(|_| ())
    }

    fn set_protocol_version(&self, version: String) {
        self.lock_state().protocol_version = Some(version);
    }

    async fn close(&self) {
        self.lock_state().session_id = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mcp::protocol::{initialized_notification, request_message};
    use crate::utils::test_utils::{test_client, StubResponse, StubServer};
    use rust_mcp_schema::schema_utils::RequestFromClient;
    use serde_json::json;

    #[test]
    fn protocol_header_ignored_when_blank() {
        let req = apply_protocol_version_header(
            test_client().post("https://example.com"),
            Some("  "),
        )
        .build()
        .unwrap();
        assert!(req.headers().get(MCP_PROTOCOL_VERSION_HEADER).is_none());
    }

    #[tokio::test]
    async fn session_id_is_echoed_and_sse_replies_are_read() {
        let server = StubServer::start(vec![
            StubResponse::json(200, json!({"jsonrpc":"2.0","id":1,"result":{"ok":true}}))
                .with_header("mcp-session-id", "abc"),
            StubResponse::text(
                200,
                "Text/Event-Stream; Charset=UTF-8",
                "data: {\"jsonrpc\":\"2.0\",\"id\":2,\"result\":{\"ok\":true}}\n\n",
            ),
        ])
        .await;
        let transport = HttpTransport::new(test_client(), &format!("{}/mcp", server.base_url));
        transport.set_protocol_version("2025-11-25".to_string());

        let first = request_message(RequestFromClient::ListToolsRequest(None), 1).unwrap();
        assert!(matches!(
            transport.request(1, first).await.unwrap(),
            ServerMessage::Response(_)
        ));
        assert_eq!(transport.session_id().as_deref(), Some("abc"));

        transport
            .notify(initialized_notification().unwrap())
            .await
            .unwrap();

        let requests = server.requests();
        assert_eq!(requests[0].path, "/mcp");
        assert_eq!(requests[0].headers["accept"], MCP_JSON_AND_SSE_ACCEPT);
        assert_eq!(requests[0].headers["mcp-protocol-version"], "2025-11-25");
        assert!(!requests[0].headers.contains_key("mcp-session-id"));
        assert_eq!(requests[1].headers["mcp-session-id"], "abc");
    }

    #[tokio::test]
    async fn http_errors_carry_status() {
        let server = StubServer::start(vec![StubResponse::text(
            503,
            "text/plain",
            "overloaded",
        )])
        .await;
        let transport = HttpTransport::new(test_client(), &server.base_url);
        let message = request_message(RequestFromClient::ListToolsRequest(None), 1).unwrap();
        let err = transport.request(1, message).await.unwrap_err();
        assert_eq!(
            err,
            McpClientError::Http {
                status: 503,
                message: "overloaded".to_string()
            }
        );
    }
}
