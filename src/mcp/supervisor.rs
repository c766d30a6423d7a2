//! Keeps an [`McpSession`] usable across dropped connections.

use crate::adapters::anthropic::ToolCatalog;
use crate::api::anthropic::ToolDefinition;
use crate::mcp::error::McpClientError;
use crate::mcp::session::{McpSession, SessionState, SessionStatus};
use crate::mcp::tools::{to_definitions, McpTool};
use crate::mcp::transport::TransportConfig;
use async_trait::async_trait;
use rust_mcp_schema::CallToolResult;
use serde_json::{Map, Value};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex as StdMutex};
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Backoff {
    pub base: Duration,
    pub factor: u32,
    pub cap: Duration,
    pub max_attempts: u32,
}

impl Default for Backoff {
    fn default() -> Self {
        Self {
            base: Duration::from_millis(500),
            factor: 2,
            cap: Duration::from_secs(30),
            max_attempts: crate::core::config::data::DEFAULT_MCP_RECONNECT_ATTEMPTS,
        }
    }
}

impl Backoff {
    /// Delay before retry number `attempt` (zero-based).
    pub fn delay(&self, attempt: u32) -> Duration {
        let multiplier = self.factor.saturating_pow(attempt);
        self.base.saturating_mul(multiplier).min(self.cap)
    }
}

struct Supervisor {
    config: TransportConfig,
    backoff: Backoff,
    session: Mutex<McpSession>,
    reconnecting: AtomicBool,
    /// Set when a reconnect gives up; background reconnects wait until then.
    retry_at: StdMutex<Option<Instant>>,
}

impl Supervisor {
    fn retry_at(&self) -> std::sync::MutexGuard<'_, Option<Instant>> {
        self.retry_at
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn cooling_down(&self) -> bool {
        self.retry_at().is_some_and(|retry_at| Instant::now() < retry_at)
    }

    async fn ensure_ready(&self) -> Result<Vec<McpTool>, McpClientError> {
        let mut attempt = 0;
        loop {
            // Hold the session for the attempt only, never across the sleep.
            let result = {
                let mut session = self.session.lock().await;
                if session.state() == SessionState::Ready {
                    if let Some(tools) = session.cached_tools() {
                        return Ok(tools.to_vec());
                    }
                }
                match session.connect(self.config.clone()).await {
                    Ok(()) => session.list_tools().await,
                    Err(err) => Err(err),
                }
            };
            match result {
                Ok(tools) => {
                    if attempt > 0 {
                        info!(attempt, "MCP session recovered");
                    }
                    *self.retry_at() = None;
                    return Ok(tools);
                }
                Err(err) => {
                    attempt += 1;
                    if attempt >= self.backoff.max_attempts.max(1) {
                        warn!(attempt, error = %err, "giving up on MCP server");
                        *self.retry_at() = Some(Instant::now() + self.backoff.cap);
                        return Err(err);
                    }
                    let delay = self.backoff.delay(attempt - 1);
                    warn!(attempt, ?delay, error = %err, "MCP connect failed, retrying");
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }
}

/// An [`McpSession`] that reconnects with exponential backoff.
///
/// Chat requests never wait on a reconnect: [`SupervisedSession::tools`]
/// answers from the cache and leaves reconnecting to a background task.
pub struct SupervisedSession {
    inner: Arc<Supervisor>,
}

impl SupervisedSession {
    pub fn new(client: reqwest::Client, config: TransportConfig, backoff: Backoff) -> Self {
        Self {
            inner: Arc::new(Supervisor {
                config,
                backoff,
                session: Mutex::new(McpSession::new(client)),
                reconnecting: AtomicBool::new(false),
                retry_at: StdMutex::new(None),
            }),
        }
    }

    pub async fn status(&self) -> SessionStatus {
        self.inner.session.lock().await.status()
    }

    /// Returns the tool list of a ready session, reconnecting as needed.
    pub async fn ensure_ready(&self) -> Result<Vec<McpTool>, McpClientError> {
        self.inner.ensure_ready().await
    }

    /// Spawns a background reconnect. Returns false when one is already
    /// running, or when the last one gave up less than `backoff.cap` ago.
    pub fn start(&self) -> bool {
        if self.inner.cooling_down() {
            debug!("MCP reconnect deferred until the cool-down ends");
            return false;
        }
        if self.inner.reconnecting.swap(true, Ordering::AcqRel) {
            return false;
        }

        let inner = Arc::clone(&self.inner);
        tokio::spawn(async move {
            if let Err(err) = inner.ensure_ready().await {
                debug!(error = %err, "background MCP connect failed");
            }
            inner.reconnecting.store(false, Ordering::Release);
        });
        true
    }

    /// Tools of a ready session, or an empty list while it is not ready.
    /// Never waits on the network.
    pub fn tools(&self) -> Vec<McpTool> {
        if let Ok(session) = self.inner.session.try_lock() {
            if session.state() == SessionState::Ready {
                if let Some(tools) = session.cached_tools() {
                    return tools.to_vec();
                }
            }
        }
        if self.start() {
            info!("MCP session not ready, connecting in the background");
        }
        Vec::new()
    }

    /// Calls a tool, reconnecting once if the connection has gone bad.
    pub async fn call_tool(
        &self,
        name: &str,
        arguments: Map<String, Value>,
    ) -> Result<CallToolResult, McpClientError> {
        self.ensure_ready().await?;
        let first = self
            .inner
            .session
            .lock()
            .await
            .call_tool(name, arguments.clone())
            .await;
        match first {
            Err(err) if err.is_connection_fault() => {
                warn!(error = %err, "MCP call failed on a bad connection, reconnecting");
                self.ensure_ready().await?;
                self.inner
                    .session
                    .lock()
                    .await
                    .call_tool(name, arguments)
                    .await
            }
            other => other,
        }
    }

    pub async fn disconnect(&self) {
        self.inner.session.lock().await.disconnect().await;
    }
}

#[async_trait]
impl ToolCatalog for SupervisedSession {
    async fn tool_definitions(&self) -> Vec<ToolDefinition> {
        to_definitions(&self.tools())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mcp::transport::TransportKind;
    use crate::utils::test_utils::{test_client, StubResponse, StubServer};
    use serde_json::json;

    #[test]
    fn backoff_doubles_up_to_cap() {
        let backoff = Backoff::default();
        assert_eq!(backoff.delay(0), Duration::from_millis(500));
        assert_eq!(backoff.delay(1), Duration::from_secs(1));
        assert_eq!(backoff.delay(3), Duration::from_secs(4));
        assert_eq!(backoff.delay(6), Duration::from_secs(30));
        assert_eq!(backoff.delay(40), Duration::from_secs(30));
    }

    fn fast_backoff(max_attempts: u32) -> Backoff {
        Backoff {
            base: Duration::from_millis(1),
            factor: 2,
            cap: Duration::from_millis(5),
            max_attempts,
        }
    }

    fn initialize_reply() -> StubResponse {
        StubResponse::json(
            200,
            json!({"jsonrpc":"2.0","id":0,"result":{
                "protocolVersion":"2025-11-25",
                "capabilities":{},
                "serverInfo":{"name":"mock","version":"0.1.0"}
            }}),
        )
    }

    fn tools_reply(name: &str) -> StubResponse {
        StubResponse::json(
            200,
            json!({"jsonrpc":"2.0","id":1,"result":{"tools":[
                {"name": name, "inputSchema": {"type": "object"}}
            ]}}),
        )
    }

    #[tokio::test]
    async fn reconnects_after_failures_and_lists_tools() {
        let server = StubServer::start(vec![
            StubResponse::text(503, "text/plain", "warming up"),
            StubResponse::text(503, "text/plain", "warming up"),
            initialize_reply(),
            StubResponse::text(202, "application/json", ""),
            tools_reply("weapon_stats"),
        ])
        .await;
        let supervised = SupervisedSession::new(
            test_client(),
            TransportConfig::new(&server.base_url, TransportKind::Http),
            fast_backoff(5),
        );

        let tools = supervised.ensure_ready().await.unwrap();
        assert_eq!(tools.len(), 1);
        assert_eq!(server.requests().len(), 5);

        // A ready session answers from the cache.
        let definitions = supervised.tool_definitions().await;
        assert_eq!(definitions[0].name, "weapon_stats");
        supervised.ensure_ready().await.unwrap();
        assert_eq!(server.requests().len(), 5);
        assert_eq!(supervised.status().await.state, SessionState::Ready);
    }

    #[tokio::test]
    async fn gives_up_after_max_attempts() {
        let server =
            StubServer::start(vec![StubResponse::text(500, "text/plain", "down")]).await;
        let supervised = SupervisedSession::new(
            test_client(),
            TransportConfig::new(&server.base_url, TransportKind::Http),
            fast_backoff(3),
        );

        let err = supervised.ensure_ready().await.unwrap_err();
        assert!(matches!(err, McpClientError::Http { status: 500, .. }));
        assert_eq!(server.requests().len(), 3);
        assert!(supervised.tool_definitions().await.is_empty());
    }

    #[tokio::test]
    async fn reconnect_refreshes_the_manifest() {
        let server = StubServer::start(vec![
            initialize_reply(),
            StubResponse::text(202, "application/json", ""),
            tools_reply("old_tool"),
            initialize_reply(),
            StubResponse::text(202, "application/json", ""),
            tools_reply("new_tool"),
        ])
        .await;
        let supervised = SupervisedSession::new(
            test_client(),
            TransportConfig::new(&server.base_url, TransportKind::Http),
            fast_backoff(2),
        );

        let first = supervised.ensure_ready().await.unwrap();
        assert_eq!(first[0].name, "old_tool");

        supervised.disconnect().await;
        let second = supervised.ensure_ready().await.unwrap();
        assert_eq!(second[0].name, "new_tool");
    }

    #[tokio::test]
    async fn tool_lookups_do_not_wait_for_a_down_server() {
        let server =
            StubServer::start(vec![StubResponse::text(500, "text/plain", "down")]).await;
        let supervised = SupervisedSession::new(
            test_client(),
            TransportConfig::new(&server.base_url, TransportKind::Http),
            Backoff::default(),
        );

        for _ in 0..2 {
            let started = Instant::now();
            assert!(supervised.tool_definitions().await.is_empty());
            assert!(started.elapsed() < Duration::from_millis(200));
        }
    }

    #[tokio::test]
    async fn background_connect_fills_the_catalog() {
        let server = StubServer::start(vec![
            initialize_reply(),
            StubResponse::text(202, "application/json", ""),
            tools_reply("weapon_stats"),
        ])
        .await;
        let supervised = SupervisedSession::new(
            test_client(),
            TransportConfig::new(&server.base_url, TransportKind::Http),
            fast_backoff(2),
        );

        assert!(supervised.start());
        let mut definitions = Vec::new();
        for _ in 0..200 {
            definitions = supervised.tool_definitions().await;
            if !definitions.is_empty() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(definitions.len(), 1);
        assert_eq!(definitions[0].name, "weapon_stats");
        assert_eq!(server.requests().len(), 3);
    }

    #[tokio::test]
    async fn reconnects_wait_out_the_cool_down() {
        let server =
            StubServer::start(vec![StubResponse::text(500, "text/plain", "down")]).await;
        let supervised = SupervisedSession::new(
            test_client(),
            TransportConfig::new(&server.base_url, TransportKind::Http),
            Backoff {
                max_attempts: 1,
                ..Backoff::default()
            },
        );

        supervised.ensure_ready().await.unwrap_err();
        assert!(!supervised.start());
        assert!(supervised.tools().is_empty());
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(server.requests().len(), 1);
    }

    #[tokio::test]
    async fn call_tool_reconnects_once_after_a_dropped_session() {
        let server = StubServer::start(vec![
            initialize_reply(),
            StubResponse::text(202, "application/json", ""),
            tools_reply("weapon_stats"),
            StubResponse::text(404, "text/plain", "session expired"),
            initialize_reply(),
            StubResponse::text(202, "application/json", ""),
            tools_reply("weapon_stats"),
            StubResponse::json(
                200,
                json!({"jsonrpc":"2.0","id":5,"result":{"content":[{"type":"text","text":"900 RPM"}]}}),
            ),
        ])
        .await;
        let supervised = SupervisedSession::new(
            test_client(),
            TransportConfig::new(&server.base_url, TransportKind::Http),
            fast_backoff(2),
        );

        let result = supervised
            .call_tool("weapon_stats", Map::new())
            .await
            .unwrap();
        assert_eq!(result.content.len(), 1);

        let methods: Vec<String> = server
            .requests()
            .iter()
            .map(|request| request.json()["method"].as_str().unwrap_or_default().to_string())
            .collect();
        assert_eq!(
            methods,
            [
                "initialize",
                "notifications/initialized",
                "tools/list",
                "tools/call",
                "initialize",
                "notifications/initialized",
                "tools/list",
                "tools/call",
            ]
        );
        assert_eq!(supervised.status().await.state, SessionState::Ready);
    }
}
