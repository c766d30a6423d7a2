use crate::mcp::types::{McpError, McpMessage};
use serde::Serialize;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

const EVENT_CHANNEL_CAPACITY: usize = 64;

/// Notifications published by the MCP context service.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum McpEvent {
    ProviderRegistered { provider_id: String },
    ProviderUnregistered { provider_id: String },
    ContextCleared { provider_id: String },
    MessageSent { provider_id: String, message: McpMessage },
    MessageReceived { provider_id: String, message: McpMessage },
    ErrorOccurred { provider_id: String, error: McpError },
}

impl McpEvent {
    pub fn provider_id(&self) -> &str {
        match self {
            McpEvent::ProviderRegistered { provider_id }
            | McpEvent::ProviderUnregistered { provider_id }
            | McpEvent::ContextCleared { provider_id }
            | McpEvent::MessageSent { provider_id, .. }
            | McpEvent::MessageReceived { provider_id, .. }
            | McpEvent::ErrorOccurred { provider_id, .. } => provider_id,
        }
    }
}

#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<McpEvent>,
}

impl Default for EventBus {
    fn default() -> Self {
        let (sender, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self { sender }
    }
}

impl EventBus {
    pub fn subscribe(&self) -> broadcast::Receiver<McpEvent> {
        self.sender.subscribe()
    }

    /// Publishing without subscribers is not an error.
    pub fn publish(&self, event: McpEvent) {
        let _ = self.sender.send(event);
    }
}

/// Writes every event to the log until the bus is dropped.
pub async fn log_events(mut events: broadcast::Receiver<McpEvent>) {
    loop {
        match events.recv().await {
            Ok(McpEvent::ErrorOccurred { provider_id, error }) => {
                warn!(provider = %provider_id, code = %error.code, "{}", error.message);
            }
            Ok(McpEvent::MessageSent { provider_id, message })
            | Ok(McpEvent::MessageReceived { provider_id, message }) => {
                debug!(
                    provider = %provider_id,
                    role = message.role.as_str(),
                    id = %message.id,
                    "MCP message"
                );
            }
            Ok(event) => info!(provider = %event.provider_id(), ?event, "MCP event"),
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                warn!(skipped, "MCP event log fell behind");
            }
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
}
