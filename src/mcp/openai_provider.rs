use crate::adapters::http::{send_json, Endpoint};
use crate::adapters::ProviderError;
use crate::api::{ChatMessage, ChatRequest, ChatResponse};
use crate::core::builtin_providers::ProviderMode;
use crate::mcp::service::ContextProvider;
use crate::mcp::types::McpContext;
use async_trait::async_trait;
use std::time::Duration;
use tracing::debug;

pub const OPENAI_MCP_PROVIDER_ID: &str = "openai-mcp";
pub const OPENAI_MCP_PROVIDER_NAME: &str = "OpenAI MCP Provider";
pub const OPENAI_MCP_DEFAULT_ENDPOINT: &str = "https://api.openai.com/v1";
pub const OPENAI_MCP_DEFAULT_MODEL: &str = "gpt-3.5-turbo";

const MAX_TOKENS: u32 = 1000;
const TEMPERATURE: f32 = 0.7;

const CAPABILITIES: &[&str] = &[
    "chat",
    "completion",
    "context-management",
    "message-history",
    "function-calling",
];

/// Chat completions over the context's message log.
pub struct OpenAiContextProvider {
    endpoint: Endpoint,
    model: String,
    timeout: Duration,
}

impl OpenAiContextProvider {
    pub fn new(endpoint: Endpoint, model: impl Into<String>, timeout: Duration) -> Self {
        Self {
            endpoint,
            model: model.into(),
            timeout,
        }
    }

    pub fn connect(
        client: reqwest::Client,
        base_url: &str,
        api_key: &str,
        model: &str,
        timeout: Duration,
    ) -> Self {
        Self::new(
            Endpoint::new(client, base_url, api_key, ProviderMode::OpenAi),
            model,
            timeout,
        )
    }
}

#[async_trait]
impl ContextProvider for OpenAiContextProvider {
    fn id(&self) -> &str {
        OPENAI_MCP_PROVIDER_ID
    }

    fn capabilities(&self) -> Vec<String> {
        CAPABILITIES.iter().map(|c| c.to_string()).collect()
    }

    fn default_timeout(&self) -> Duration {
        self.timeout
    }

    async fn respond(&self, context: &McpContext) -> Result<String, ProviderError> {
        let request = ChatRequest {
            model: self.model.clone(),
            messages: context
                .messages
                .iter()
                .map(|msg| ChatMessage::new(msg.role.as_str(), msg.content.clone()))
                .collect(),
            max_tokens: Some(MAX_TOKENS),
            temperature: Some(TEMPERATURE),
        };
        debug!(model = %self.model, turns = request.messages.len(), "MCP context completion");

        let response: ChatResponse =
            send_json(self.endpoint.post("chat/completions").json(&request)).await?;
        Ok(response.first_text().unwrap_or_default().to_string())
    }
}
