use crate::adapters::http::{send_json, Endpoint};
use crate::adapters::openai::to_api_messages;
use crate::adapters::{ChatBackend, ChatReply, ImageData, ImageService, ProviderError};
use crate::api::anthropic::{
    ContentBlock, McpServerEntry, MessagesRequest, MessagesResponse, ToolDefinition,
    MCP_CLIENT_BETA,
};
use crate::core::message::Message;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, info};

pub const DEFAULT_MAX_TOKENS: u32 = 1024;

/// Source of tool definitions advertised with each request.
#[async_trait]
pub trait ToolCatalog: Send + Sync {
    async fn tool_definitions(&self) -> Vec<ToolDefinition>;
}

/// Remote MCP server attached to outbound requests.
#[derive(Clone)]
pub struct McpAttachment {
    pub server: McpServerEntry,
    pub tools: Option<Arc<dyn ToolCatalog>>,
}

pub struct AnthropicChat {
    endpoint: Endpoint,
    model: String,
    max_tokens: u32,
    mcp: Option<McpAttachment>,
}

impl AnthropicChat {
    pub fn new(endpoint: Endpoint, model: impl Into<String>) -> Self {
        Self {
            endpoint,
            model: model.into(),
            max_tokens: DEFAULT_MAX_TOKENS,
            mcp: None,
        }
    }

    pub fn with_mcp(mut self, attachment: McpAttachment) -> Self {
        self.mcp = Some(attachment);
        self
    }
}

/// Folds the response into user-visible text. Tool traffic is only logged.
pub fn fold_content(blocks: &[ContentBlock]) -> Option<String> {
    let mut texts = Vec::new();
    for block in blocks {
        match block {
            ContentBlock::Text { text } => texts.push(text.as_str()),
            ContentBlock::ToolUse { name, input, .. } => {
                debug!(tool = %name, %input, "model requested tool");
            }
            ContentBlock::McpToolUse {
                name,
                server_name,
                input,
                ..
            } => {
                debug!(tool = %name, server = ?server_name, %input, "model used MCP tool");
            }
            ContentBlock::ToolResult { tool_use_id, .. } => {
                debug!(tool_use_id = ?tool_use_id, "tool result block");
            }
            ContentBlock::McpToolResult {
                tool_use_id,
                is_error,
                ..
            } => {
                debug!(tool_use_id = ?tool_use_id, is_error, "MCP tool result block");
            }
            ContentBlock::Other => {}
        }
    }

    if texts.is_empty() {
        None
    } else {
        Some(texts.join("\n"))
    }
}

#[async_trait]
impl ChatBackend for AnthropicChat {
    async fn complete(&self, history: &[Message]) -> ChatReply {
        let (tools, mcp_servers) = match &self.mcp {
            Some(attachment) => {
                let tools = match &attachment.tools {
                    Some(catalog) => catalog.tool_definitions().await,
                    None => Vec::new(),
                };
                (tools, vec![attachment.server.clone()])
            }
            None => (Vec::new(), Vec::new()),
        };

        let request = MessagesRequest {
            model: self.model.clone(),
            max_tokens: self.max_tokens,
            messages: to_api_messages(history),
            tools,
            mcp_servers,
        };
        info!(
            model = %self.model,
            tools = request.tools.len(),
            mcp = self.mcp.is_some(),
            "sending Anthropic message"
        );

        let mut builder = self.endpoint.post("messages").json(&request);
        if self.mcp.is_some() {
            builder = builder.header("anthropic-beta", MCP_CLIENT_BETA);
        }

        let response: MessagesResponse = send_json(builder).await?;
        debug!(
            stop_reason = ?response.stop_reason,
            blocks = response.content.len(),
            "Anthropic reply"
        );
        Ok(fold_content(&response.content))
    }
}

pub struct AnthropicImages;

#[async_trait]
impl ImageService for AnthropicImages {
    async fn generate_image(&self, _prompt: &str) -> Result<ImageData, ProviderError> {
        Err(ProviderError::Unsupported(
            "Anthropic does not support image generation".to_string(),
        ))
    }
}
