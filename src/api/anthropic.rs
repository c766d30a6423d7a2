use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const MCP_CLIENT_BETA: &str = "mcp-client-2025-04-04";

#[derive(Serialize, Debug)]
pub struct MessagesRequest {
    pub model: String,
    pub max_tokens: u32,
    pub messages: Vec<super::ChatMessage>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tools: Vec<ToolDefinition>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub mcp_servers: Vec<McpServerEntry>,
}

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct ToolDefinition {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub input_schema: Value,
}

/// Remote MCP server the vendor connects to on our behalf.
#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct McpServerEntry {
    #[serde(rename = "type")]
    pub kind: String,
    pub url: String,
    pub name: String,
}

impl McpServerEntry {
    pub fn url(url: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            kind: "url".to_string(),
            url: url.into(),
            name: name.into(),
        }
    }
}

#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentBlock {
    Text {
        text: String,
    },
    ToolUse {
        #[serde(default)]
        id: Option<String>,
        name: String,
        #[serde(default)]
        input: Value,
    },
    McpToolUse {
        #[serde(default)]
        id: Option<String>,
        name: String,
        #[serde(default)]
        server_name: Option<String>,
        #[serde(default)]
        input: Value,
    },
    ToolResult {
        #[serde(default)]
        tool_use_id: Option<String>,
        #[serde(default)]
        content: Value,
    },
    McpToolResult {
        #[serde(default)]
        tool_use_id: Option<String>,
        #[serde(default)]
        is_error: bool,
        #[serde(default)]
        content: Value,
    },
    #[serde(other)]
    Other,
}

#[derive(Deserialize, Debug)]
pub struct MessagesResponse {
    #[serde(default)]
    pub content: Vec<ContentBlock>,
    #[serde(default)]
    pub stop_reason: Option<String>,
}
