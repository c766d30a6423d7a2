//! Tool manifest snapshot and argument checking.

use crate::api::anthropic::ToolDefinition;
use crate::mcp::error::McpClientError;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Upper bound on tools kept from a paginated `tools/list`.
pub const MCP_MAX_TOOL_LIST: usize = 100;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct McpTool {
    pub name: String,
    pub description: Option<String>,
    pub input_schema: Value,
}

impl McpTool {
    pub fn from_schema_tool(tool: &rust_mcp_schema::Tool) -> Self {
        // The schema type serializes with camelCase keys.
        let input_schema = serde_json::to_value(tool)
            .ok()
            .and_then(|value| value.get("inputSchema").cloned())
            .unwrap_or_else(|| serde_json::json!({"type": "object"}));
        Self {
            name: tool.name.clone(),
            description: tool.description.clone(),
            input_schema,
        }
    }

    pub fn to_definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: self.name.clone(),
            description: self.description.clone(),
            input_schema: self.input_schema.clone(),
        }
    }

    /// Checks call arguments against the tool's input schema.
    pub fn validate_arguments(&self, arguments: &Map<String, Value>) -> Result<(), McpClientError> {
        let validator = jsonschema::validator_for(&self.input_schema).map_err(|err| {
            McpClientError::Protocol(format!(
                "tool '{}' has an invalid input schema: {err}",
                self.name
            ))
        })?;
        let instance = Value::Object(arguments.clone());
        if validator.is_valid(&instance) {
            return Ok(());
        }
        let errors = validator
            .iter_errors(&instance)
            .map(|error| error.to_string())
            .collect();
        Err(McpClientError::InvalidArguments {
            tool: self.name.clone(),
            errors,
        })
    }
}

pub fn to_definitions(tools: &[McpTool]) -> Vec<ToolDefinition> {
    tools.iter().map(McpTool::to_definition).collect()
}
