//! JSON-RPC envelope helpers shared by every MCP transport.

use rust_mcp_schema::schema_utils::{
    ClientMessage, FromMessage, MessageFromClient, NotificationFromClient, RequestFromClient,
    ServerMessage,
};
use rust_mcp_schema::{
    CallToolResult, ClientCapabilities, Implementation, InitializeRequestParams, InitializeResult,
    ListToolsResult, PaginatedRequestParams, RequestId, RpcError, LATEST_PROTOCOL_VERSION,
};
use serde_json::Value;

/// JSON-RPC code used by servers to indicate unsupported methods.
pub const MCP_METHOD_NOT_FOUND: i64 = -32601;

pub fn requested_protocol_version(configured: Option<&str>) -> String {
    configured
        .map(str::trim)
        .filter(|version| !version.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| LATEST_PROTOCOL_VERSION.to_string())
}

pub fn effective_protocol_version(configured: Option<&str>, negotiated: Option<&str>) -> String {
    match negotiated {
        Some(version) if !version.trim().is_empty() => version.to_string(),
        _ => requested_protocol_version(configured),
    }
}

pub fn client_details(protocol_version: String) -> InitializeRequestParams {
    InitializeRequestParams {
        capabilities: ClientCapabilities::default(),
        client_info: Implementation {
            name: "keipes".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            title: Some("Keipes MCP Client".to_string()),
            description: Some("Keipes desktop client tool bridge".to_string()),
            icons: Vec::new(),
            website_url: None,
        },
        meta: None,
        protocol_version,
    }
}

pub fn paginated_params(cursor: Option<String>) -> Option<PaginatedRequestParams> {
    cursor.map(|cursor| PaginatedRequestParams {
        cursor: Some(cursor),
        meta: None,
    })
}

pub fn request_message(request: RequestFromClient, id: i64) -> Result<ClientMessage, String> {
    ClientMessage::from_message(
        MessageFromClient::RequestFromClient(request),
        Some(RequestId::Integer(id)),
    )
    .map_err(|err| err.to_string())
}

pub fn initialized_notification() -> Result<ClientMessage, String> {
    ClientMessage::from_message(
        MessageFromClient::NotificationFromClient(NotificationFromClient::InitializedNotification(
            None,
        )),
        None,
    )
    .map_err(|err| err.to_string())
}

/// Numeric id of a raw JSON-RPC frame, if it carries one.
pub fn frame_id(frame: &Value) -> Option<i64> {
    frame.get("id").and_then(Value::as_i64)
}

pub fn is_method_not_found(message: &ServerMessage) -> bool {
    matches!(
        message,
        ServerMessage::Error(error) if error.error.code == MCP_METHOD_NOT_FOUND
    )
}

pub fn parse_initialize_result(message: ServerMessage) -> Result<InitializeResult, String> {
    let value = parse_response_value(message)?;
    let result =
        serde_json::from_value::<InitializeResult>(value).map_err(|err| err.to_string())?;
    if result.protocol_version.trim().is_empty() {
        return Err("Unexpected initialize response.".to_string());
    }
    Ok(result)
}

pub fn parse_list_tools(message: ServerMessage) -> Result<ListToolsResult, String> {
    parse_response(message)
}

pub fn parse_call_tool(message: ServerMessage) -> Result<CallToolResult, String> {
    parse_response(message)
}

fn parse_response<T: serde::de::DeserializeOwned>(message: ServerMessage) -> Result<T, String> {
    let value = parse_response_value(message)?;
    serde_json::from_value::<T>(value).map_err(|err| err.to_string())
}

pub fn parse_response_value(message: ServerMessage) -> Result<Value, String> {
    match message {
        ServerMessage::Response(response) => {
            serde_json::to_value(&response.result).map_err(|err| err.to_string())
        }
        ServerMessage::Error(error) => Err(format_rpc_error(&error.error)),
        other => Err(format_unexpected_server_message(&other)),
    }
}

pub fn format_unexpected_server_message(message: &ServerMessage) -> String {
    format!("Unexpected MCP server message: {message:?}")
}

pub fn format_rpc_error(error: &RpcError) -> String {
    let mut output = format!("MCP error {}: {}", error.code, error.message);
    if let Some(data) = &error.data {
        let details = data
            .get("details")
            .and_then(|value| value.as_str())
            .map(|value| value.to_string())
            .or_else(|| data.as_str().map(|value| value.to_string()));

        if let Some(details) = details {
            if !details.is_empty() {
                output.push_str(": ");
                output.push_str(&details);
            }
        }
    }
    output
}
