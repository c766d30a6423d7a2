//! The request/response boundary a UI process talks to.
//!
//! Channel names are the wire contract and never change. Arguments arrive as
//! a JSON object and are decoded into an [`IpcRequest`] before anything runs.

pub mod host;
pub mod server;

pub use host::{DialogHost, IpcHost, LogDialogHost};

use crate::core::config::McpProviderConfig;
use crate::error::AppError;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Channel {
    GetAppVersion,
    ShowMessageBox,
    ShowErrorBox,
    LogError,
    ChatSendMessage,
    ChatClearHistory,
    ChatGetHistory,
    ImageGenerate,
    StoreApiKey,
    GetApiKey,
    ClearApiKey,
    SetProvider,
    GetProviderName,
    ListProviders,
    McpListTools,
    McpStatus,
    McpSendMessage,
    McpGetStatus,
    McpGetContext,
    McpClearContext,
    McpRegisterProvider,
    McpUnregisterProvider,
}

impl Channel {
    pub const ALL: [Channel; 22] = [
        Channel::GetAppVersion,
        Channel::ShowMessageBox,
        Channel::ShowErrorBox,
        Channel::LogError,
        Channel::ChatSendMessage,
        Channel::ChatClearHistory,
        Channel::ChatGetHistory,
        Channel::ImageGenerate,
        Channel::StoreApiKey,
        Channel::GetApiKey,
        Channel::ClearApiKey,
        Channel::SetProvider,
        Channel::GetProviderName,
        Channel::ListProviders,
        Channel::McpListTools,
        Channel::McpStatus,
        Channel::McpSendMessage,
        Channel::McpGetStatus,
        Channel::McpGetContext,
        Channel::McpClearContext,
        Channel::McpRegisterProvider,
        Channel::McpUnregisterProvider,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Channel::GetAppVersion => "get-app-version",
            Channel::ShowMessageBox => "show-message-box",
            Channel::ShowErrorBox => "show-error-box",
            Channel::LogError => "log-error",
            Channel::ChatSendMessage => "chat-send-message",
            Channel::ChatClearHistory => "chat-clear-history",
            Channel::ChatGetHistory => "chat-get-history",
            Channel::ImageGenerate => "image-generate",
            Channel::StoreApiKey => "store-api-key",
            Channel::GetApiKey => "get-api-key",
            Channel::ClearApiKey => "clear-api-key",
            Channel::SetProvider => "set-provider",
            Channel::GetProviderName => "get-provider-name",
            Channel::ListProviders => "list-providers",
            Channel::McpListTools => "mcp-list-tools",
            Channel::McpStatus => "mcp-status",
            Channel::McpSendMessage => "mcp-send-message",
            Channel::McpGetStatus => "mcp-get-status",
            Channel::McpGetContext => "mcp-get-context",
            Channel::McpClearContext => "mcp-clear-context",
            Channel::McpRegisterProvider => "mcp-register-provider",
            Channel::McpUnregisterProvider => "mcp-unregister-provider",
        }
    }

    pub fn parse(name: &str) -> Option<Channel> {
        Channel::ALL
            .iter()
            .copied()
            .find(|channel| channel.as_str() == name)
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Options for a modal message box. Unknown fields are ignored.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageBoxOptions {
    #[serde(default, rename = "type")]
    pub kind: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    pub message: String,
    #[serde(default)]
    pub detail: Option<String>,
    #[serde(default)]
    pub buttons: Vec<String>,
    #[serde(default)]
    pub default_id: Option<usize>,
}

/// Index of the button the user picked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageBoxResult {
    pub response: usize,
}

/// An error the UI process reports for logging.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorReport {
    pub message: String,
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub stack: Option<String>,
    #[serde(default)]
    pub context: Map<String, Value>,
    #[serde(default)]
    pub timestamp: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum IpcRequest {
    GetAppVersion,
    ShowMessageBox(MessageBoxOptions),
    ShowErrorBox { title: String, content: String },
    LogError(ErrorReport),
    ChatSendMessage { text: String },
    ChatClearHistory,
    ChatGetHistory,
    ImageGenerate { prompt: String, provider: Option<String> },
    StoreApiKey { provider: String, key: String },
    GetApiKey { provider: String },
    ClearApiKey { provider: String },
    SetProvider { name: String },
    GetProviderName,
    ListProviders,
    McpListTools,
    McpStatus,
    McpSendMessage { provider: String, text: String },
    /// One provider's status, or every provider's when `provider` is unset.
    McpGetStatus { provider: Option<String> },
    McpGetContext { provider: String },
    McpClearContext { provider: String },
    McpRegisterProvider(McpProviderConfig),
    McpUnregisterProvider { provider: String },
}

#[derive(Deserialize)]
struct TextArgs {
    #[serde(alias = "message")]
    text: String,
}

#[derive(Deserialize)]
struct ErrorBoxArgs {
    title: String,
    content: String,
}

#[derive(Deserialize)]
struct ImageArgs {
    prompt: String,
    #[serde(default)]
    provider: Option<String>,
}

#[derive(Deserialize)]
struct StoreKeyArgs {
    provider: String,
    key: String,
}

#[derive(Deserialize)]
struct ProviderArgs {
    provider: String,
}

#[derive(Deserialize)]
struct OptionalProviderArgs {
    #[serde(default)]
    provider: Option<String>,
}

#[derive(Deserialize)]
struct McpSendArgs {
    provider: String,
    #[serde(alias = "message")]
    text: String,
}

#[derive(Deserialize)]
struct SetProviderArgs {
    #[serde(alias = "provider")]
    name: String,
}

fn decode<T: DeserializeOwned>(channel: Channel, args: Value) -> Result<T, AppError> {
    let args = if args.is_null() {
        Value::Object(Map::new())
    } else {
        args
    };
    serde_json::from_value(args)
        .map_err(|err| AppError::validation(format!("Invalid arguments for {channel}: {err}")))
}

impl IpcRequest {
    /// Decodes a request from its channel name and argument object.
    pub fn decode(channel: &str, args: Value) -> Result<IpcRequest, AppError> {
        let channel = Channel::parse(channel)
            .ok_or_else(|| AppError::validation(format!("Unknown channel: {channel}")))?;

        let request = match channel {
            Channel::GetAppVersion => IpcRequest::GetAppVersion,
            Channel::ShowMessageBox => IpcRequest::ShowMessageBox(decode(channel, args)?),
            Channel::ShowErrorBox => {
                let ErrorBoxArgs { title, content } = decode(channel, args)?;
                IpcRequest::ShowErrorBox { title, content }
            }
            Channel::LogError => IpcRequest::LogError(decode(channel, args)?),
            Channel::ChatSendMessage => {
                let TextArgs { text } = decode(channel, args)?;
                IpcRequest::ChatSendMessage { text }
            }
            Channel::ChatClearHistory => IpcRequest::ChatClearHistory,
            Channel::ChatGetHistory => IpcRequest::ChatGetHistory,
            Channel::ImageGenerate => {
                let ImageArgs { prompt, provider } = decode(channel, args)?;
                IpcRequest::ImageGenerate { prompt, provider }
            }
            Channel::StoreApiKey => {
                let StoreKeyArgs { provider, key } = decode(channel, args)?;
                IpcRequest::StoreApiKey { provider, key }
            }
            Channel::GetApiKey => {
                let ProviderArgs { provider } = decode(channel, args)?;
                IpcRequest::GetApiKey { provider }
            }
            Channel::ClearApiKey => {
                let ProviderArgs { provider } = decode(channel, args)?;
                IpcRequest::ClearApiKey { provider }
            }
            Channel::SetProvider => {
                let SetProviderArgs { name } = decode(channel, args)?;
                IpcRequest::SetProvider { name }
            }
            Channel::GetProviderName => IpcRequest::GetProviderName,
            Channel::ListProviders => IpcRequest::ListProviders,
            Channel::McpListTools => IpcRequest::McpListTools,
            Channel::McpStatus => IpcRequest::McpStatus,
            Channel::McpSendMessage => {
                let McpSendArgs { provider, text } = decode(channel, args)?;
                IpcRequest::McpSendMessage { provider, text }
            }
            Channel::McpGetStatus => {
                let OptionalProviderArgs { provider } = decode(channel, args)?;
                IpcRequest::McpGetStatus { provider }
            }
            Channel::McpGetContext => {
                let ProviderArgs { provider } = decode(channel, args)?;
                IpcRequest::McpGetContext { provider }
            }
            Channel::McpClearContext => {
                let ProviderArgs { provider } = decode(channel, args)?;
                IpcRequest::McpClearContext { provider }
            }
            Channel::McpRegisterProvider => {
                IpcRequest::McpRegisterProvider(decode(channel, args)?)
            }
            Channel::McpUnregisterProvider => {
                let ProviderArgs { provider } = decode(channel, args)?;
                IpcRequest::McpUnregisterProvider { provider }
            }
        };
        Ok(request)
    }

    pub fn channel(&self) -> Channel {
        match self {
            IpcRequest::GetAppVersion => Channel::GetAppVersion,
            IpcRequest::ShowMessageBox(_) => Channel::ShowMessageBox,
            IpcRequest::ShowErrorBox { .. } => Channel::ShowErrorBox,
            IpcRequest::LogError(_) => Channel::LogError,
            IpcRequest::ChatSendMessage { .. } => Channel::ChatSendMessage,
            IpcRequest::ChatClearHistory => Channel::ChatClearHistory,
            IpcRequest::ChatGetHistory => Channel::ChatGetHistory,
            IpcRequest::ImageGenerate { .. } => Channel::ImageGenerate,
            IpcRequest::StoreApiKey { .. } => Channel::StoreApiKey,
            IpcRequest::GetApiKey { .. } => Channel::GetApiKey,
            IpcRequest::ClearApiKey { .. } => Channel::ClearApiKey,
            IpcRequest::SetProvider { .. } => Channel::SetProvider,
            IpcRequest::GetProviderName => Channel::GetProviderName,
            IpcRequest::ListProviders => Channel::ListProviders,
            IpcRequest::McpListTools => Channel::McpListTools,
            IpcRequest::McpStatus => Channel::McpStatus,
            IpcRequest::McpSendMessage { .. } => Channel::McpSendMessage,
            IpcRequest::McpGetStatus { .. } => Channel::McpGetStatus,
            IpcRequest::McpGetContext { .. } => Channel::McpGetContext,
            IpcRequest::McpClearContext { .. } => Channel::McpClearContext,
            IpcRequest::McpRegisterProvider(_) => Channel::McpRegisterProvider,
            IpcRequest::McpUnregisterProvider { .. } => Channel::McpUnregisterProvider,
        }
    }
}
