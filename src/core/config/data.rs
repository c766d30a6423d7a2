use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

pub const DEFAULT_PROVIDER: &str = "openai";
pub const DEFAULT_MCP_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_MCP_RECONNECT_ATTEMPTS: u32 = 5;

/// Per-provider model overrides. Unset fields fall back to the catalog defaults.
#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq, Eq)]
pub struct ModelOverrides {
    pub chat: Option<String>,
    pub image: Option<String>,
}

/// Remote MCP tool server settings.
#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq, Eq)]
pub struct McpSettings {
    /// Attach the tool server to outbound chat requests.
    #[serde(default)]
    pub enabled: bool,
    pub server_url: Option<String>,
    /// Name reported to the vendor for the remote server entry.
    pub server_name: Option<String>,
    /// `http` or `websocket`. Inferred from the URL scheme when unset.
    pub transport: Option<String>,
    pub protocol_version: Option<String>,
    pub timeout_secs: Option<u64>,
    pub max_reconnect_attempts: Option<u32>,
}

impl McpSettings {
    pub fn timeout_secs(&self) -> u64 {
        self.timeout_secs.unwrap_or(DEFAULT_MCP_TIMEOUT_SECS)
    }

    pub fn max_reconnect_attempts(&self) -> u32 {
        self.max_reconnect_attempts
            .unwrap_or(DEFAULT_MCP_RECONNECT_ATTEMPTS)
    }

    pub fn display_name(&self) -> &str {
        self.server_name.as_deref().unwrap_or("keipes-mcp")
    }

    /// Returns the server URL when the tool server should be used.
    pub fn active_url(&self) -> Option<&str> {
        if !self.enabled {
            return None;
        }
        self.server_url
            .as_deref()
            .map(str::trim)
            .filter(|url| !url.is_empty())
    }
}

/// Configuration for an MCP context provider (a chat backend that keeps a
/// per-provider conversation context).
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct McpProviderConfig {
    pub provider_id: String,
    pub name: String,
    /// Credential store entry used to look up the key when `api_key` is unset.
    pub key_provider: Option<String>,
    #[serde(skip_serializing)]
    pub api_key: Option<String>,
    pub endpoint: Option<String>,
    pub model: Option<String>,
    pub timeout_secs: Option<u64>,
    pub retry_attempts: Option<u32>,
}

impl McpProviderConfig {
    pub fn new(provider_id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            provider_id: provider_id.into(),
            name: name.into(),
            key_provider: None,
            api_key: None,
            endpoint: None,
            model: None,
            timeout_secs: None,
            retry_attempts: None,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Default, Clone)]
pub struct Config {
    /// Provider selected for chat and image requests.
    pub active_provider: Option<String>,
    /// Most recent messages sent as chat context. Unset sends everything.
    pub max_context_messages: Option<usize>,
    #[serde(default)]
    pub models: HashMap<String, ModelOverrides>,
    /// Base URL overrides keyed by provider id, mostly for proxies and tests.
    #[serde(default)]
    pub base_urls: HashMap<String, String>,
    #[serde(default)]
    pub mcp: McpSettings,
    #[serde(default)]
    pub mcp_providers: Vec<McpProviderConfig>,
}

/// Get a user-friendly display string for a path
/// Converts absolute paths to use ~ notation on Unix-like systems when possible
pub fn path_display<P: AsRef<Path>>(path: P) -> String {
    let path = path.as_ref();

    #[cfg(unix)]
    {
        if let Some(home) = std::env::var_os("HOME") {
            let home_path = PathBuf::from(home);
            if let Ok(relative) = path.strip_prefix(&home_path) {
                return format!("~/{}", relative.display());
            }
        }
    }

    path.display().to_string()
}
