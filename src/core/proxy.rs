//! Dispatch from the active provider name to a freshly built adapter.
//!
//! Nothing is cached: every `chat_service`/`image_service` call resolves the
//! provider in the catalog, looks up its key, and builds a new adapter, so a
//! key stored a moment ago takes effect on the next request.

use crate::adapters::anthropic::{AnthropicChat, AnthropicImages, McpAttachment, ToolCatalog};
use crate::adapters::dummy::{DummyChat, DummyImages};
use crate::adapters::gemini::{GeminiChat, GeminiImages};
use crate::adapters::http::{build_client, Endpoint};
use crate::adapters::openai::{OpenAiChat, OpenAiImages};
use crate::adapters::{ChatAdapter, ChatService, ImageService, ProviderError};
use crate::api::anthropic::McpServerEntry;
use crate::core::builtin_providers::{
    builtin_provider_ids, find_builtin_provider, BuiltinProvider, ProviderMode,
};
use crate::core::config::Config;
use crate::core::credentials::{process_env, resolve_api_key, EnvLookup, KeySource};
use crate::core::session::ChatSession;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, info, warn};

pub struct ProviderProxy {
    config: Mutex<Config>,
    config_path: Option<PathBuf>,
    keys: Arc<dyn KeySource>,
    client: reqwest::Client,
    tool_catalog: Option<Arc<dyn ToolCatalog>>,
    env: Box<EnvLookup>,
}

struct Resolved {
    provider: &'static BuiltinProvider,
    endpoint: Endpoint,
}

impl ProviderProxy {
    pub fn new(
        config: Config,
        config_path: Option<PathBuf>,
        keys: Arc<dyn KeySource>,
    ) -> Result<Self, ProviderError> {
        Ok(Self {
            config: Mutex::new(config),
            config_path,
            keys,
            client: build_client()?,
            tool_catalog: None,
            env: Box::new(process_env),
        })
    }

    pub fn with_http_client(mut self, client: reqwest::Client) -> Self {
        self.client = client;
        self
    }

    /// Source of MCP tool definitions for Anthropic requests.
    pub fn with_tool_catalog(mut self, catalog: Arc<dyn ToolCatalog>) -> Self {
        self.tool_catalog = Some(catalog);
        self
    }

    pub fn with_env(
        mut self,
        env: impl Fn(&str) -> Option<String> + Send + Sync + 'static,
    ) -> Self {
        self.env = Box::new(env);
        self
    }

    fn config(&self) -> MutexGuard<'_, Config> {
        self.config
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Selects `name` and persists the choice. Names are not validated
    /// here; an unknown name fails when a service is requested.
    pub fn set_provider(&self, name: &str) {
        let mut config = self.config();
        config.active_provider = Some(name.to_string());
        info!(provider = %name, "active provider changed");

        if let Some(path) = &self.config_path {
            if let Err(err) = config.save_to_path(path) {
                warn!(error = %err, "failed to persist provider selection");
            }
        }
    }

    pub fn provider_name(&self) -> String {
        self.config().active_provider().to_string()
    }

    pub fn list_providers(&self) -> Vec<String> {
        builtin_provider_ids()
    }

    fn resolve(&self, name: &str) -> Result<Resolved, ProviderError> {
        let provider = find_builtin_provider(name)
            .ok_or_else(|| ProviderError::UnknownProvider(name.to_string()))?;

        let api_key = if provider.requires_key() {
            resolve_api_key(
                self.keys.as_ref(),
                &provider.id,
                provider.env_key.as_deref(),
                self.env.as_ref(),
            )
        } else {
            String::new()
        };
        if provider.requires_key() && api_key.is_empty() {
            debug!(provider = %provider.id, "no API key found; sending without one");
        }

        let base_url = self
            .config()
            .base_url_override(&provider.id)
            .map(str::to_string)
            .unwrap_or_else(|| provider.base_url.clone());

        Ok(Resolved {
            provider,
            endpoint: Endpoint::new(self.client.clone(), base_url, api_key, provider.mode),
        })
    }

    fn mcp_attachment(&self) -> Option<McpAttachment> {
        let config = self.config();
        let url = config.mcp.active_url()?;
        Some(McpAttachment {
            server: McpServerEntry::url(url, config.mcp.display_name()),
            tools: self.tool_catalog.clone(),
        })
    }

    /// Builds a chat adapter for the active provider, bound to `session`.
    pub fn chat_service(
        &self,
        session: Arc<ChatSession>,
    ) -> Result<Box<dyn ChatService>, ProviderError> {
        let name = self.provider_name();
        let Resolved { provider, endpoint } = self.resolve(&name)?;
        let model = self
            .config()
            .chat_model(&provider.id)
            .map(str::to_string)
            .unwrap_or_else(|| provider.chat_model.clone());
        debug!(provider = %provider.id, %model, "building chat adapter");

        let service: Box<dyn ChatService> = match provider.mode {
            ProviderMode::OpenAi => {
                Box::new(ChatAdapter::new(OpenAiChat::new(endpoint, model), session))
            }
            ProviderMode::Anthropic => {
                let mut chat = AnthropicChat::new(endpoint, model);
                if let Some(attachment) = self.mcp_attachment() {
                    chat = chat.with_mcp(attachment);
                }
                Box::new(ChatAdapter::new(chat, session))
            }
            ProviderMode::Gemini => {
                Box::new(ChatAdapter::new(GeminiChat::new(endpoint, model), session))
            }
            ProviderMode::Dummy => Box::new(ChatAdapter::new(DummyChat, session)),
        };
        Ok(service)
    }

    /// Builds an image adapter for `provider`, or for the active provider
    /// when none is given.
    pub fn image_service(
        &self,
        provider: Option<&str>,
    ) -> Result<Box<dyn ImageService>, ProviderError> {
        let name = provider
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| self.provider_name());
        let Resolved { provider, endpoint } = self.resolve(&name)?;

        let model = self
            .config()
            .image_model(&provider.id)
            .map(str::to_string)
            .or_else(|| provider.image_model.clone());
        debug!(provider = %provider.id, model = ?model, "building image adapter");

        let service: Box<dyn ImageService> = match (provider.mode, model) {
            (ProviderMode::Dummy, _) => Box::new(DummyImages),
            (ProviderMode::OpenAi, Some(model)) => Box::new(OpenAiImages::new(endpoint, model)),
            (ProviderMode::Gemini, Some(model)) => Box::new(GeminiImages::new(endpoint, model)),
            (ProviderMode::Anthropic, _) => Box::new(AnthropicImages),
            (_, None) => {
                return Err(ProviderError::Unsupported(format!(
                    "{} does not support image generation",
                    provider.display_name
                )))
            }
        };
        Ok(service)
    }
}
