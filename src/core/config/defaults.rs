use crate::core::config::data::{Config, McpProviderConfig, DEFAULT_PROVIDER};

impl Config {
    pub fn active_provider(&self) -> &str {
        self.active_provider
            .as_deref()
            .filter(|name| !name.trim().is_empty())
            .unwrap_or(DEFAULT_PROVIDER)
    }

    pub fn chat_model(&self, provider: &str) -> Option<&str> {
        self.models
            .get(&provider.to_lowercase())
            .and_then(|models| models.chat.as_deref())
    }

    pub fn image_model(&self, provider: &str) -> Option<&str> {
        self.models
            .get(&provider.to_lowercase())
            .and_then(|models| models.image.as_deref())
    }

    pub fn base_url_override(&self, provider: &str) -> Option<&str> {
        self.base_urls
            .get(&provider.to_lowercase())
            .map(String::as_str)
            .filter(|url| !url.trim().is_empty())
    }

    pub fn mcp_provider(&self, provider_id: &str) -> Option<&McpProviderConfig> {
        self.mcp_providers
            .iter()
            .find(|p| p.provider_id.eq_ignore_ascii_case(provider_id))
    }
}
