//! Built-in provider catalog
//!
//! The set of providers is closed: it is loaded from `builtin_providers.toml`,
//! embedded at build time, and every entry maps onto one adapter family
//! through its [`ProviderMode`].

use serde::{Deserialize, Serialize};
use std::sync::OnceLock;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderMode {
    OpenAi,
    Anthropic,
    Gemini,
    Dummy,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuiltinProvider {
    pub id: String,
    pub display_name: String,
    #[serde(default)]
    pub base_url: String,
    pub mode: ProviderMode,
    /// Environment variable consulted when no stored key exists.
    pub env_key: Option<String>,
    pub chat_model: String,
    pub image_model: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
struct BuiltinProvidersConfig {
    providers: Vec<BuiltinProvider>,
}

impl BuiltinProvider {
    pub fn requires_key(&self) -> bool {
        self.mode != ProviderMode::Dummy
    }
}

/// Load built-in providers from the embedded configuration
pub fn load_builtin_providers() -> &'static [BuiltinProvider] {
    static PROVIDERS: OnceLock<Vec<BuiltinProvider>> = OnceLock::new();
    PROVIDERS.get_or_init(|| {
        const CONFIG_CONTENT: &str = include_str!("../builtin_providers.toml");

        let config: BuiltinProvidersConfig =
            toml::from_str(CONFIG_CONTENT).expect("Failed to parse builtin_providers.toml");

        config.providers
    })
}

/// Find a built-in provider by ID (case-insensitive)
pub fn find_builtin_provider(id: &str) -> Option<&'static BuiltinProvider> {
    load_builtin_providers()
        .iter()
        .find(|p| p.id.eq_ignore_ascii_case(id.trim()))
}

pub fn builtin_provider_ids() -> Vec<String> {
    load_builtin_providers()
        .iter()
        .map(|p| p.id.clone())
        .collect()
}
