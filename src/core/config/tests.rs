use super::data::{Config, McpProviderConfig, McpSettings, ModelOverrides};
use super::io::{AppPaths, ConfigError};
use tempfile::TempDir;

#[test]
fn test_load_nonexistent_config() {
    let temp_dir = TempDir::new().expect("Failed to create temp directory");
    let config_path = temp_dir.path().join("nonexistent_config.toml");

    let config = Config::load_from_path(&config_path).expect("Failed to load config");

    assert_eq!(config.active_provider, None);
    assert_eq!(config.active_provider(), "openai");
}

#[test]
fn test_config_persistence_lifecycle() {
    let temp_dir = TempDir::new().expect("Failed to create temp directory");
    let config_path = temp_dir.path().join("nested").join("config.toml");

    let mut config = Config {
        active_provider: Some("anthropic".to_string()),
        ..Default::default()
    };
    config.models.insert(
        "anthropic".to_string(),
        ModelOverrides {
            chat: Some("claude-3-haiku-20240307".to_string()),
            image: None,
        },
    );
    config
        .save_to_path(&config_path)
        .expect("Failed to save config");

    let mut loaded = Config::load_from_path(&config_path).expect("Failed to load config");
    assert_eq!(loaded.active_provider(), "anthropic");
    assert_eq!(
        loaded.chat_model("anthropic"),
        Some("claude-3-haiku-20240307")
    );
    assert_eq!(loaded.image_model("anthropic"), None);

    loaded.active_provider = None;
    loaded.save_to_path(&config_path).expect("resave failed");
    let reloaded = Config::load_from_path(&config_path).expect("reload failed");
    assert_eq!(reloaded.active_provider, None);
}

#[test]
fn blank_active_provider_falls_back_to_default() {
    let config = Config {
        active_provider: Some("   ".to_string()),
        ..Default::default()
    };
    assert_eq!(config.active_provider(), "openai");
}

#[test]
fn invalid_toml_reports_parse_error() {
    let temp_dir = TempDir::new().unwrap();
    let config_path = temp_dir.path().join("config.toml");
    std::fs::write(&config_path, "active_provider = [").unwrap();

    let err = Config::load_from_path(&config_path).expect_err("parse should fail");
    assert!(matches!(err, ConfigError::Parse { .. }));
    assert!(err.to_string().contains("Failed to parse config"));
}

#[test]
fn mcp_settings_only_expose_url_when_enabled() {
    let mut settings = McpSettings {
        server_url: Some("wss://tools.example.com/mcp".to_string()),
        ..Default::default()
    };
    assert_eq!(settings.active_url(), None);

    settings.enabled = true;
    assert_eq!(settings.active_url(), Some("wss://tools.example.com/mcp"));
    assert_eq!(settings.timeout_secs(), 30);

    settings.server_url = Some("  ".to_string());
    assert_eq!(settings.active_url(), None);
}

#[test]
fn mcp_provider_api_key_is_never_written() {
    let temp_dir = TempDir::new().unwrap();
    let config_path = temp_dir.path().join("config.toml");

    let mut provider = McpProviderConfig::new("openai-mcp", "OpenAI MCP Provider");
    provider.api_key = Some("sk-secret".to_string());
    let mut config = Config::default();
    config.mcp_providers.push(provider);
    config.save_to_path(&config_path).unwrap();

    let raw = std::fs::read_to_string(&config_path).unwrap();
    assert!(!raw.contains("sk-secret"));

    let loaded = Config::load_from_path(&config_path).unwrap();
    let entry = loaded.mcp_provider("OPENAI-MCP").expect("provider persisted");
    assert_eq!(entry.name, "OpenAI MCP Provider");
    assert_eq!(entry.api_key, None);
}

#[test]
fn context_limit_is_optional() {
    let config: Config = toml::from_str("active_provider = \"gemini\"").unwrap();
    assert_eq!(config.max_context_messages, None);

    let config: Config = toml::from_str("max_context_messages = 20").unwrap();
    assert_eq!(config.max_context_messages, Some(20));
}

#[test]
fn mcp_provider_lookup_ignores_case() {
    let mut config = Config::default();
    config
        .mcp_providers
        .push(McpProviderConfig::new("openai-mcp", "OpenAI MCP Provider"));
    assert!(config.mcp_provider("OpenAI-MCP").is_some());
    assert!(config.mcp_provider("anthropic-mcp").is_none());
}

#[test]
fn app_paths_under_root_layout() {
    let temp_dir = TempDir::new().unwrap();
    let paths = AppPaths::under(temp_dir.path());
    assert_eq!(
        paths.config_file(),
        temp_dir.path().join("config").join("config.toml")
    );
    assert_eq!(
        paths.credentials_dir(),
        temp_dir.path().join("data").join("credentials")
    );
    assert_eq!(
        paths.mcp_contexts_file(),
        temp_dir.path().join("data").join("mcp_contexts.json")
    );
}
