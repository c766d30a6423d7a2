use super::*;
use crate::core::credentials::CredentialError;
use crate::utils::test_utils::{start_silent_server, test_client, StubResponse, StubServer};
use serde_json::json;
use tempfile::TempDir;

struct NoKeys;

impl KeySource for NoKeys {
    fn get_api_key(&self, _provider: &str) -> Result<Option<String>, CredentialError> {
        Ok(None)
    }
}

fn service(store_path: Option<PathBuf>) -> McpContextService {
    McpContextService::new(test_client(), Arc::new(NoKeys), store_path).with_env(|_| None)
}

fn openai_provider(base_url: &str) -> Arc<dyn ContextProvider> {
    Arc::new(OpenAiContextProvider::connect(
        test_client(),
        base_url,
        "sk-test",
        OPENAI_MCP_DEFAULT_MODEL,
        Duration::from_secs(30),
    ))
}

fn completion(text: &str) -> StubResponse {
    StubResponse::json(
        200,
        json!({"choices":[{"message":{"role":"assistant","content": text},"finish_reason":"stop"}]}),
    )
}

#[tokio::test]
async fn timeout_resolves_to_recoverable_failure() {
    let url = start_silent_server().await;
    let service = service(None);
    service.register(openai_provider(&url), 0);

    let response = service
        .send_message(
            OPENAI_MCP_PROVIDER_ID,
            "hello",
            SendOptions {
                timeout: Some(Duration::from_millis(200)),
            },
        )
        .await
        .unwrap();

    assert!(!response.success);
    let error = response.error.unwrap();
    assert_eq!(error.code, McpErrorCode::McpTimeoutError);
    assert!(error.recoverable);

    let status = service.get_status(OPENAI_MCP_PROVIDER_ID).await.unwrap();
    assert_eq!(status.status, ProviderState::Error);
    assert_eq!(status.error_count, 1);

    let context = service.context(OPENAI_MCP_PROVIDER_ID).await.unwrap().unwrap();
    assert_eq!(context.messages.len(), 1);
    assert_eq!(context.messages[0].role, McpRole::User);
}

#[tokio::test]
async fn server_errors_are_recoverable_client_errors_are_not() {
    let cases = [
        (503, true, McpErrorCode::McpMessageSendFailed),
        (400, false, McpErrorCode::McpMessageSendFailed),
        (401, false, McpErrorCode::McpAuthenticationError),
        (429, false, McpErrorCode::McpRateLimitExceeded),
    ];
    for (status, recoverable, code) in cases {
        let server = StubServer::start(vec![StubResponse::json(
            status,
            json!({"error":{"message":"nope"}}),
        )])
        .await;
        let service = service(None);
        service.register(openai_provider(&server.base_url), 0);

        let response = service
            .send_message(OPENAI_MCP_PROVIDER_ID, "hello", SendOptions::default())
            .await
            .unwrap();
        let error = response.error.unwrap();
        assert_eq!(error.recoverable, recoverable, "status {status}");
        assert_eq!(error.code, code, "status {status}");
        assert!(error.message.contains("nope"));
    }
}

#[tokio::test]
async fn successful_send_records_both_turns_and_emits_events() {
    let server = StubServer::start(vec![completion("Hi there")]).await;
    let service = service(None);
    let mut events = service.subscribe();
    service.register(openai_provider(&server.base_url), 0);

    let response = service
        .send_message(OPENAI_MCP_PROVIDER_ID, "hello", SendOptions::default())
        .await
        .unwrap();
    assert!(response.success);
    assert_eq!(response.message.unwrap().content, "Hi there");
    let context = response.context.unwrap();
    assert_eq!(context.messages.len(), 2);
    assert!(context.messages[0].timestamp <= context.messages[1].timestamp);

    let body = server.requests()[0].json();
    assert_eq!(body["model"], "gpt-3.5-turbo");
    assert_eq!(body["max_tokens"], 1000);
    assert_eq!(body["temperature"].as_f64(), Some(0.7));
    assert_eq!(body["messages"][0]["role"], "user");

    assert!(matches!(
        events.recv().await.unwrap(),
        McpEvent::ProviderRegistered { .. }
    ));
    assert!(matches!(
        events.recv().await.unwrap(),
        McpEvent::MessageSent { .. }
    ));
    assert!(matches!(
        events.recv().await.unwrap(),
        McpEvent::MessageReceived { .. }
    ));

    let status = service.get_status(OPENAI_MCP_PROVIDER_ID).await.unwrap();
    assert_eq!(status.status, ProviderState::Active);
    assert_eq!(status.context_count, 1);
    assert!(status.capabilities.contains(&"context-management".to_string()));
}

#[tokio::test]
async fn recoverable_failures_are_retried() {
    let server = StubServer::start(vec![
        StubResponse::json(502, json!({"error":{"message":"bad gateway"}})),
        completion("second time lucky"),
    ])
    .await;
    let service = service(None);
    service.register(openai_provider(&server.base_url), 2);

    let response = service
        .send_message(OPENAI_MCP_PROVIDER_ID, "hello", SendOptions::default())
        .await
        .unwrap();
    assert!(response.success);
    assert_eq!(server.requests().len(), 2);
}

#[tokio::test]
async fn unknown_provider_is_an_error() {
    let service = service(None);
    let err = service
        .send_message("missing", "hello", SendOptions::default())
        .await
        .unwrap_err();
    assert_eq!(err.code(), McpErrorCode::McpProviderNotFound);
    assert_eq!(
        service.get_status("missing").await.unwrap_err().code(),
        McpErrorCode::McpProviderNotFound
    );
    assert!(service.clear_context("missing").await.is_err());
    assert!(service.unregister_provider("missing").is_err());
}

#[tokio::test]
async fn contexts_survive_a_restart_and_clear_removes_them() {
    let dir = TempDir::new().unwrap();
    let store = dir.path().join("mcp_contexts.json");
    let server = StubServer::start(vec![completion("Noted")]).await;

    let first = service(Some(store.clone()));
    first.register(openai_provider(&server.base_url), 0);
    first
        .send_message(OPENAI_MCP_PROVIDER_ID, "remember me", SendOptions::default())
        .await
        .unwrap();
    let saved = first.context(OPENAI_MCP_PROVIDER_ID).await.unwrap().unwrap();

    let raw: serde_json::Value = serde_json::from_slice(&std::fs::read(&store).unwrap()).unwrap();
    let key = format!("{OPENAI_MCP_PROVIDER_ID}:{}", saved.session_id);
    assert!(raw.get(&key).is_some());

    let second = service(Some(store.clone()));
    second.register(openai_provider(&server.base_url), 0);
    let restored = second.context(OPENAI_MCP_PROVIDER_ID).await.unwrap().unwrap();
    assert_eq!(restored, saved);

    second.clear_context(OPENAI_MCP_PROVIDER_ID).await.unwrap();
    assert_eq!(second.context(OPENAI_MCP_PROVIDER_ID).await.unwrap(), None);
    let status = second.get_status(OPENAI_MCP_PROVIDER_ID).await.unwrap();
    assert_eq!(status.context_count, 0);
    let raw: serde_json::Value = serde_json::from_slice(&std::fs::read(&store).unwrap()).unwrap();
    assert_eq!(raw, json!({}));
}

#[tokio::test]
async fn registration_from_config() {
    let service = service(None);

    let config = McpProviderConfig::new(OPENAI_MCP_PROVIDER_ID, "OpenAI MCP Provider");
    let err = service.register_provider(&config).unwrap_err();
    assert_eq!(err.code(), McpErrorCode::McpConfigurationError);

    let mut with_key = config.clone();
    with_key.api_key = Some("sk-config".to_string());
    service.register_provider(&with_key).unwrap();
    assert_eq!(service.registered_providers(), vec![OPENAI_MCP_PROVIDER_ID]);

    let unknown = McpProviderConfig::new("claude-mcp", "Claude");
    assert_eq!(
        service.register_provider(&unknown).unwrap_err().code(),
        McpErrorCode::McpProviderNotFound
    );

    service.unregister_provider(OPENAI_MCP_PROVIDER_ID).unwrap();
    assert!(service.registered_providers().is_empty());
}

#[tokio::test]
async fn env_key_is_used_when_store_is_empty() {
    let server = StubServer::start(vec![completion("ok")]).await;
    let service = McpContextService::new(test_client(), Arc::new(NoKeys), None)
        .with_env(|name| (name == "OPENAI_API_KEY").then(|| "sk-env".to_string()));

    let mut config = McpProviderConfig::new(OPENAI_MCP_PROVIDER_ID, "OpenAI MCP Provider");
    config.endpoint = Some(server.base_url.clone());
    service.register_provider(&config).unwrap();
    service
        .send_message(OPENAI_MCP_PROVIDER_ID, "hi", SendOptions::default())
        .await
        .unwrap();

    assert_eq!(
        server.requests()[0].headers["authorization"],
        "Bearer sk-env"
    );
}

#[tokio::test]
async fn empty_messages_are_rejected_without_recording() {
    let service = service(None);
    service.register(openai_provider("http://127.0.0.1:9"), 0);
    let response = service
        .send_message(OPENAI_MCP_PROVIDER_ID, "   ", SendOptions::default())
        .await
        .unwrap();
    assert!(!response.success);
    let context = service.context(OPENAI_MCP_PROVIDER_ID).await.unwrap().unwrap();
    assert!(context.messages.is_empty());
}

#[tokio::test]
async fn defaults_register_openai_when_a_key_exists() {
    let service = service(None);
    assert_eq!(service.register_defaults(&[]), 0);
    assert!(service.all_statuses().await.is_empty());

    let service = McpContextService::new(test_client(), Arc::new(NoKeys), None)
        .with_env(|name| (name == "OPENAI_API_KEY").then(|| "sk-env".to_string()));
    assert_eq!(service.register_defaults(&[]), 1);
    let statuses = service.all_statuses().await;
    assert_eq!(statuses.len(), 1);
    assert_eq!(statuses[0].provider_id, OPENAI_MCP_PROVIDER_ID);
    assert_eq!(statuses[0].status, ProviderState::Idle);
}

#[tokio::test]
async fn configured_providers_replace_the_default() {
    let service = McpContextService::new(test_client(), Arc::new(NoKeys), None)
        .with_env(|name| (name == "OPENAI_API_KEY").then(|| "sk-env".to_string()));
    let configured = [
        McpProviderConfig::new("claude-mcp", "Claude"),
        McpProviderConfig::new(OPENAI_MCP_PROVIDER_ID, "Team OpenAI"),
    ];
    assert_eq!(service.register_defaults(&configured), 1);
    assert_eq!(service.registered_providers(), vec![OPENAI_MCP_PROVIDER_ID]);
}
