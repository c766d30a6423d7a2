//! Registry of MCP context providers.
//!
//! Each registered provider owns one conversation context. Sends are
//! serialized per provider; vendor failures and timeouts come back as an
//! unsuccessful [`McpResponse`] rather than an error.

use crate::adapters::ProviderError;
use crate::core::builtin_providers::find_builtin_provider;
use crate::core::config::io::write_atomic;
use crate::core::config::McpProviderConfig;
use crate::core::credentials::{resolve_api_key, EnvLookup, KeySource};
use crate::core::message::now_rfc3339;
use crate::mcp::events::{EventBus, McpEvent};
use crate::mcp::openai_provider::{
    OpenAiContextProvider, OPENAI_MCP_DEFAULT_ENDPOINT, OPENAI_MCP_DEFAULT_MODEL,
    OPENAI_MCP_PROVIDER_ID, OPENAI_MCP_PROVIDER_NAME,
};
use crate::mcp::types::{
    McpContext, McpError, McpErrorCode, McpMessage, McpProviderStatus, McpResponse, McpRole,
    McpServiceError, ProviderState, SendOptions,
};
use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex as StdMutex, RwLock};
use std::time::Duration;
use tokio::sync::{broadcast, Mutex};
use tracing::{info, warn};

/// A chat backend that answers from a conversation context.
#[async_trait]
pub trait ContextProvider: Send + Sync {
    fn id(&self) -> &str;

    fn capabilities(&self) -> Vec<String>;

    fn default_timeout(&self) -> Duration;

    /// Produces the assistant reply. The last message is the new user turn.
    async fn respond(&self, context: &McpContext) -> Result<String, ProviderError>;
}

struct SlotState {
    context: Option<McpContext>,
    last_activity: Option<String>,
    error_count: u32,
    last_failed: bool,
}

struct ProviderSlot {
    provider: Arc<dyn ContextProvider>,
    retry_attempts: u32,
    state: Mutex<SlotState>,
}

pub struct McpContextService {
    client: reqwest::Client,
    keys: Arc<dyn KeySource>,
    env: Box<EnvLookup>,
    slots: RwLock<HashMap<String, Arc<ProviderSlot>>>,
    /// Snapshot of every provider's context, keyed `provider:session`.
    persisted: StdMutex<BTreeMap<String, McpContext>>,
    store_path: Option<PathBuf>,
    events: EventBus,
    ids: AtomicU64,
}

impl McpContextService {
    /// Creates the service, restoring contexts saved at `store_path`.
    pub fn new(
        client: reqwest::Client,
        keys: Arc<dyn KeySource>,
        store_path: Option<PathBuf>,
    ) -> Self {
        let persisted = store_path
            .as_deref()
            .map(load_contexts)
            .unwrap_or_default();
        Self {
            client,
            keys,
            env: Box::new(crate::core::credentials::process_env),
            slots: RwLock::new(HashMap::new()),
            persisted: StdMutex::new(persisted),
            store_path,
            events: EventBus::default(),
            ids: AtomicU64::new(0),
        }
    }

    pub fn with_env(
        mut self,
        env: impl Fn(&str) -> Option<String> + Send + Sync + 'static,
    ) -> Self {
        self.env = Box::new(env);
        self
    }

    pub fn subscribe(&self) -> broadcast::Receiver<McpEvent> {
        self.events.subscribe()
    }

    pub fn registered_providers(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.read_slots().keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Builds the provider named by `config.provider_id` and registers it.
    pub fn register_provider(&self, config: &McpProviderConfig) -> Result<(), McpServiceError> {
        let provider = self.build_provider(config)?;
        self.register(provider, config.retry_attempts.unwrap_or(0));
        info!(provider = %config.provider_id, name = %config.name, "MCP provider registered");
        Ok(())
    }

    /// Registers every configured provider, or the OpenAI provider when none
    /// is configured. Failures are logged and skipped. Returns how many
    /// providers were registered.
    pub fn register_defaults(&self, configured: &[McpProviderConfig]) -> usize {
        let fallback = [McpProviderConfig::new(
            OPENAI_MCP_PROVIDER_ID,
            OPENAI_MCP_PROVIDER_NAME,
        )];
        let configs = if configured.is_empty() {
            &fallback[..]
        } else {
            configured
        };

        let mut registered = 0;
        for config in configs {
            match self.register_provider(config) {
                Ok(()) => registered += 1,
                Err(err) => {
                    warn!(provider = %config.provider_id, error = %err, "skipping MCP provider");
                }
            }
        }
        registered
    }

    /// Registers an already constructed provider, replacing any previous one
    /// with the same id. A saved context for the id is restored.
    pub fn register(&self, provider: Arc<dyn ContextProvider>, retry_attempts: u32) {
        let provider_id = provider.id().to_string();
        let restored = self.restored_context(&provider_id);
        let context = restored.unwrap_or_else(|| McpContext::new(self.session_id(&provider_id)));

        let slot = Arc::new(ProviderSlot {
            provider,
            retry_attempts,
            state: Mutex::new(SlotState {
                context: Some(context),
                last_activity: None,
                error_count: 0,
                last_failed: false,
            }),
        });
        self.write_slots().insert(provider_id.clone(), slot);
        self.events
            .publish(McpEvent::ProviderRegistered { provider_id });
    }

    pub fn unregister_provider(&self, provider_id: &str) -> Result<(), McpServiceError> {
        if self.write_slots().remove(provider_id).is_none() {
            return Err(McpServiceError::provider_not_found(provider_id));
        }
        self.replace_persisted(provider_id, None);
        self.events.publish(McpEvent::ProviderUnregistered {
            provider_id: provider_id.to_string(),
        });
        info!(provider = %provider_id, "MCP provider unregistered");
        Ok(())
    }

    pub async fn send_message(
        &self,
        provider_id: &str,
        text: &str,
        options: SendOptions,
    ) -> Result<McpResponse, McpServiceError> {
        let slot = self.slot(provider_id)?;
        if text.trim().is_empty() {
            return Ok(McpResponse::failed(McpError::new(
                McpErrorCode::McpMessageSendFailed,
                "Message cannot be empty",
                false,
            )));
        }

        let mut state = slot.state.lock().await;
        let mut context = match state.context.take() {
            Some(context) => context,
            None => McpContext::new(self.session_id(provider_id)),
        };
        let user = McpMessage::new(self.message_id(), McpRole::User, text);
        context.push(user.clone());
        self.events.publish(McpEvent::MessageSent {
            provider_id: provider_id.to_string(),
            message: user,
        });

        let timeout = options
            .timeout
            .unwrap_or_else(|| slot.provider.default_timeout());
        let outcome = self.respond_with_retry(&slot, &context, timeout).await;
        state.last_activity = Some(now_rfc3339());

        let response = match outcome {
            Ok(content) => {
                state.last_failed = false;
                let reply = McpMessage::new(self.message_id(), McpRole::Assistant, content);
                if !reply.content.trim().is_empty() {
                    context.push(reply.clone());
                }
                self.events.publish(McpEvent::MessageReceived {
                    provider_id: provider_id.to_string(),
                    message: reply.clone(),
                });
                McpResponse::ok(reply, context.clone())
            }
            Err(error) => {
                state.last_failed = true;
                state.error_count += 1;
                warn!(
                    provider = %provider_id,
                    code = %error.code,
                    error = %error.message,
                    "MCP send failed"
                );
                self.events.publish(McpEvent::ErrorOccurred {
                    provider_id: provider_id.to_string(),
                    error: error.clone(),
                });
                McpResponse::failed(error)
            }
        };

        self.replace_persisted(provider_id, Some(&context));
        state.context = Some(context);
        Ok(response)
    }

    async fn respond_with_retry(
        &self,
        slot: &ProviderSlot,
        context: &McpContext,
        timeout: Duration,
    ) -> Result<String, McpError> {
        let mut attempt = 0;
        loop {
            match tokio::time::timeout(timeout, slot.provider.respond(context)).await {
                Err(_) => {
                    return Err(McpError::new(
                        McpErrorCode::McpTimeoutError,
                        format!("Request timed out after {}ms", timeout.as_millis()),
                        true,
                    ))
                }
                Ok(Ok(content)) => return Ok(content),
                Ok(Err(err)) => {
                    let error = classify_failure(&err);
                    if error.recoverable && attempt < slot.retry_attempts {
                        attempt += 1;
                        warn!(attempt, error = %err, "retrying MCP send");
                        continue;
                    }
                    return Err(error);
                }
            }
        }
    }

    pub async fn get_status(
        &self,
        provider_id: &str,
    ) -> Result<McpProviderStatus, McpServiceError> {
        let slot = self.slot(provider_id)?;
        let state = slot.state.lock().await;
        let status = if state.last_failed {
            ProviderState::Error
        } else if state.last_activity.is_some() {
            ProviderState::Active
        } else {
            ProviderState::Idle
        };
        Ok(McpProviderStatus {
            provider_id: provider_id.to_string(),
            status,
            last_activity: state.last_activity.clone(),
            context_count: usize::from(state.context.is_some()),
            error_count: state.error_count,
            capabilities: slot.provider.capabilities(),
        })
    }

    /// Status of every registered provider, ordered by id.
    pub async fn all_statuses(&self) -> Vec<McpProviderStatus> {
        let mut statuses = Vec::new();
        for provider_id in self.registered_providers() {
            // Unregistered since the id list was taken.
            if let Ok(status) = self.get_status(&provider_id).await {
                statuses.push(status);
            }
        }
        statuses
    }

    /// Drops the provider's context. The next send starts a new session.
    pub async fn clear_context(&self, provider_id: &str) -> Result<(), McpServiceError> {
        let slot = self.slot(provider_id)?;
        let mut state = slot.state.lock().await;
        state.context = None;
        state.last_activity = Some(now_rfc3339());
        self.replace_persisted(provider_id, None);
        self.events.publish(McpEvent::ContextCleared {
            provider_id: provider_id.to_string(),
        });
        Ok(())
    }

    pub async fn context(&self, provider_id: &str) -> Result<Option<McpContext>, McpServiceError> {
        let slot = self.slot(provider_id)?;
        let state = slot.state.lock().await;
        Ok(state.context.clone())
    }

    fn build_provider(
        &self,
        config: &McpProviderConfig,
    ) -> Result<Arc<dyn ContextProvider>, McpServiceError> {
        match config.provider_id.as_str() {
            OPENAI_MCP_PROVIDER_ID => {
                let key_provider = config.key_provider.as_deref().unwrap_or("openai");
                let api_key = match config.api_key.as_deref().filter(|key| !key.trim().is_empty()) {
                    Some(key) => key.to_string(),
                    None => resolve_api_key(
                        self.keys.as_ref(),
                        key_provider,
                        find_builtin_provider(key_provider).and_then(|p| p.env_key.as_deref()),
                        self.env.as_ref(),
                    ),
                };
                if api_key.is_empty() {
                    return Err(McpServiceError(McpError::new(
                        McpErrorCode::McpConfigurationError,
                        "OpenAI API key is required for MCP initialization",
                        false,
                    )));
                }

                let timeout = Duration::from_secs(
                    config
                        .timeout_secs
                        .unwrap_or(crate::core::config::data::DEFAULT_MCP_TIMEOUT_SECS),
                );
                Ok(Arc::new(OpenAiContextProvider::connect(
                    self.client.clone(),
                    config.endpoint.as_deref().unwrap_or(OPENAI_MCP_DEFAULT_ENDPOINT),
                    &api_key,
                    config.model.as_deref().unwrap_or(OPENAI_MCP_DEFAULT_MODEL),
                    timeout,
                )))
            }
            other => Err(McpServiceError(McpError::new(
                McpErrorCode::McpProviderNotFound,
                format!("Unknown MCP provider type '{other}'"),
                false,
            ))),
        }
    }

    fn slot(&self, provider_id: &str) -> Result<Arc<ProviderSlot>, McpServiceError> {
        self.read_slots()
            .get(provider_id)
            .cloned()
            .ok_or_else(|| McpServiceError::provider_not_found(provider_id))
    }

    fn read_slots(&self) -> std::sync::RwLockReadGuard<'_, HashMap<String, Arc<ProviderSlot>>> {
        self.slots.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write_slots(&self) -> std::sync::RwLockWriteGuard<'_, HashMap<String, Arc<ProviderSlot>>> {
        self.slots.write().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn restored_context(&self, provider_id: &str) -> Option<McpContext> {
        let prefix = format!("{provider_id}:");
        let persisted = self.persisted.lock().unwrap_or_else(|p| p.into_inner());
        persisted
            .iter()
            .filter(|(key, _)| key.starts_with(&prefix))
            .map(|(_, context)| context.clone())
            .max_by(|a, b| a.timestamp.cmp(&b.timestamp))
    }

    /// Swaps the provider's persisted context and rewrites the store.
    fn replace_persisted(&self, provider_id: &str, context: Option<&McpContext>) {
        let prefix = format!("{provider_id}:");
        let mut persisted = self.persisted.lock().unwrap_or_else(|p| p.into_inner());
        persisted.retain(|key, _| !key.starts_with(&prefix));
        if let Some(context) = context {
            persisted.insert(
                format!("{provider_id}:{}", context.session_id),
                context.clone(),
            );
        }

        let Some(path) = &self.store_path else {
            return;
        };
        let result = serde_json::to_vec_pretty(&*persisted)
            .map_err(std::io::Error::other)
            .and_then(|bytes| write_atomic(path, &bytes));
        if let Err(err) = result {
            warn!(path = %path.display(), error = %err, "failed to save MCP contexts");
        }
    }

    fn next_id(&self) -> u64 {
        self.ids.fetch_add(1, Ordering::Relaxed)
    }

    fn session_id(&self, provider_id: &str) -> String {
        format!(
            "{provider_id}-{}-{}",
            chrono::Utc::now().timestamp_millis(),
            self.next_id()
        )
    }

    fn message_id(&self) -> String {
        format!("msg-{}-{}", chrono::Utc::now().timestamp_millis(), self.next_id())
    }
}

fn load_contexts(path: &std::path::Path) -> BTreeMap<String, McpContext> {
    match std::fs::read(path) {
        Ok(bytes) => serde_json::from_slice(&bytes).unwrap_or_else(|err| {
            warn!(path = %path.display(), error = %err, "ignoring unreadable MCP context store");
            BTreeMap::new()
        }),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
        Err(err) => {
            warn!(path = %path.display(), error = %err, "failed to read MCP context store");
            BTreeMap::new()
        }
    }
}

/// Maps a vendor failure to its MCP code. Recoverability follows
/// [`ProviderError::is_retryable`].
fn classify_failure(err: &ProviderError) -> McpError {
    let recoverable = err.is_retryable();
    match err {
        ProviderError::Api { status, message } => {
            let code = match status {
                401 | 403 => McpErrorCode::McpAuthenticationError,
                429 => McpErrorCode::McpRateLimitExceeded,
                _ => McpErrorCode::McpMessageSendFailed,
            };
            McpError::new(code, format!("HTTP {status}: {message}"), recoverable)
        }
        ProviderError::InvalidResponse(message) => {
            McpError::new(McpErrorCode::McpProtocolViolation, message.clone(), recoverable)
        }
        ProviderError::Network(message) => {
            McpError::new(McpErrorCode::McpMessageSendFailed, message.clone(), recoverable)
        }
        other => McpError::new(McpErrorCode::McpMessageSendFailed, other.to_string(), recoverable),
    }
}

#[cfg(test)]
mod tests;
