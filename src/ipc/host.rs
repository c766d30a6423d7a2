//! Dispatches decoded requests to the proxy, the credential store, the MCP
//! tool session and the MCP context service.

use crate::core::credentials::CredentialStore;
use crate::core::proxy::ProviderProxy;
use crate::core::session::ChatSession;
use crate::error::{AppError, Classify, ErrorKind};
use crate::ipc::{Channel, ErrorReport, IpcRequest, MessageBoxOptions, MessageBoxResult};
use crate::mcp::types::{McpServiceError, SendOptions};
use crate::mcp::{McpContextService, SupervisedSession};
use async_trait::async_trait;
use serde::Serialize;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{error, info, warn};

/// Where modal dialogs go. The UI process supplies the real one.
#[async_trait]
pub trait DialogHost: Send + Sync {
    /// `None` when no window could show the box.
    async fn show_message_box(&self, options: &MessageBoxOptions) -> Option<MessageBoxResult>;

    fn show_error_box(&self, title: &str, content: &str);
}

/// Writes dialogs to the log and answers with the default button.
pub struct LogDialogHost;

#[async_trait]
impl DialogHost for LogDialogHost {
    async fn show_message_box(&self, options: &MessageBoxOptions) -> Option<MessageBoxResult> {
        info!(
            title = options.title.as_deref().unwrap_or_default(),
            detail = options.detail.as_deref().unwrap_or_default(),
            "{}",
            options.message
        );
        Some(MessageBoxResult {
            response: options.default_id.unwrap_or(0),
        })
    }

    fn show_error_box(&self, title: &str, content: &str) {
        error!(%title, "{content}");
    }
}

pub fn app_version() -> String {
    let version = env!("CARGO_PKG_VERSION");
    match option_env!("VERGEN_GIT_DESCRIBE") {
        Some(describe) if !describe.is_empty() && describe != "unknown" => {
            format!("{version} ({describe})")
        }
        _ => version.to_string(),
    }
}

fn error_title(kind: ErrorKind) -> &'static str {
    match kind {
        ErrorKind::Config => "Configuration Error",
        ErrorKind::Network => "Connection Error",
        ErrorKind::Api => "Provider Error",
        ErrorKind::Validation => "Invalid Input",
        ErrorKind::Unknown => "Error",
    }
}

fn to_value<T: Serialize>(value: T) -> Result<Value, AppError> {
    serde_json::to_value(value).map_err(|err| AppError::unknown(err.to_string()))
}

pub struct IpcHost {
    proxy: Arc<ProviderProxy>,
    credentials: Arc<CredentialStore>,
    session: Arc<ChatSession>,
    mcp: Option<Arc<SupervisedSession>>,
    contexts: Option<Arc<McpContextService>>,
    dialogs: Arc<dyn DialogHost>,
}

impl IpcHost {
    pub fn new(proxy: Arc<ProviderProxy>, credentials: Arc<CredentialStore>) -> Self {
        Self {
            proxy,
            credentials,
            session: Arc::new(ChatSession::new()),
            mcp: None,
            contexts: None,
            dialogs: Arc::new(LogDialogHost),
        }
    }

    pub fn with_mcp(mut self, session: Arc<SupervisedSession>) -> Self {
        self.mcp = Some(session);
        self
    }

    pub fn with_chat_session(mut self, session: Arc<ChatSession>) -> Self {
        self.session = session;
        self
    }

    pub fn with_context_service(mut self, contexts: Arc<McpContextService>) -> Self {
        self.contexts = Some(contexts);
        self
    }

    fn contexts(&self, provider_id: &str) -> Result<&McpContextService, AppError> {
        self.contexts
            .as_deref()
            .ok_or_else(|| McpServiceError::provider_not_found(provider_id).to_app_error())
    }

    pub fn with_dialog_host(mut self, dialogs: Arc<dyn DialogHost>) -> Self {
        self.dialogs = dialogs;
        self
    }

    pub fn session(&self) -> &Arc<ChatSession> {
        &self.session
    }

    /// Runs one request. Every failure is logged; serious ones also raise
    /// an error box.
    pub async fn handle(&self, request: IpcRequest) -> Result<Value, AppError> {
        let channel = request.channel();
        let result = self.dispatch(request).await;
        if let Err(err) = &result {
            self.report(channel, err);
        }
        result
    }

    fn report(&self, channel: Channel, err: &AppError) {
        error!(%channel, code = %err.kind, "{}", err.message);
        if err.is_serious() {
            self.dialogs.show_error_box(error_title(err.kind), &err.message);
        }
    }

    async fn dispatch(&self, request: IpcRequest) -> Result<Value, AppError> {
        match request {
            IpcRequest::GetAppVersion => Ok(json!(app_version())),
            IpcRequest::ShowMessageBox(options) => {
                to_value(self.dialogs.show_message_box(&options).await)
            }
            IpcRequest::ShowErrorBox { title, content } => {
                self.dialogs.show_error_box(&title, &content);
                Ok(Value::Null)
            }
            IpcRequest::LogError(report) => {
                log_report(&report);
                Ok(Value::Null)
            }
            IpcRequest::ChatSendMessage { text } => {
                let chat = self
                    .proxy
                    .chat_service(Arc::clone(&self.session))
                    .map_err(|err| err.to_app_error())?;
                let reply = chat
                    .send_message(&text)
                    .await
                    .map_err(|err| err.to_app_error())?;
                Ok(json!(reply))
            }
            IpcRequest::ChatClearHistory => {
                self.session.clear();
                Ok(Value::Null)
            }
            IpcRequest::ChatGetHistory => to_value(self.session.history()),
            IpcRequest::ImageGenerate { prompt, provider } => {
                let images = self
                    .proxy
                    .image_service(provider.as_deref())
                    .map_err(|err| err.to_app_error())?;
                let image = images
                    .generate_image(&prompt)
                    .await
                    .map_err(|err| err.to_app_error())?;
                to_value(image)
            }
            IpcRequest::StoreApiKey { provider, key } => {
                self.credentials
                    .store_api_key(&provider, &key)
                    .map_err(|err| err.to_app_error())?;
                Ok(json!(true))
            }
            IpcRequest::GetApiKey { provider } => {
                let key = self
                    .credentials
                    .get_api_key(&provider)
                    .map_err(|err| err.to_app_error())?;
                Ok(json!(key))
            }
            IpcRequest::ClearApiKey { provider } => {
                Ok(json!(self.credentials.clear_api_key(&provider)))
            }
            IpcRequest::SetProvider { name } => {
                self.proxy.set_provider(&name);
                Ok(Value::Null)
            }
            IpcRequest::GetProviderName => Ok(json!(self.proxy.provider_name())),
            IpcRequest::ListProviders => Ok(json!(self.proxy.list_providers())),
            IpcRequest::McpListTools => match &self.mcp {
                Some(mcp) => to_value(mcp.tools()),
                None => Ok(json!([])),
            },
            IpcRequest::McpStatus => match &self.mcp {
                Some(mcp) => to_value(mcp.status().await),
                None => Ok(Value::Null),
            },
            IpcRequest::McpSendMessage { provider, text } => {
                let response = self
                    .contexts(&provider)?
                    .send_message(&provider, &text, SendOptions::default())
                    .await
                    .map_err(|err| err.to_app_error())?;
                to_value(response)
            }
            IpcRequest::McpGetStatus { provider: None } => match &self.contexts {
                Some(contexts) => to_value(contexts.all_statuses().await),
                None => Ok(json!([])),
            },
            IpcRequest::McpGetStatus {
                provider: Some(provider),
            } => {
                let status = self
                    .contexts(&provider)?
                    .get_status(&provider)
                    .await
                    .map_err(|err| err.to_app_error())?;
                to_value(status)
            }
            IpcRequest::McpGetContext { provider } => {
                let context = self
                    .contexts(&provider)?
                    .context(&provider)
                    .await
                    .map_err(|err| err.to_app_error())?;
                to_value(context)
            }
            IpcRequest::McpClearContext { provider } => {
                self.contexts(&provider)?
                    .clear_context(&provider)
                    .await
                    .map_err(|err| err.to_app_error())?;
                Ok(Value::Null)
            }
            IpcRequest::McpRegisterProvider(config) => {
                self.contexts(&config.provider_id)?
                    .register_provider(&config)
                    .map_err(|err| err.to_app_error())?;
                Ok(Value::Null)
            }
            IpcRequest::McpUnregisterProvider { provider } => {
                self.contexts(&provider)?
                    .unregister_provider(&provider)
                    .map_err(|err| err.to_app_error())?;
                Ok(Value::Null)
            }
        }
    }

    pub async fn shutdown(&self) {
        if let Some(mcp) = &self.mcp {
            mcp.disconnect().await;
        }
    }
}

fn log_report(report: &ErrorReport) {
    let context = Value::Object(report.context.clone());
    warn!(
        code = report.code.as_deref().unwrap_or("UNKNOWN_ERROR"),
        timestamp = report.timestamp.as_deref().unwrap_or_default(),
        stack = report.stack.as_deref().unwrap_or_default(),
        %context,
        "renderer error: {}",
        report.message
    );
}
