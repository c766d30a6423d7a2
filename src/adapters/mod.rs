//! Uniform chat and image contracts over the vendor APIs.
//!
//! Each vendor implements [`ChatBackend`], a stateless completion over a
//! history slice. [`ChatAdapter`] turns a backend into a [`ChatService`] by
//! binding it to a [`ChatSession`], which owns the history and send order.

pub mod anthropic;
pub mod dummy;
pub mod error;
pub mod gemini;
pub mod http;
pub mod openai;

pub use error::ProviderError;

use crate::core::message::Message;
use crate::core::session::ChatSession;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageData {
    pub image_base64: String,
    pub filename: String,
}

/// `Ok(None)` means the provider answered without any text.
pub type ChatReply = Result<Option<String>, ProviderError>;

#[async_trait]
pub trait ChatService: Send + Sync {
    async fn send_message(&self, text: &str) -> ChatReply;

    async fn send_message_cancellable(&self, text: &str, cancel: &CancellationToken)
        -> ChatReply;

    fn clear_history(&self);

    fn history(&self) -> Vec<Message>;
}

#[async_trait]
pub trait ImageService: Send + Sync {
    async fn generate_image(&self, prompt: &str) -> Result<ImageData, ProviderError>;
}

#[async_trait]
pub trait ChatBackend: Send + Sync {
    /// Completes the conversation. The last entry is the new user turn.
    async fn complete(&self, history: &[Message]) -> ChatReply;
}

pub struct ChatAdapter<B> {
    backend: B,
    session: Arc<ChatSession>,
}

impl<B: ChatBackend> ChatAdapter<B> {
    pub fn new(backend: B, session: Arc<ChatSession>) -> Self {
        Self { backend, session }
    }
}

#[async_trait]
impl<B: ChatBackend> ChatService for ChatAdapter<B> {
    async fn send_message(&self, text: &str) -> ChatReply {
        self.send_message_cancellable(text, &CancellationToken::new())
            .await
    }

    async fn send_message_cancellable(
        &self,
        text: &str,
        cancel: &CancellationToken,
    ) -> ChatReply {
        if text.trim().is_empty() {
            return Err(ProviderError::Validation(
                "Message cannot be empty".to_string(),
            ));
        }

        let _turn = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(ProviderError::Cancelled),
            guard = self.session.acquire_send() => guard,
        };

        self.session.push(Message::user(text));
        let history = self.session.context();
        debug!(turns = history.len(), "sending chat history");

        let reply = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                debug!("chat request cancelled");
                return Err(ProviderError::Cancelled);
            }
            result = self.backend.complete(&history) => result,
        };

        match reply {
            Ok(Some(text)) if !text.trim().is_empty() => {
                self.session.push(Message::ai(text.clone()));
                Ok(Some(text))
            }
            Ok(_) => {
                debug!("provider returned no text");
                Ok(None)
            }
            Err(err) => {
                warn!(error = %err, "chat request failed");
                Err(err)
            }
        }
    }

    fn clear_history(&self) {
        self.session.clear();
    }

    fn history(&self) -> Vec<Message> {
        self.session.history()
    }
}

pub fn image_filename(prefix: &str) -> String {
    format!("{prefix}-{}.png", chrono::Utc::now().timestamp_millis())
}
