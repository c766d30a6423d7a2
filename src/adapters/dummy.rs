//! Offline provider for demos and tests. Performs no I/O.

use crate::adapters::{ChatBackend, ChatReply, ImageData, ImageService, ProviderError};
use crate::core::message::Message;
use async_trait::async_trait;

/// A transparent 1x1 PNG.
const PIXEL_PNG_BASE64: &str =
    "iVBORw0KGgoAAAANSUhEUgAAAAEAAAABCAYAAAAfFcSJAAAADUlEQVR42mNkYPhfDwAChwGA60e6kgAAAABJRU5ErkJggg==";

pub struct DummyChat;

#[async_trait]
impl ChatBackend for DummyChat {
    async fn complete(&self, history: &[Message]) -> ChatReply {
        Ok(history
            .last()
            .map(|msg| format!("{} (processed by Dummy Chat Service)", msg.text)))
    }
}

pub struct DummyImages;

#[async_trait]
impl ImageService for DummyImages {
    async fn generate_image(&self, prompt: &str) -> Result<ImageData, ProviderError> {
        if prompt.trim().is_empty() {
            return Err(ProviderError::Validation("Prompt cannot be empty".to_string()));
        }
        Ok(ImageData {
            image_base64: PIXEL_PNG_BASE64.to_string(),
            filename: "dummy-image.png".to_string(),
        })
    }
}
