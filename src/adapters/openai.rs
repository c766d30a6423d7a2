use crate::adapters::http::{send_json, Endpoint};
use crate::adapters::{
    image_filename, ChatBackend, ChatReply, ImageData, ImageService, ProviderError,
};
use crate::api::{ChatMessage, ChatRequest, ChatResponse, ImageRequest, ImageResponse};
use crate::core::message::Message;
use async_trait::async_trait;
use tracing::info;

const IMAGE_SIZE: &str = "256x256";

pub struct OpenAiChat {
    endpoint: Endpoint,
    model: String,
}

impl OpenAiChat {
    pub fn new(endpoint: Endpoint, model: impl Into<String>) -> Self {
        Self {
            endpoint,
            model: model.into(),
        }
    }
}

pub fn to_api_messages(history: &[Message]) -> Vec<ChatMessage> {
    history
        .iter()
        .map(|msg| ChatMessage::new(msg.sender.to_api_role(), msg.text.clone()))
        .collect()
}

#[async_trait]
impl ChatBackend for OpenAiChat {
    async fn complete(&self, history: &[Message]) -> ChatReply {
        let request = ChatRequest {
            model: self.model.clone(),
            messages: to_api_messages(history),
            max_tokens: None,
            temperature: None,
        };
        info!(model = %self.model, "sending OpenAI chat completion");

        let response: ChatResponse =
            send_json(self.endpoint.post("chat/completions").json(&request)).await?;
        Ok(response.first_text().map(str::to_owned))
    }
}

pub struct OpenAiImages {
    endpoint: Endpoint,
    model: String,
}

impl OpenAiImages {
    pub fn new(endpoint: Endpoint, model: impl Into<String>) -> Self {
        Self {
            endpoint,
            model: model.into(),
        }
    }
}

#[async_trait]
impl ImageService for OpenAiImages {
    async fn generate_image(&self, prompt: &str) -> Result<ImageData, ProviderError> {
        if prompt.trim().is_empty() {
            return Err(ProviderError::Validation("Prompt cannot be empty".to_string()));
        }
        info!(model = %self.model, "generating image with OpenAI");

        let request = ImageRequest {
            model: &self.model,
            prompt,
            n: 1,
            size: IMAGE_SIZE,
            response_format: "b64_json",
        };
        let response: ImageResponse =
            send_json(self.endpoint.post("images/generations").json(&request)).await?;

        let image_base64 = response
            .data
            .into_iter()
            .next()
            .and_then(|datum| datum.b64_json)
            .filter(|data| !data.is_empty())
            .ok_or_else(|| {
                ProviderError::ImageGeneration("Invalid response from OpenAI API".to_string())
            })?;

        let filename = image_filename("image");
        info!(%filename, "image generated");
        Ok(ImageData {
            image_base64,
            filename,
        })
    }
}
