use crate::adapters::http::{send_json, Endpoint};
use crate::adapters::{
    image_filename, ChatBackend, ChatReply, ImageData, ImageService, ProviderError,
};
use crate::api::gemini::{
    Content, GenerateContentRequest, GenerateContentResponse, GenerationConfig, Part,
};
use crate::core::message::{Message, Sender};
use async_trait::async_trait;
use tracing::info;

fn generate_path(model: &str) -> String {
    format!("models/{model}:generateContent")
}

fn to_contents(history: &[Message]) -> Vec<Content> {
    history
        .iter()
        .map(|msg| Content {
            role: Some(
                match msg.sender {
                    Sender::User => "user",
                    Sender::Ai => "model",
                }
                .to_string(),
            ),
            parts: vec![Part::text(msg.text.clone())],
        })
        .collect()
}

pub struct GeminiChat {
    endpoint: Endpoint,
    model: String,
}

impl GeminiChat {
    pub fn new(endpoint: Endpoint, model: impl Into<String>) -> Self {
        Self {
            endpoint,
            model: model.into(),
        }
    }
}

#[async_trait]
impl ChatBackend for GeminiChat {
    async fn complete(&self, history: &[Message]) -> ChatReply {
        let request = GenerateContentRequest {
            contents: to_contents(history),
            generation_config: None,
        };
        info!(model = %self.model, "sending Gemini generateContent");
        let response: GenerateContentResponse =
            send_json(self.endpoint.post(&generate_path(&self.model)).json(&request)).await?;
        Ok(response.text())
    }
}

pub struct GeminiImages {
    endpoint: Endpoint,
    model: String,
}

impl GeminiImages {
    pub fn new(endpoint: Endpoint, model: impl Into<String>) -> Self {
        Self {
            endpoint,
            model: model.into(),
        }
    }
}

#[async_trait]
impl ImageService for GeminiImages {
    async fn generate_image(&self, prompt: &str) -> Result<ImageData, ProviderError> {
        if prompt.trim().is_empty() {
            return Err(ProviderError::Validation("Prompt cannot be empty".to_string()));
        }
        let request = GenerateContentRequest {
            contents: vec![Content {
                role: Some("user".to_string()),
                parts: vec![Part::text(prompt)],
            }],
            generation_config: Some(GenerationConfig {
                response_modalities: vec!["TEXT".to_string(), "IMAGE".to_string()],
            }),
        };
        info!(model = %self.model, "generating image with Gemini");

        let response: GenerateContentResponse =
            send_json(self.endpoint.post(&generate_path(&self.model)).json(&request)).await?;
        let image_base64 = response
            .first_inline_data()
            .map(|inline| inline.data.clone())
            .filter(|data| !data.is_empty())
            .ok_or_else(|| {
                ProviderError::ImageGeneration("Gemini returned no image data".to_string())
            })?;

        Ok(ImageData {
            image_base64,
            filename: image_filename("gemini-image"),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::builtin_providers::ProviderMode;
    use crate::utils::test_utils::{test_client, StubResponse, StubServer};
    use serde_json::json;

    fn endpoint(base_url: &str) -> Endpoint {
        Endpoint::new(test_client(), base_url, "g-key", ProviderMode::Gemini)
    }

    #[tokio::test]
    async fn chat_maps_ai_turns_to_model_role() {
        let server = StubServer::start(vec![StubResponse::json(
            200,
            json!({"candidates":[{"content":{"role":"model","parts":[{"text":"Sure."}]}}]}),
        )])
        .await;
        let chat = GeminiChat::new(endpoint(&server.base_url), "gemini-2.0-flash");
        let reply = chat
            .complete(&[Message::user("a"), Message::ai("b"), Message::user("c")])
            .await
            .unwrap();
        assert_eq!(reply.as_deref(), Some("Sure."));

        let request = &server.requests()[0];
        assert_eq!(request.path, "/models/gemini-2.0-flash:generateContent");
        assert_eq!(request.headers["x-goog-api-key"], "g-key");
        assert_eq!(request.json()["contents"][1]["role"], "model");
    }

    #[tokio::test]
    async fn image_takes_inline_data_part() {
        let server = StubServer::start(vec![StubResponse::json(
            200,
            json!({"candidates":[{"content":{"parts":[
                {"text":"A cat"},
                {"inlineData":{"mimeType":"image/png","data":"Y2F0"}}
            ]}}]}),
        )])
        .await;
        let images = GeminiImages::new(
            endpoint(&server.base_url),
            "gemini-2.0-flash-preview-image-generation",
        );
        let image = images.generate_image("a cat").await.unwrap();
        assert_eq!(image.image_base64, "Y2F0");
        assert!(image.filename.starts_with("gemini-image-"));
        assert_eq!(
            server.requests()[0].json()["generationConfig"]["responseModalities"],
            json!(["TEXT", "IMAGE"])
        );
    }

    #[tokio::test]
    async fn text_only_image_reply_fails() {
        let server = StubServer::start(vec![StubResponse::json(
            200,
            json!({"candidates":[{"content":{"parts":[{"text":"I can't draw that"}]}}]}),
        )])
        .await;
        let images = GeminiImages::new(endpoint(&server.base_url), "m");
        let err = images.generate_image("a cat").await.unwrap_err();
        assert!(matches!(err, ProviderError::ImageGeneration(_)));
    }
}
