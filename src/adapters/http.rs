use crate::adapters::error::ProviderError;
use crate::core::builtin_providers::ProviderMode;
use crate::utils::auth::add_auth_headers;
use crate::utils::url::construct_api_url;
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::debug;

const CONNECT_TIMEOUT_SECONDS: u64 = 10;
const REQUEST_TIMEOUT_SECONDS: u64 = 120;
const MAX_ERROR_BODY_CHARS: usize = 500;

pub fn build_client() -> Result<reqwest::Client, ProviderError> {
    reqwest::Client::builder()
        .connect_timeout(Duration::from_secs(CONNECT_TIMEOUT_SECONDS))
        .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECONDS))
        .build()
        .map_err(ProviderError::network)
}

/// Where and how to reach one vendor API.
#[derive(Debug, Clone)]
pub struct Endpoint {
    pub client: reqwest::Client,
    pub base_url: String,
    pub api_key: String,
    pub mode: ProviderMode,
}

impl Endpoint {
    pub fn new(
        client: reqwest::Client,
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        mode: ProviderMode,
    ) -> Self {
        Self {
            client,
            base_url: base_url.into(),
            api_key: api_key.into(),
            mode,
        }
    }

    /// POST to `path` under the base URL with the vendor's auth headers.
    pub fn post(&self, path: &str) -> reqwest::RequestBuilder {
        let url = construct_api_url(&self.base_url, path);
        add_auth_headers(self.client.post(url), self.mode, &self.api_key)
    }
}

/// Pulls a human-readable message out of a vendor error body.
pub fn extract_error_summary(value: &serde_json::Value) -> Option<String> {
    let summary = value
        .pointer("/error/message")
        .and_then(|v| v.as_str())
        .map(str::to_owned)
        .or_else(|| {
            value.get("error").and_then(|v| match v {
                serde_json::Value::String(s) => Some(s.to_string()),
                _ => None,
            })
        })
        .or_else(|| {
            value
                .get("message")
                .and_then(|v| v.as_str().map(str::to_owned))
        });

    summary
        .map(|text| text.split_whitespace().collect::<Vec<_>>().join(" "))
        .filter(|text| !text.is_empty())
}

pub fn api_error_message(status: reqwest::StatusCode, body: &str) -> String {
    let trimmed = body.trim();
    if let Ok(value) = serde_json::from_str::<serde_json::Value>(trimmed) {
        if let Some(summary) = extract_error_summary(&value) {
            return summary;
        }
    }
    if trimmed.is_empty() {
        return status
            .canonical_reason()
            .unwrap_or("request failed")
            .to_string();
    }
    trimmed.chars().take(MAX_ERROR_BODY_CHARS).collect()
}

/// Sends the request and decodes a JSON body, mapping failures onto
/// [`ProviderError`].
pub async fn send_json<T: DeserializeOwned>(
    request: reqwest::RequestBuilder,
) -> Result<T, ProviderError> {
    let response = request.send().await.map_err(ProviderError::network)?;
    let status = response.status();
    let body = response.text().await.map_err(ProviderError::network)?;

    if !status.is_success() {
        debug!(status = status.as_u16(), "provider returned an error status");
        return Err(ProviderError::Api {
            status: status.as_u16(),
            message: api_error_message(status, &body),
        });
    }

    serde_json::from_str(&body).map_err(|err| ProviderError::InvalidResponse(err.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::StatusCode;

    #[test]
    fn summary_prefers_nested_error_message() {
        let value = serde_json::json!({
            "type": "error",
            "error": {"type": "authentication_error", "message": "invalid  x-api-key"}
        });
        assert_eq!(
            extract_error_summary(&value).as_deref(),
            Some("invalid x-api-key")
        );
    }

    #[test]
    fn message_falls_back_to_body_or_reason() {
        assert_eq!(
            api_error_message(StatusCode::BAD_GATEWAY, "  upstream down "),
            "upstream down"
        );
        assert_eq!(
            api_error_message(StatusCode::SERVICE_UNAVAILABLE, ""),
            "Service Unavailable"
        );
        assert_eq!(
            api_error_message(StatusCode::BAD_REQUEST, r#"{"error":"bad prompt"}"#),
            "bad prompt"
        );
    }
}
