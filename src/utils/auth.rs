//! Provider-specific authentication headers.

use crate::core::builtin_providers::ProviderMode;

pub const ANTHROPIC_VERSION: &str = "2023-06-01";

/// Add provider-specific authentication headers to an HTTP request
///
/// - Anthropic: `x-api-key` plus `anthropic-version`
/// - Gemini: `x-goog-api-key`
/// - OpenAI: `Authorization: Bearer`
///
/// Empty keys are still sent so the vendor answers with its own
/// authentication error.
pub fn add_auth_headers(
    request: reqwest::RequestBuilder,
    mode: ProviderMode,
    api_key: &str,
) -> reqwest::RequestBuilder {
    match mode {
        ProviderMode::Anthropic => request
            .header("x-api-key", api_key)
            .header("anthropic-version", ANTHROPIC_VERSION),
        ProviderMode::Gemini => request.header("x-goog-api-key", api_key),
        ProviderMode::OpenAi => request.header("Authorization", format!("Bearer {api_key}")),
        ProviderMode::Dummy => request,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn built(mode: ProviderMode) -> reqwest::Request {
        let client = reqwest::Client::new();
        add_auth_headers(client.get("https://example.com"), mode, "test-key")
            .build()
            .unwrap()
    }

    #[test]
    fn test_anthropic_auth_headers() {
        let request = built(ProviderMode::Anthropic);
        assert_eq!(request.headers()["x-api-key"], "test-key");
        assert_eq!(request.headers()["anthropic-version"], ANTHROPIC_VERSION);
        assert!(request.headers().get("authorization").is_none());
    }

    #[test]
    fn test_openai_auth_headers() {
        let request = built(ProviderMode::OpenAi);
        assert_eq!(request.headers()["authorization"], "Bearer test-key");
    }

    #[test]
    fn test_gemini_auth_headers() {
        let request = built(ProviderMode::Gemini);
        assert_eq!(request.headers()["x-goog-api-key"], "test-key");
    }
}
