use crate::error::{Classify, ErrorKind};
use std::error::Error;
use std::fmt;

/// Failures surfaced by provider adapters and the proxy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProviderError {
    /// The selected provider name is not in the catalog.
    UnknownProvider(String),
    /// Rejected before any request was made.
    Validation(String),
    /// Connect, TLS, timeout, or body read failure.
    Network(String),
    /// The vendor answered with a non-success status.
    Api { status: u16, message: String },
    /// The vendor answered 2xx with a body we could not use.
    InvalidResponse(String),
    ImageGeneration(String),
    /// The provider cannot perform this operation at all.
    Unsupported(String),
    Cancelled,
}

impl ProviderError {
    pub fn network(err: impl fmt::Display) -> Self {
        ProviderError::Network(err.to_string())
    }

    /// Server-side and transport failures are worth retrying. Every 4xx,
    /// 429 included, is not.
    pub fn is_retryable(&self) -> bool {
        match self {
            ProviderError::Network(_) => true,
            ProviderError::Api { status, .. } => *status >= 500,
            _ => false,
        }
    }
}

impl fmt::Display for ProviderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProviderError::UnknownProvider(name) => write!(f, "Unknown provider: {name}"),
            ProviderError::Validation(message) => write!(f, "{message}"),
            ProviderError::Network(message) => write!(f, "Network error: {message}"),
            ProviderError::Api { status, message } => {
                write!(f, "API error (HTTP {status}): {message}")
            }
            ProviderError::InvalidResponse(message) => {
                write!(f, "Unexpected response from provider: {message}")
            }
            ProviderError::ImageGeneration(message) => {
                write!(f, "Failed to generate image: {message}")
            }
            ProviderError::Unsupported(message) => write!(f, "{message}"),
            ProviderError::Cancelled => write!(f, "Request cancelled"),
        }
    }
}

impl Error for ProviderError {}

impl Classify for ProviderError {
    fn kind(&self) -> ErrorKind {
        match self {
            ProviderError::UnknownProvider(_) | ProviderError::Unsupported(_) => ErrorKind::Config,
            ProviderError::Validation(_) => ErrorKind::Validation,
            ProviderError::Network(_) => ErrorKind::Network,
            ProviderError::Api { .. }
            | ProviderError::InvalidResponse(_)
            | ProviderError::ImageGeneration(_) => ErrorKind::Api,
            ProviderError::Cancelled => ErrorKind::Unknown,
        }
    }
}
