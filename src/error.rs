//! Error taxonomy shared across the IPC boundary.
//!
//! Each subsystem keeps its own error enum; they all collapse into an
//! [`ErrorKind`] so the UI can decide how loudly to report a failure.

use serde::{Deserialize, Serialize};
use std::error::Error as StdError;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    /// Missing or invalid key, provider, or configuration file.
    #[serde(rename = "CONFIG_ERROR")]
    Config,
    /// Transport failure or timeout.
    #[serde(rename = "NETWORK_ERROR")]
    Network,
    /// The vendor rejected the request.
    #[serde(rename = "API_ERROR")]
    Api,
    /// Bad user input, e.g. an empty prompt.
    #[serde(rename = "VALIDATION_ERROR")]
    Validation,
    #[serde(rename = "UNKNOWN_ERROR")]
    Unknown,
}

impl ErrorKind {
    pub fn code(self) -> &'static str {
        match self {
            ErrorKind::Config => "CONFIG_ERROR",
            ErrorKind::Network => "NETWORK_ERROR",
            ErrorKind::Api => "API_ERROR",
            ErrorKind::Validation => "VALIDATION_ERROR",
            ErrorKind::Unknown => "UNKNOWN_ERROR",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// Error value handed back across the IPC boundary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppError {
    pub kind: ErrorKind,
    pub message: String,
}

impl AppError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Validation, message)
    }

    pub fn unknown(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Unknown, message)
    }

    /// Serious errors are surfaced to the user in a modal; the rest are only logged.
    pub fn is_serious(&self) -> bool {
        matches!(self.kind, ErrorKind::Config | ErrorKind::Network)
            || self.message.contains("API key")
            || self.message.contains("authentication")
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.message, self.kind)
    }
}

impl StdError for AppError {}

/// Implemented by subsystem errors so they can be classified uniformly.
pub trait Classify: fmt::Display {
    fn kind(&self) -> ErrorKind;

    fn to_app_error(&self) -> AppError {
        AppError::new(self.kind(), self.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_and_network_errors_are_serious() {
        assert!(AppError::new(ErrorKind::Config, "missing provider").is_serious());
        assert!(AppError::new(ErrorKind::Network, "connection reset").is_serious());
        assert!(!AppError::new(ErrorKind::Api, "rate limited").is_serious());
        assert!(!AppError::validation("prompt is empty").is_serious());
    }

    #[test]
    fn key_and_authentication_messages_are_serious() {
        assert!(AppError::new(ErrorKind::Api, "Incorrect API key provided").is_serious());
        assert!(AppError::unknown("authentication failed upstream").is_serious());
    }

    #[test]
    fn kinds_serialize_to_stable_codes() {
        let json = serde_json::to_string(&ErrorKind::Validation).unwrap();
        assert_eq!(json, "\"VALIDATION_ERROR\"");
        assert_eq!(ErrorKind::Network.code(), "NETWORK_ERROR");
    }
}
