//! Per-provider API keys, encrypted at rest.
//!
//! Each provider gets one file, `<credentials_dir>/<provider>.key`, holding
//! the cipher's blob. A file that no longer decrypts is treated as corrupt:
//! it is deleted and the key reported as absent.

use crate::core::cipher::{CipherError, SecretCipher};
use crate::core::config::io::write_atomic;
use crate::error::{Classify, ErrorKind};
use std::error::Error;
use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, warn};

#[derive(Debug)]
pub enum CredentialError {
    EncryptionUnavailable,
    InvalidProvider(String),
    Cipher(CipherError),
    Io { path: PathBuf, source: io::Error },
}

impl fmt::Display for CredentialError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CredentialError::EncryptionUnavailable => {
                write!(f, "Encryption is not available; cannot store API key")
            }
            CredentialError::InvalidProvider(name) => {
                write!(f, "Invalid provider name for API key storage: {name:?}")
            }
            CredentialError::Cipher(err) => write!(f, "{err}"),
            CredentialError::Io { path, source } => {
                write!(f, "Credential file {}: {source}", path.display())
            }
        }
    }
}

impl Error for CredentialError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            CredentialError::Cipher(err) => Some(err),
            CredentialError::Io { source, .. } => Some(source),
            _ => None,
        }
    }
}

impl Classify for CredentialError {
    fn kind(&self) -> ErrorKind {
        match self {
            CredentialError::InvalidProvider(_) => ErrorKind::Validation,
            _ => ErrorKind::Config,
        }
    }
}

/// Lookup seam used by the provider proxy.
pub trait KeySource: Send + Sync {
    fn get_api_key(&self, provider: &str) -> Result<Option<String>, CredentialError>;
}

pub struct CredentialStore {
    dir: PathBuf,
    cipher: Arc<dyn SecretCipher>,
}

impl CredentialStore {
    pub fn new(dir: impl Into<PathBuf>, cipher: Arc<dyn SecretCipher>) -> Self {
        Self {
            dir: dir.into(),
            cipher,
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn key_path(&self, provider: &str) -> Result<PathBuf, CredentialError> {
        let valid = !provider.is_empty()
            && provider
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
        if !valid {
            return Err(CredentialError::InvalidProvider(provider.to_string()));
        }
        Ok(self.dir.join(format!("{provider}.key")))
    }

    pub fn store_api_key(&self, provider: &str, key: &str) -> Result<(), CredentialError> {
        let path = self.key_path(provider)?;
        if !self.cipher.is_available() {
            return Err(CredentialError::EncryptionUnavailable);
        }
        let blob = self
            .cipher
            .encrypt(key.as_bytes())
            .map_err(CredentialError::Cipher)?;
        write_atomic(&path, &blob).map_err(|source| CredentialError::Io {
            path: path.clone(),
            source,
        })?;
        debug!(provider, "stored API key");
        Ok(())
    }

    pub fn get_api_key(&self, provider: &str) -> Result<Option<String>, CredentialError> {
        let path = self.key_path(provider)?;
        let blob = match fs::read(&path) {
            Ok(blob) => blob,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(source) => return Err(CredentialError::Io { path, source }),
        };

        let plaintext = match self.cipher.decrypt(&blob) {
            Ok(bytes) => String::from_utf8(bytes).ok(),
            Err(CipherError::Decrypt) | Err(CipherError::Malformed) => None,
            Err(other) => return Err(CredentialError::Cipher(other)),
        };

        match plaintext {
            Some(key) => Ok(Some(key)),
            None => {
                warn!(provider, "stored API key is unreadable; removing it");
                if let Err(err) = fs::remove_file(&path) {
                    warn!(provider, error = %err, "failed to remove corrupt key file");
                }
                Ok(None)
            }
        }
    }

    /// Returns true when no key remains for `provider` afterwards.
    pub fn clear_api_key(&self, provider: &str) -> bool {
        let path = match self.key_path(provider) {
            Ok(path) => path,
            Err(err) => {
                warn!(error = %err, "refusing to clear API key");
                return false;
            }
        };
        match fs::remove_file(&path) {
            Ok(()) => true,
            Err(err) if err.kind() == io::ErrorKind::NotFound => true,
            Err(err) => {
                warn!(provider, error = %err, "failed to clear API key");
                false
            }
        }
    }
}

impl KeySource for CredentialStore {
    fn get_api_key(&self, provider: &str) -> Result<Option<String>, CredentialError> {
        CredentialStore::get_api_key(self, provider)
    }
}

/// Environment lookup, injectable so tests never touch the process env.
pub type EnvLookup = dyn Fn(&str) -> Option<String> + Send + Sync;

pub fn process_env(name: &str) -> Option<String> {
    std::env::var(name).ok()
}

/// Stored key, then `env_var`, then the empty string. Store failures are
/// logged and treated as a missing key.
pub fn resolve_api_key(
    keys: &dyn KeySource,
    provider: &str,
    env_var: Option<&str>,
    env: &EnvLookup,
) -> String {
    let stored = match keys.get_api_key(provider) {
        Ok(key) => key,
        Err(err) => {
            warn!(provider, error = %err, "credential store lookup failed");
            None
        }
    };
    stored
        .filter(|key| !key.trim().is_empty())
        .or_else(|| env_var.and_then(|name| env(name)))
        .filter(|key| !key.trim().is_empty())
        .unwrap_or_default()
}
