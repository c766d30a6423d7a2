//! Reversible encryption for secrets stored on disk.
//!
//! Blobs are `nonce (12 bytes) || AES-256-GCM ciphertext`. The production
//! cipher keeps its 256-bit master key in the OS keyring and generates it on
//! first use; whether the keyring can be reached decides whether encryption
//! is available at all.

use crate::core::keyring::{KeyringAccessError, KeyringSlot};
use aes_gcm::{
    aead::{Aead, AeadCore, KeyInit, OsRng},
    Aes256Gcm, Key, Nonce,
};
use base64::{engine::general_purpose, Engine as _};
use std::error::Error;
use std::fmt;
use std::sync::Mutex;
use tracing::{debug, warn};

const NONCE_LEN: usize = 12;
const MASTER_KEY_ACCOUNT: &str = "credential-master-key";

#[derive(Debug)]
pub enum CipherError {
    Unavailable(String),
    Keyring(KeyringAccessError),
    Encrypt,
    Decrypt,
    Malformed,
}

impl fmt::Display for CipherError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CipherError::Unavailable(reason) => write!(f, "encryption unavailable: {reason}"),
            CipherError::Keyring(err) => write!(f, "{err}"),
            CipherError::Encrypt => write!(f, "failed to encrypt secret"),
            CipherError::Decrypt => write!(f, "failed to decrypt secret"),
            CipherError::Malformed => write!(f, "encrypted secret is truncated"),
        }
    }
}

impl Error for CipherError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            CipherError::Keyring(err) => Some(err),
            _ => None,
        }
    }
}

impl From<KeyringAccessError> for CipherError {
    fn from(err: KeyringAccessError) -> Self {
        CipherError::Keyring(err)
    }
}

pub trait SecretCipher: Send + Sync {
    fn is_available(&self) -> bool;
    fn encrypt(&self, plaintext: &[u8]) -> Result<Vec<u8>, CipherError>;
    fn decrypt(&self, blob: &[u8]) -> Result<Vec<u8>, CipherError>;
}

fn seal(key: &[u8; 32], plaintext: &[u8]) -> Result<Vec<u8>, CipherError> {
    let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key));
    let nonce = Aes256Gcm::generate_nonce(&mut OsRng);
    let ciphertext = cipher
        .encrypt(&nonce, plaintext)
        .map_err(|_| CipherError::Encrypt)?;

    let mut blob = Vec::with_capacity(NONCE_LEN + ciphertext.len());
    blob.extend_from_slice(&nonce);
    blob.extend_from_slice(&ciphertext);
    Ok(blob)
}

fn open(key: &[u8; 32], blob: &[u8]) -> Result<Vec<u8>, CipherError> {
    if blob.len() <= NONCE_LEN {
        return Err(CipherError::Malformed);
    }
    let (nonce, ciphertext) = blob.split_at(NONCE_LEN);
    let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key));
    cipher
        .decrypt(Nonce::from_slice(nonce), ciphertext)
        .map_err(|_| CipherError::Decrypt)
}

/// AES-256-GCM with the master key held in the OS keyring.
pub struct KeyringCipher {
    slot: KeyringSlot,
    cached_key: Mutex<Option<[u8; 32]>>,
}

impl Default for KeyringCipher {
    fn default() -> Self {
        Self::new()
    }
}

impl KeyringCipher {
    pub fn new() -> Self {
        Self {
            slot: KeyringSlot::new(MASTER_KEY_ACCOUNT),
            cached_key: Mutex::new(None),
        }
    }

    fn master_key(&self) -> Result<[u8; 32], CipherError> {
        let mut cached = self
            .cached_key
            .lock()
            .map_err(|_| CipherError::Unavailable("key cache poisoned".to_string()))?;
        if let Some(key) = *cached {
            return Ok(key);
        }

        let key = match self.slot.get()? {
            Some(encoded) => decode_master_key(&encoded)?,
            None => {
                debug!("generating credential master key");
                let generated = Aes256Gcm::generate_key(OsRng);
                let mut key = [0u8; 32];
                key.copy_from_slice(&generated);
                self.slot.set(&general_purpose::STANDARD.encode(key))?;
                key
            }
        };
        *cached = Some(key);
        Ok(key)
    }
}

fn decode_master_key(encoded: &str) -> Result<[u8; 32], CipherError> {
    let bytes = general_purpose::STANDARD
        .decode(encoded.trim())
        .map_err(|_| CipherError::Unavailable("master key is not valid base64".to_string()))?;
    bytes
        .try_into()
        .map_err(|_| CipherError::Unavailable("master key has the wrong length".to_string()))
}

impl SecretCipher for KeyringCipher {
    fn is_available(&self) -> bool {
        match self.master_key() {
            Ok(_) => true,
            Err(err) => {
                warn!(error = %err, "secret encryption is unavailable");
                false
            }
        }
    }

    fn encrypt(&self, plaintext: &[u8]) -> Result<Vec<u8>, CipherError> {
        seal(&self.master_key()?, plaintext)
    }

    fn decrypt(&self, blob: &[u8]) -> Result<Vec<u8>, CipherError> {
        open(&self.master_key()?, blob)
    }
}

/// Cipher with a caller-supplied key. Used for tests and headless setups
/// where no keyring daemon runs.
pub struct StaticKeyCipher {
    key: [u8; 32],
}

impl StaticKeyCipher {
    pub fn new(key: [u8; 32]) -> Self {
        Self { key }
    }
}

impl SecretCipher for StaticKeyCipher {
    fn is_available(&self) -> bool {
        true
    }

    fn encrypt(&self, plaintext: &[u8]) -> Result<Vec<u8>, CipherError> {
        seal(&self.key, plaintext)
    }

    fn decrypt(&self, blob: &[u8]) -> Result<Vec<u8>, CipherError> {
        open(&self.key, blob)
    }
}

/// Cipher that always reports encryption as unavailable.
#[derive(Debug, Default)]
pub struct UnavailableCipher;

impl SecretCipher for UnavailableCipher {
    fn is_available(&self) -> bool {
        false
    }

    fn encrypt(&self, _plaintext: &[u8]) -> Result<Vec<u8>, CipherError> {
        Err(CipherError::Unavailable("no secret backend".to_string()))
    }

    fn decrypt(&self, _blob: &[u8]) -> Result<Vec<u8>, CipherError> {
        Err(CipherError::Unavailable("no secret backend".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sealed_blob_starts_with_nonce_and_opens() {
        let cipher = StaticKeyCipher::new([7u8; 32]);
        let blob = cipher.encrypt(b"sk-test").unwrap();
        assert_eq!(blob.len(), NONCE_LEN + b"sk-test".len() + 16);
        assert_eq!(cipher.decrypt(&blob).unwrap(), b"sk-test");
    }

    #[test]
    fn wrong_key_fails_to_decrypt() {
        let blob = StaticKeyCipher::new([1u8; 32]).encrypt(b"secret").unwrap();
        let err = StaticKeyCipher::new([2u8; 32]).decrypt(&blob).unwrap_err();
        assert!(matches!(err, CipherError::Decrypt));
    }

    #[test]
    fn truncated_blob_is_malformed() {
        let cipher = StaticKeyCipher::new([3u8; 32]);
        assert!(matches!(
            cipher.decrypt(b"short"),
            Err(CipherError::Malformed)
        ));
    }

    #[test]
    fn master_key_must_be_32_bytes() {
        let short = general_purpose::STANDARD.encode([0u8; 16]);
        assert!(decode_master_key(&short).is_err());
        let ok = general_purpose::STANDARD.encode([9u8; 32]);
        assert_eq!(decode_master_key(&ok).unwrap(), [9u8; 32]);
    }
}
