//! Encryption for exchange API secrets at rest.
//!
//! Values are stored as base64 of `nonce || ciphertext` using AES-256-GCM with a
//! key derived from `APP_KEY`.

use aes_gcm::aead::{Aead, AeadCore, KeyInit, OsRng};
use aes_gcm::{Aes256Gcm, Key, Nonce};
use base64::{engine::general_purpose, Engine as _};
use sha2::{Digest, Sha256};

const NONCE_LEN: usize = 12;

#[derive(Debug, thiserror::Error)]
pub enum CipherError {
    #[error("APP_KEY must not be empty")]
    EmptyKey,
    #[error("stored value is not valid base64: {0}")]
    Encoding(#[from] base64::DecodeError),
    #[error("stored value is too short to contain a nonce")]
    Truncated,
    #[error("encryption failed")]
    Encrypt,
    #[error("decryption failed (wrong APP_KEY or corrupted value)")]
    Decrypt,
    #[error("decrypted value is not valid UTF-8")]
    Utf8(#[from] std::string::FromUtf8Error),
}

#[derive(Clone)]
pub struct CredentialCipher {
    cipher: Aes256Gcm,
}

impl CredentialCipher {
    pub fn new(app_key: &str) -> Result<Self, CipherError> {
        if app_key.is_empty() {
            return Err(CipherError::EmptyKey);
        }
        let digest = Sha256::digest(app_key.as_bytes());
        let key = Key::<Aes256Gcm>::from_slice(&digest);
        Ok(Self {
            cipher: Aes256Gcm::new(key),
        })
    }

    pub fn encrypt(&self, plaintext: &str) -> Result<String, CipherError> {
        let nonce = Aes256Gcm::generate_nonce(&mut OsRng);
        let ciphertext = self
            .cipher
            .encrypt(&nonce, plaintext.as_bytes())
            .map_err(|_| CipherError::Encrypt)?;

        let mut payload = Vec::with_capacity(NONCE_LEN + ciphertext.len());
        payload.extend_from_slice(&nonce);
        payload.extend_from_slice(&ciphertext);
        Ok(general_purpose::STANDARD.encode(payload))
    }

    pub fn decrypt(&self, stored: &str) -> Result<String, CipherError> {
        let payload = general_purpose::STANDARD.decode(stored)?;
        if payload.len() <= NONCE_LEN {
            return Err(CipherError::Truncated);
        }
        let (nonce, ciphertext) = payload.split_at(NONCE_LEN);
        let plaintext = self
            .cipher
            .decrypt(Nonce::from_slice(nonce), ciphertext)
            .map_err(|_| CipherError::Decrypt)?;
        Ok(String::from_utf8(plaintext)?)
    }
}
