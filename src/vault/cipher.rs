//! Symmetric authenticated encryption of secret strings.
//!
//! Ciphertext format: `v1:` followed by unpadded base64url of
//! `nonce (24 bytes) || ciphertext || tag (16 bytes)`, sealed with
//! XChaCha20-Poly1305 under one process-wide key.

use std::fmt;

use base64::Engine;
use base64::engine::general_purpose::{STANDARD, URL_SAFE_NO_PAD};
use chacha20poly1305::aead::{Aead, AeadCore, KeyInit, OsRng};
use chacha20poly1305::{XChaCha20Poly1305, XNonce};
use secrecy::SecretString;
use zeroize::{Zeroize, Zeroizing};

use crate::config::VAULT_KEY_ENV_VAR;
use crate::error::VaultError;

const CIPHERTEXT_PREFIX: &str = "v1:";
const KEY_LEN: usize = 32;
const NONCE_LEN: usize = 24;
const TAG_LEN: usize = 16;

/// Encrypts and decrypts vault secrets with a single key loaded at startup.
pub struct SecretCipher {
    cipher: XChaCha20Poly1305,
}

impl SecretCipher {
    /// Load the key from `VAULT_KEY`.
    ///
    /// A missing or malformed key is a [`VaultError::Configuration`]; the
    /// process must not start serving when this fails.
    pub fn from_env() -> Result<Self, VaultError> {
        let encoded = Zeroizing::new(std::env::var(VAULT_KEY_ENV_VAR).map_err(|_| {
            VaultError::Configuration(format!(
                "{VAULT_KEY_ENV_VAR} environment variable must be set"
            ))
        })?);
        Self::from_encoded_key(&encoded)
    }

    /// Build a cipher from a base64-encoded 32-byte key.
    pub fn from_encoded_key(encoded: &str) -> Result<Self, VaultError> {
        let encoded = encoded.trim();
        if encoded.is_empty() {
            return Err(VaultError::Configuration("vault key is empty".to_string()));
        }
        let key = Zeroizing::new(
            STANDARD
                .decode(encoded)
                .or_else(|_| URL_SAFE_NO_PAD.decode(encoded))
                .map_err(|_| {
                    VaultError::Configuration("vault key must be base64-encoded".to_string())
                })?,
        );
        Self::from_key_bytes(&key)
    }

    /// Build a cipher from raw key bytes.
    pub fn from_key_bytes(key: &[u8]) -> Result<Self, VaultError> {
        if key.len() != KEY_LEN {
            return Err(VaultError::Configuration(format!(
                "vault key must be {KEY_LEN} bytes, got {}",
                key.len()
            )));
        }
        let cipher = XChaCha20Poly1305::new_from_slice(key)
            .map_err(|_| VaultError::Configuration("invalid vault key".to_string()))?;
        Ok(Self { cipher })
    }

    /// Generate a fresh random key in the encoding `from_encoded_key` accepts.
    pub fn generate_key() -> String {
        let key = XChaCha20Poly1305::generate_key(&mut OsRng);
        STANDARD.encode(key.as_slice())
    }

    pub fn encrypt(&self, plaintext: &str) -> Result<String, VaultError> {
        let nonce = XChaCha20Poly1305::generate_nonce(&mut OsRng);
        let sealed = self
            .cipher
            .encrypt(&nonce, plaintext.as_bytes())
            .map_err(|_| VaultError::Crypto("encryption failed".to_string()))?;

        let mut raw = Vec::with_capacity(NONCE_LEN + sealed.len());
        raw.extend_from_slice(nonce.as_slice());
        raw.extend_from_slice(&sealed);
        Ok(format!("{CIPHERTEXT_PREFIX}{}", URL_SAFE_NO_PAD.encode(raw)))
    }

    /// Decrypt a value produced by [`SecretCipher::encrypt`].
    ///
    /// Malformed input or a key mismatch is always an error, never an empty
    /// or default secret.
    pub fn decrypt(&self, ciphertext: &str) -> Result<SecretString, VaultError> {
        let body = ciphertext
            .strip_prefix(CIPHERTEXT_PREFIX)
            .ok_or_else(|| VaultError::Crypto("unrecognized ciphertext format".to_string()))?;
        let raw = URL_SAFE_NO_PAD
            .decode(body)
            .map_err(|_| VaultError::Crypto("ciphertext is not valid base64".to_string()))?;
        if raw.len() < NONCE_LEN + TAG_LEN {
            return Err(VaultError::Crypto("ciphertext too short".to_string()));
        }

        let (nonce, sealed) = raw.split_at(NONCE_LEN);
        let plaintext = self
            .cipher
            .decrypt(XNonce::from_slice(nonce), sealed)
            .map_err(|_| {
                VaultError::Crypto(
                    "decryption failed: ciphertext corrupt or sealed under a different key"
                        .to_string(),
                )
            })?;

        let plaintext = String::from_utf8(plaintext).map_err(|e| {
            e.into_bytes().zeroize();
            VaultError::Crypto("decrypted secret is not valid UTF-8".to_string())
        })?;
        Ok(SecretString::new(plaintext))
    }
}

impl fmt::Debug for SecretCipher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SecretCipher").finish_non_exhaustive()
    }
}
