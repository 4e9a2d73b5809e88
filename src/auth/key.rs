//! Private key SSH authentication.

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use russh::{client, keys};
use secrecy::{ExposeSecret, SecretString};
use tracing::debug;

use crate::transport::SshClientHandler;

use super::traits::{AuthFailure, AuthStrategy};

enum KeySource {
    File(PathBuf),
    /// OpenSSH/PEM text decrypted from the vault; never written to disk.
    Pem(SecretString),
}

/// Private key authentication strategy.
///
/// Supports passphrase-less keys only.
pub struct KeyAuth {
    source: KeySource,
}

impl KeyAuth {
    pub fn from_file(key_path: impl Into<PathBuf>) -> Self {
        Self {
            source: KeySource::File(key_path.into()),
        }
    }

    pub fn from_pem(key: SecretString) -> Self {
        Self {
            source: KeySource::Pem(key),
        }
    }

    fn load(&self) -> Result<keys::PrivateKey, AuthFailure> {
        match &self.source {
            KeySource::File(path) => keys::load_secret_key(path, None).map_err(|e| {
                AuthFailure::Credential(format!("Failed to load private key from {:?}: {}", path, e))
            }),
            KeySource::Pem(pem) => keys::decode_secret_key(pem.expose_secret(), None)
                .map_err(|e| AuthFailure::Credential(format!("Failed to decode private key: {}", e))),
        }
    }
}

#[async_trait]
impl AuthStrategy for KeyAuth {
    async fn authenticate(
        &self,
        handle: &mut client::Handle<SshClientHandler>,
        username: &str,
    ) -> Result<bool, AuthFailure> {
        let key_pair = self.load()?;

        // RSA keys sign with the best hash the server advertises
        let hash_alg = handle
            .best_supported_rsa_hash()
            .await
            .ok()
            .flatten()
            .flatten();
        debug!("Using RSA hash algorithm for key auth: {:?}", hash_alg);

        let key_with_hash = keys::PrivateKeyWithHashAlg::new(Arc::new(key_pair), hash_alg);

        let result = handle
            .authenticate_publickey(username, key_with_hash)
            .await
            .map_err(|e| AuthFailure::classify(format!("Key authentication failed: {}", e)))?;

        Ok(result.success())
    }

    fn name(&self) -> &'static str {
        "key"
    }
}
