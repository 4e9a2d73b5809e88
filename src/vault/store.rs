//! Named credentials, encrypted at rest.

use std::sync::Arc;

use secrecy::{ExposeSecret, SecretString};
use tracing::info;

use crate::error::VaultError;
use crate::storage::{CredentialRepository, InMemoryCredentialRepository};
use crate::types::CredentialMetadata;

use super::{Credential, CredentialType, SecretCipher};

/// CRUD over credentials whose secret is always encrypted before it reaches
/// the repository.
pub struct CredentialStore {
    cipher: Arc<SecretCipher>,
    repository: Arc<dyn CredentialRepository>,
}

impl CredentialStore {
    pub fn new(cipher: Arc<SecretCipher>, repository: Arc<dyn CredentialRepository>) -> Self {
        Self { cipher, repository }
    }

    /// Store backed by an in-memory repository.
    pub fn in_memory(cipher: Arc<SecretCipher>) -> Self {
        Self::new(cipher, Arc::new(InMemoryCredentialRepository::new()))
    }

    /// Encrypt and persist a new credential.
    ///
    /// Name collisions are detected by the repository and surface as
    /// [`VaultError::DuplicateName`].
    pub async fn create(
        &self,
        name: &str,
        credential_type: CredentialType,
        secret: SecretString,
    ) -> Result<Credential, VaultError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(VaultError::Configuration(
                "credential name must not be empty".to_string(),
            ));
        }

        let ciphertext = self.cipher.encrypt(secret.expose_secret())?;
        drop(secret);

        let credential = self
            .repository
            .insert(Credential::new(name, credential_type, ciphertext))
            .await?;
        info!(
            "Stored {} credential '{}' ({})",
            credential.credential_type, credential.name, credential.id
        );
        Ok(credential)
    }

    /// Metadata of every stored credential. Secrets are never included.
    pub async fn list(&self) -> Result<Vec<CredentialMetadata>, VaultError> {
        Ok(self
            .repository
            .list()
            .await?
            .iter()
            .map(Credential::metadata)
            .collect())
    }

    pub async fn get_by_name(&self, name: &str) -> Result<Credential, VaultError> {
        self.repository
            .find_by_name(name)
            .await?
            .ok_or_else(|| VaultError::NotFound(name.to_string()))
    }

    pub async fn delete(&self, credential: &Credential) -> Result<(), VaultError> {
        if !self.repository.remove(credential).await? {
            return Err(VaultError::NotFound(credential.name.clone()));
        }
        info!("Deleted credential '{}' ({})", credential.name, credential.id);
        Ok(())
    }

    /// Decrypt a credential's secret.
    ///
    /// The only decrypting operation; reserved for the connection resolver.
    pub(crate) fn reveal(&self, credential: &Credential) -> Result<SecretString, VaultError> {
        self.cipher.decrypt(&credential.secret_ciphertext)
    }
}
