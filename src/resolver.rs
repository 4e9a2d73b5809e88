//! Authentication method resolution.
//!
//! Turns a [`HostDescriptor`] into [`AuthParams`], materializing secrets from
//! the environment or the vault. A secret that cannot be found always blocks
//! the connection; there is no fallback to a default or to an unauthenticated
//! attempt.
//!
//! # Password lookup order
//!
//! 1. Environment variable named by `password_ref`
//! 2. Vault `password` credential named by `password_ref`
//!
//! Plaintext is held in [`SecretString`] and lives only until the connector
//! has finished authenticating.

use std::env;
use std::path::PathBuf;
use std::sync::Arc;

use secrecy::SecretString;
use tracing::debug;

use crate::error::{SessionError, VaultError};
use crate::registry::{AuthType, HostDescriptor};
use crate::vault::{CredentialStore, CredentialType};

/// Materialized connection credentials.
#[derive(Debug)]
pub enum AuthParams {
    /// Private key read from a file by the transport.
    Key { username: String, key_path: PathBuf },
    /// Password authentication.
    Password {
        username: String,
        password: SecretString,
    },
    /// Private key held in memory, decrypted from the vault.
    KeyMaterial { username: String, key: SecretString },
}

impl AuthParams {
    pub fn username(&self) -> &str {
        match self {
            AuthParams::Key { username, .. }
            | AuthParams::Password { username, .. }
            | AuthParams::KeyMaterial { username, .. } => username,
        }
    }

    pub fn method(&self) -> &'static str {
        match self {
            AuthParams::Key { .. } => "key",
            AuthParams::Password { .. } => "password",
            AuthParams::KeyMaterial { .. } => "vault-key",
        }
    }
}

/// Resolves the authentication method for a host.
#[derive(Clone, Default)]
pub struct ConnectionResolver {
    vault: Option<Arc<CredentialStore>>,
}

impl ConnectionResolver {
    /// Resolver that reads secrets from the environment only.
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolver that falls back to the vault for named secrets.
    pub fn with_vault(vault: Arc<CredentialStore>) -> Self {
        Self { vault: Some(vault) }
    }

    pub async fn resolve_auth(
        &self,
        host_key: &str,
        descriptor: &HostDescriptor,
    ) -> Result<AuthParams, SessionError> {
        let username = descriptor.username.clone();

        match &descriptor.auth_type {
            AuthType::Key => {
                // Existence is checked by the transport so the failure surfaces uniformly
                if let Some(key_path) = descriptor
                    .key_path
                    .as_ref()
                    .filter(|p| !p.as_os_str().is_empty())
                {
                    return Ok(AuthParams::Key {
                        username,
                        key_path: key_path.clone(),
                    });
                }
                if let Some(key_ref) = non_empty(descriptor.key_ref.as_deref()) {
                    let key = self
                        .reveal_from_vault(key_ref, CredentialType::SshKey)
                        .await?;
                    return Ok(AuthParams::KeyMaterial { username, key });
                }
                Err(SessionError::Configuration(format!(
                    "host {} uses key auth but has no key_path or key_ref",
                    host_key
                )))
            }
            AuthType::Password => {
                let password_ref =
                    non_empty(descriptor.password_ref.as_deref()).ok_or_else(|| {
                        SessionError::Configuration(format!(
                            "host {} uses password auth but has no password_ref",
                            host_key
                        ))
                    })?;
                let password = self.lookup_password(password_ref).await?;
                Ok(AuthParams::Password { username, password })
            }
            AuthType::Unsupported(other) => Err(SessionError::UnsupportedAuthType {
                host_key: host_key.to_string(),
                auth_type: other.clone(),
            }),
        }
    }

    async fn lookup_password(&self, password_ref: &str) -> Result<SecretString, SessionError> {
        if let Ok(value) = env::var(password_ref)
            && !value.is_empty()
        {
            debug!("Resolved password reference '{}' from environment", password_ref);
            return Ok(SecretString::new(value));
        }

        if self.vault.is_some() {
            return self
                .reveal_from_vault(password_ref, CredentialType::Password)
                .await;
        }

        Err(missing_secret(password_ref))
    }

    async fn reveal_from_vault(
        &self,
        name: &str,
        expected: CredentialType,
    ) -> Result<SecretString, SessionError> {
        let vault = self.vault.as_ref().ok_or_else(|| missing_secret(name))?;

        let credential = match vault.get_by_name(name).await {
            Ok(credential) => credential,
            Err(VaultError::NotFound(_)) => return Err(missing_secret(name)),
            Err(e) => return Err(e.into()),
        };
        if credential.credential_type != expected {
            return Err(SessionError::Configuration(format!(
                "referenced secret '{}' is a {} credential, expected {}",
                name, credential.credential_type, expected
            )));
        }

        debug!("Resolved secret reference '{}' from vault", name);
        Ok(vault.reveal(&credential)?)
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

fn missing_secret(name: &str) -> SessionError {
    SessionError::Configuration(format!("referenced secret '{}' not available", name))
}
