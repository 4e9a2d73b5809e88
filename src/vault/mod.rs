//! Credential vault.
//!
//! - `cipher`: [`SecretCipher`], one process-wide symmetric key
//! - `store`: [`CredentialStore`], named credentials encrypted at rest
//!
//! Plaintext only leaves the vault through `CredentialStore::reveal`, which is
//! crate-internal and used by the connection resolver while one connection is
//! being established.

mod cipher;
mod store;

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::types::CredentialMetadata;

pub use cipher::SecretCipher;
pub use store::CredentialStore;

/// Kind of secret a credential holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum CredentialType {
    /// PEM/OpenSSH encoded private key
    SshKey,
    /// Login password
    Password,
}

impl fmt::Display for CredentialType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CredentialType::SshKey => write!(f, "ssh_key"),
            CredentialType::Password => write!(f, "password"),
        }
    }
}

impl FromStr for CredentialType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "ssh_key" => Ok(CredentialType::SshKey),
            "password" => Ok(CredentialType::Password),
            other => Err(format!(
                "unknown credential type '{other}', expected 'ssh_key' or 'password'"
            )),
        }
    }
}

/// A named secret whose value is only ever held encrypted.
///
/// Not `Serialize`: records cross the external boundary as
/// [`CredentialMetadata`] only.
#[derive(Clone)]
pub struct Credential {
    pub id: Uuid,
    pub name: String,
    pub credential_type: CredentialType,
    pub(crate) secret_ciphertext: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Credential {
    pub(crate) fn new(
        name: impl Into<String>,
        credential_type: CredentialType,
        secret_ciphertext: String,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            credential_type,
            secret_ciphertext,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn metadata(&self) -> CredentialMetadata {
        CredentialMetadata {
            id: self.id.to_string(),
            name: self.name.clone(),
            credential_type: self.credential_type,
            created_at: self.created_at.to_rfc3339(),
            updated_at: self.updated_at.to_rfc3339(),
        }
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("credential_type", &self.credential_type)
            .field("created_at", &self.created_at)
            .finish_non_exhaustive()
    }
}
