//! Credential repositories.
//!
//! - [`InMemoryCredentialRepository`]: DashMap keyed by credential name; the
//!   `entry` API makes the duplicate-name check atomic with the insert.
//! - [`FileCredentialRepository`]: the in-memory repository mirrored to a
//!   JSON file after every mutation. The file only ever holds ciphertext.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::VaultError;
use crate::vault::{Credential, CredentialType};

use super::traits::CredentialRepository;

/// In-memory credential repository.
pub struct InMemoryCredentialRepository {
    credentials: DashMap<String, Credential>,
}

impl InMemoryCredentialRepository {
    pub fn new() -> Self {
        Self {
            credentials: DashMap::new(),
        }
    }

    fn insert_now(&self, credential: Credential) -> Result<Credential, VaultError> {
        match self.credentials.entry(credential.name.clone()) {
            Entry::Occupied(_) => Err(VaultError::DuplicateName(credential.name)),
            Entry::Vacant(slot) => {
                slot.insert(credential.clone());
                Ok(credential)
            }
        }
    }

    fn remove_now(&self, credential: &Credential) -> Option<Credential> {
        self.credentials
            .remove_if(&credential.name, |_, stored| stored.id == credential.id)
            .map(|(_, removed)| removed)
    }

    fn snapshot(&self) -> Vec<Credential> {
        let mut all: Vec<Credential> = self
            .credentials
            .iter()
            .map(|entry| entry.value().clone())
            .collect();
        all.sort_by(|a, b| {
            a.created_at
                .cmp(&b.created_at)
                .then_with(|| a.name.cmp(&b.name))
        });
        all
    }
}

impl Default for InMemoryCredentialRepository {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CredentialRepository for InMemoryCredentialRepository {
    async fn insert(&self, credential: Credential) -> Result<Credential, VaultError> {
        self.insert_now(credential)
    }

    async fn list(&self) -> Result<Vec<Credential>, VaultError> {
        Ok(self.snapshot())
    }

    async fn find_by_name(&self, name: &str) -> Result<Option<Credential>, VaultError> {
        Ok(self.credentials.get(name).map(|entry| entry.value().clone()))
    }

    async fn remove(&self, credential: &Credential) -> Result<bool, VaultError> {
        Ok(self.remove_now(credential).is_some())
    }
}

/// On-disk shape of one credential record.
#[derive(Serialize, Deserialize)]
struct StoredCredential {
    id: Uuid,
    name: String,
    #[serde(rename = "type")]
    credential_type: CredentialType,
    secret: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<&Credential> for StoredCredential {
    fn from(credential: &Credential) -> Self {
        Self {
            id: credential.id,
            name: credential.name.clone(),
            credential_type: credential.credential_type,
            secret: credential.secret_ciphertext.clone(),
            created_at: credential.created_at,
            updated_at: credential.updated_at,
        }
    }
}

impl From<StoredCredential> for Credential {
    fn from(stored: StoredCredential) -> Self {
        Credential {
            id: stored.id,
            name: stored.name,
            credential_type: stored.credential_type,
            secret_ciphertext: stored.secret,
            created_at: stored.created_at,
            updated_at: stored.updated_at,
        }
    }
}

/// Credential repository persisted to a JSON file.
pub struct FileCredentialRepository {
    path: PathBuf,
    inner: InMemoryCredentialRepository,
    /// Held across mutate-then-write so file snapshots are never interleaved.
    write_lock: Mutex<()>,
}

impl FileCredentialRepository {
    /// Open the repository, loading existing records if the file exists.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, VaultError> {
        let path = path.as_ref().to_path_buf();
        let inner = InMemoryCredentialRepository::new();

        match tokio::fs::read(&path).await {
            Ok(bytes) => {
                let records: Vec<StoredCredential> = serde_json::from_slice(&bytes).map_err(
                    |e| VaultError::Storage(format!("invalid credential file {:?}: {}", path, e)),
                )?;
                for record in records {
                    inner.insert_now(record.into())?;
                }
                info!(
                    "Loaded {} credential(s) from {:?}",
                    inner.credentials.len(),
                    path
                );
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                info!("Credential file {:?} does not exist yet, starting empty", path);
            }
            Err(e) => {
                return Err(VaultError::Storage(format!(
                    "failed to read {:?}: {}",
                    path, e
                )));
            }
        }

        Ok(Self {
            path,
            inner,
            write_lock: Mutex::new(()),
        })
    }

    async fn persist(&self) -> Result<(), VaultError> {
        let records: Vec<StoredCredential> = self
            .inner
            .snapshot()
            .iter()
            .map(StoredCredential::from)
            .collect();
        let json = serde_json::to_vec_pretty(&records)
            .map_err(|e| VaultError::Storage(format!("failed to encode credentials: {}", e)))?;

        // Write to a sibling file and rename so a crash never truncates the store
        let tmp = self.path.with_extension("tmp");
        tokio::fs::write(&tmp, json)
            .await
            .map_err(|e| VaultError::Storage(format!("failed to write {:?}: {}", tmp, e)))?;
        tokio::fs::rename(&tmp, &self.path)
            .await
            .map_err(|e| VaultError::Storage(format!("failed to replace {:?}: {}", self.path, e)))?;

        debug!("Persisted {} credential(s) to {:?}", records.len(), self.path);
        Ok(())
    }
}

#[async_trait]
impl CredentialRepository for FileCredentialRepository {
    async fn insert(&self, credential: Credential) -> Result<Credential, VaultError> {
        let _guard = self.write_lock.lock().await;
        let inserted = self.inner.insert_now(credential)?;
        if let Err(e) = self.persist().await {
            self.inner.remove_now(&inserted);
            return Err(e);
        }
        Ok(inserted)
    }

    async fn list(&self) -> Result<Vec<Credential>, VaultError> {
        self.inner.list().await
    }

    async fn find_by_name(&self, name: &str) -> Result<Option<Credential>, VaultError> {
        self.inner.find_by_name(name).await
    }

    async fn remove(&self, credential: &Credential) -> Result<bool, VaultError> {
        let _guard = self.write_lock.lock().await;
        let Some(removed) = self.inner.remove_now(credential) else {
            return Ok(false);
        };
        if let Err(e) = self.persist().await {
            // Put the record back so memory and disk stay in agreement
            let _ = self.inner.insert_now(removed);
            return Err(e);
        }
        Ok(true)
    }
}
