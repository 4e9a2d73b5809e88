//! Storage trait definitions for sessions and credentials.
//!
//! These traits define the interface for storage implementations, enabling
//! dependency injection and testability through fakes.

use std::sync::Arc;

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::VaultError;
use crate::session::Session;
use crate::types::SessionInfo;
use crate::vault::Credential;

/// Trait for session cache operations.
///
/// Implementations must be thread-safe (`Send + Sync`) for use across
/// async tasks. The default implementation uses `DashMap` for lock-free
/// concurrent access. Connect-vs-close ordering per key is enforced by the
/// session manager, not by the storage.
pub trait SessionStorage: Send + Sync {
    /// Cache a session under its host key, returning any session it replaced.
    fn insert(&self, session: Arc<Session>) -> Option<Arc<Session>>;

    /// Get the session cached under a host key.
    fn get(&self, host_key: &str) -> Option<Arc<Session>>;

    /// Remove the session cached under a host key.
    fn remove(&self, host_key: &str) -> Option<Arc<Session>>;

    /// Remove the session cached under a host key only if it is the session
    /// with the given id.
    fn remove_if_same(&self, host_key: &str, session_id: Uuid) -> Option<Arc<Session>>;

    /// Check if a session is cached for a host key.
    fn contains(&self, host_key: &str) -> bool;

    /// Get all cached host keys.
    fn host_keys(&self) -> Vec<String>;

    /// List metadata of all cached sessions.
    fn list(&self) -> Vec<SessionInfo>;
}

/// Trait for credential persistence.
///
/// Name uniqueness is enforced here, atomically with the insert, so callers
/// never pre-check and race.
#[async_trait]
pub trait CredentialRepository: Send + Sync {
    /// Persist a new credential. Fails with `DuplicateName` on name collision.
    async fn insert(&self, credential: Credential) -> Result<Credential, VaultError>;

    /// All stored credentials, oldest first.
    async fn list(&self) -> Result<Vec<Credential>, VaultError>;

    async fn find_by_name(&self, name: &str) -> Result<Option<Credential>, VaultError>;

    /// Delete a credential, returning whether it existed.
    async fn remove(&self, credential: &Credential) -> Result<bool, VaultError>;
}
