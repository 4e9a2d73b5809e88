//! DashMap-based session storage implementation.
//!
//! Provides lock-free concurrent access to cached sessions using `DashMap`,
//! keyed by host key.

use std::sync::Arc;

use dashmap::DashMap;
use uuid::Uuid;

use crate::session::Session;
use crate::types::SessionInfo;

use super::traits::SessionStorage;

/// DashMap-based implementation of `SessionStorage`.
pub struct DashMapSessionStorage {
    sessions: DashMap<String, Arc<Session>>,
}

impl DashMapSessionStorage {
    /// Create a new session storage instance.
    pub fn new() -> Self {
        Self {
            sessions: DashMap::new(),
        }
    }
}

impl Default for DashMapSessionStorage {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionStorage for DashMapSessionStorage {
    fn insert(&self, session: Arc<Session>) -> Option<Arc<Session>> {
        self.sessions
            .insert(session.host_key().to_string(), session)
    }

    fn get(&self, host_key: &str) -> Option<Arc<Session>> {
        self.sessions.get(host_key).map(|entry| entry.value().clone())
    }

    fn remove(&self, host_key: &str) -> Option<Arc<Session>> {
        self.sessions.remove(host_key).map(|(_, session)| session)
    }

    fn remove_if_same(&self, host_key: &str, session_id: Uuid) -> Option<Arc<Session>> {
        self.sessions
            .remove_if(host_key, |_, session| session.id() == session_id)
            .map(|(_, session)| session)
    }

    fn contains(&self, host_key: &str) -> bool {
        self.sessions.contains_key(host_key)
    }

    fn host_keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.sessions.iter().map(|e| e.key().clone()).collect();
        keys.sort();
        keys
    }

    fn list(&self) -> Vec<SessionInfo> {
        let mut infos: Vec<SessionInfo> = self
            .sessions
            .iter()
            .map(|entry| entry.value().info())
            .collect();
        infos.sort_by(|a, b| a.host_key.cmp(&b.host_key));
        infos
    }
}
