//! Cached SSH sessions.
//!
//! A [`Session`] pairs one live connection with the identity it was cached
//! under. Sessions are shared as `Arc<Session>`; the [`SessionManager`] is the
//! only component that creates, caches or tears them down.

mod manager;

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::{Mutex, MutexGuard};
use uuid::Uuid;

use crate::registry::HostDescriptor;
use crate::transport::Connection;
use crate::types::SessionInfo;

pub use manager::SessionManager;

pub struct Session {
    id: Uuid,
    host_key: String,
    hostname: String,
    username: String,
    created_at: DateTime<Utc>,
    connection: Arc<dyn Connection>,
    /// Serializes command execution when the transport cannot run several
    /// channels over one connection.
    exec_gate: Option<Mutex<()>>,
}

impl Session {
    pub(crate) fn new(
        host_key: impl Into<String>,
        descriptor: &HostDescriptor,
        connection: Arc<dyn Connection>,
    ) -> Self {
        let exec_gate = (!connection.multiplexed()).then(|| Mutex::new(()));
        Self {
            id: Uuid::new_v4(),
            host_key: host_key.into(),
            hostname: descriptor.hostname.clone(),
            username: descriptor.username.clone(),
            created_at: Utc::now(),
            connection,
            exec_gate,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn host_key(&self) -> &str {
        &self.host_key
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn info(&self) -> SessionInfo {
        SessionInfo {
            session_id: self.id.to_string(),
            host_key: self.host_key.clone(),
            hostname: self.hostname.clone(),
            username: self.username.clone(),
            created_at: self.created_at.to_rfc3339(),
        }
    }

    pub(crate) fn connection(&self) -> &Arc<dyn Connection> {
        &self.connection
    }

    /// Wait for exclusive use of the connection if it is not multiplexed.
    pub(crate) async fn exec_permit(&self) -> Option<MutexGuard<'_, ()>> {
        match &self.exec_gate {
            Some(gate) => Some(gate.lock().await),
            None => None,
        }
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.id)
            .field("host_key", &self.host_key)
            .field("username", &self.username)
            .field("created_at", &self.created_at)
            .finish_non_exhaustive()
    }
}
