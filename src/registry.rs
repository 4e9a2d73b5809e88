//! Host descriptors and the host registry.
//!
//! The inventory itself is owned by an external collaborator; the core only
//! needs `resolve(identifier) -> HostDescriptor`. [`StaticHostRegistry`]
//! serves descriptors loaded from the inventory file, a JSON object mapping
//! server names to descriptors:
//!
//! ```json
//! {
//!     "web-1": { "hostname": "203.0.113.10", "auth_type": "key", "key_path": "/app/.ssh/id_ed25519" },
//!     "db-1":  { "hostname": "db.example.com:2222", "username": "ops", "auth_type": "password", "password_ref": "DB1_PASSWORD" }
//! }
//! ```

use std::fmt;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::SessionError;

/// How a host expects to be authenticated.
///
/// Unknown values are kept verbatim so the resolver can report them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum AuthType {
    Key,
    Password,
    Unsupported(String),
}

impl From<String> for AuthType {
    fn from(value: String) -> Self {
        match value.as_str() {
            "key" => AuthType::Key,
            "password" => AuthType::Password,
            _ => AuthType::Unsupported(value),
        }
    }
}

impl From<AuthType> for String {
    fn from(value: AuthType) -> Self {
        value.to_string()
    }
}

impl fmt::Display for AuthType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AuthType::Key => write!(f, "key"),
            AuthType::Password => write!(f, "password"),
            AuthType::Unsupported(other) => write!(f, "{}", other),
        }
    }
}

fn default_username() -> String {
    "root".to_string()
}

/// Identity and authentication metadata of one remote machine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostDescriptor {
    /// DNS name or IP address, optionally with `:port`
    pub hostname: String,
    pub auth_type: AuthType,
    #[serde(default = "default_username")]
    pub username: String,
    /// Private key file for `key` auth
    #[serde(default, alias = "key_filename", skip_serializing_if = "Option::is_none")]
    pub key_path: Option<PathBuf>,
    /// Vault `ssh_key` credential name for `key` auth without a key file
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key_ref: Option<String>,
    /// Environment variable or vault credential name holding the password
    #[serde(default, alias = "password", skip_serializing_if = "Option::is_none")]
    pub password_ref: Option<String>,
}

impl HostDescriptor {
    /// Descriptor for key-file authentication as `root`.
    pub fn key(hostname: impl Into<String>, key_path: impl Into<PathBuf>) -> Self {
        Self {
            hostname: hostname.into(),
            auth_type: AuthType::Key,
            username: default_username(),
            key_path: Some(key_path.into()),
            key_ref: None,
            password_ref: None,
        }
    }

    /// Descriptor for password authentication as `root`.
    pub fn password(hostname: impl Into<String>, password_ref: impl Into<String>) -> Self {
        Self {
            hostname: hostname.into(),
            auth_type: AuthType::Password,
            username: default_username(),
            key_path: None,
            key_ref: None,
            password_ref: Some(password_ref.into()),
        }
    }

    pub fn with_username(mut self, username: impl Into<String>) -> Self {
        self.username = username.into();
        self
    }
}

/// Resolves host identifiers to descriptors.
#[async_trait]
pub trait HostRegistry: Send + Sync {
    /// Look up a host by name or address. `None` means the host is unknown.
    async fn resolve(&self, identifier: &str) -> Option<HostDescriptor>;
}

/// Registry over a fixed set of named descriptors.
#[derive(Default)]
pub struct StaticHostRegistry {
    hosts: DashMap<String, HostDescriptor>,
}

impl StaticHostRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load the inventory file. A missing file yields an empty registry.
    pub async fn from_json_file(path: impl AsRef<Path>) -> Result<Self, SessionError> {
        let path = path.as_ref();
        let registry = Self::new();

        let raw = match tokio::fs::read_to_string(path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                warn!("Host inventory {:?} not found, starting with no hosts", path);
                return Ok(registry);
            }
            Err(e) => {
                return Err(SessionError::Configuration(format!(
                    "failed to read host inventory {:?}: {}",
                    path, e
                )));
            }
        };

        let hosts: std::collections::BTreeMap<String, HostDescriptor> =
            serde_json::from_str(&raw).map_err(|e| {
                SessionError::Configuration(format!("invalid host inventory {:?}: {}", path, e))
            })?;
        for (name, descriptor) in hosts {
            registry.insert(name, descriptor);
        }

        info!("Loaded {} host(s) from {:?}", registry.hosts.len(), path);
        Ok(registry)
    }

    pub fn insert(&self, name: impl Into<String>, descriptor: HostDescriptor) {
        self.hosts.insert(name.into(), descriptor);
    }

    /// Registered server names, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.hosts.iter().map(|e| e.key().clone()).collect();
        names.sort();
        names
    }
}

#[async_trait]
impl HostRegistry for StaticHostRegistry {
    async fn resolve(&self, identifier: &str) -> Option<HostDescriptor> {
        if let Some(entry) = self.hosts.get(identifier) {
            return Some(entry.value().clone());
        }
        // Several names may share a hostname; the lowest name wins
        self.hosts
            .iter()
            .filter(|entry| entry.value().hostname == identifier)
            .min_by(|a, b| a.key().cmp(b.key()))
            .map(|entry| entry.value().clone())
    }
}
