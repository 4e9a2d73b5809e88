//! Remote command execution over cached SSH sessions, backed by an encrypted
//! credential vault.
//!
//! The crate is organized into the following modules:
//!
//! - `vault`: secret cipher and credential store
//! - `registry`: host descriptors and the host registry
//! - `resolver`: authentication method resolution for a host
//! - `auth`: russh authentication strategies
//! - `transport`: connector/connection seam and the russh implementation
//! - `session`: session cache and the session manager
//! - `executor`: remote command execution and output collection
//! - `storage`: session and credential storage backends
//! - `config`: environment-driven configuration
//! - `error`: typed error taxonomy
//! - `mcp`: MCP tool surface
//! - `runtime`: process wiring shared by the binaries

pub mod auth;
pub mod config;
pub mod error;
pub mod executor;
pub mod mcp;
pub mod registry;
pub mod resolver;
pub mod runtime;
pub mod session;
pub mod storage;
pub mod transport;
pub mod types;
pub mod vault;

pub use error::{ErrorKind, SessionError, VaultError};
pub use executor::RemoteExecutor;
pub use registry::{HostDescriptor, HostRegistry, StaticHostRegistry};
pub use resolver::{AuthParams, ConnectionResolver};
pub use session::{Session, SessionManager};
pub use types::ExecutionResult;
pub use vault::{CredentialStore, CredentialType, SecretCipher};
