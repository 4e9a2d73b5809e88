//! Connection transport.
//!
//! The session manager talks to remote hosts only through [`Connector`] and
//! [`Connection`]. [`SshConnector`] is the russh implementation; tests swap in
//! in-process fakes.

mod handler;
mod ssh;

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::SessionError;
use crate::registry::HostDescriptor;
use crate::resolver::AuthParams;

pub use handler::SshClientHandler;
pub use ssh::{ConnectSettings, SshConnection, SshConnector};

/// Bytes read from one command.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawOutput {
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
    pub exit_code: Option<u32>,
    /// The channel reached a clean end of command.
    pub complete: bool,
}

/// A command could not run to completion.
#[derive(Debug, Clone)]
pub struct ExecFailure {
    pub reason: String,
    /// Whatever was read before the failure.
    pub partial: RawOutput,
}

impl ExecFailure {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
            partial: RawOutput::default(),
        }
    }
}

/// Establishes authenticated connections.
#[async_trait]
pub trait Connector: Send + Sync {
    /// Connect to `descriptor` and authenticate with exactly the given
    /// credentials. Secrets in `auth` are dropped when this returns.
    async fn connect(
        &self,
        host_key: &str,
        descriptor: &HostDescriptor,
        auth: AuthParams,
    ) -> Result<Arc<dyn Connection>, SessionError>;
}

/// One live, authenticated connection.
#[async_trait]
pub trait Connection: Send + Sync {
    /// Run a command and collect all of its output.
    async fn exec(&self, command: &str) -> Result<RawOutput, ExecFailure>;

    /// Close the connection. Failures are logged, never returned.
    async fn disconnect(&self);

    /// Whether several commands may run over this connection at once.
    fn multiplexed(&self) -> bool {
        true
    }
}
