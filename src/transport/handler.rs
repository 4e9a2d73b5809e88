//! russh client handler.

use russh::{client, keys};
use tracing::debug;

/// Client handler that accepts every server host key, like OpenSSH with
/// `StrictHostKeyChecking=no`.
pub struct SshClientHandler {
    host_key: String,
}

impl SshClientHandler {
    pub(crate) fn new(host_key: impl Into<String>) -> Self {
        Self {
            host_key: host_key.into(),
        }
    }
}

impl client::Handler for SshClientHandler {
    type Error = russh::Error;

    async fn check_server_key(
        &mut self,
        server_public_key: &keys::PublicKey,
    ) -> Result<bool, Self::Error> {
        debug!(
            "Accepting {} host key for {} without verification",
            server_public_key.algorithm(),
            self.host_key
        );
        Ok(true)
    }
}
