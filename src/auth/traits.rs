//! Authentication strategy trait definition.

use async_trait::async_trait;
use russh::client;
use thiserror::Error;

use crate::error::is_auth_failure;
use crate::transport::SshClientHandler;

/// Why an authentication attempt did not complete.
#[derive(Debug, Error)]
pub enum AuthFailure {
    /// The credentials are unusable or were refused.
    #[error("{0}")]
    Credential(String),

    /// The connection failed while authenticating.
    #[error("{0}")]
    Transport(String),
}

impl AuthFailure {
    /// Sort a russh error raised during authentication.
    pub(crate) fn classify(message: String) -> Self {
        if is_auth_failure(&message) {
            AuthFailure::Credential(message)
        } else {
            AuthFailure::Transport(message)
        }
    }
}

/// Trait for SSH authentication strategies.
///
/// Implementations must be thread-safe (`Send + Sync`) for use across
/// async tasks.
#[async_trait]
pub trait AuthStrategy: Send + Sync {
    /// Attempt to authenticate with the SSH server.
    ///
    /// * `Ok(true)` - Authentication succeeded
    /// * `Ok(false)` - Credentials rejected by the server
    /// * `Err(failure)` - The attempt could not be made or was interrupted
    async fn authenticate(
        &self,
        handle: &mut client::Handle<SshClientHandler>,
        username: &str,
    ) -> Result<bool, AuthFailure>;

    /// Name of this strategy, for logging.
    fn name(&self) -> &'static str;
}
