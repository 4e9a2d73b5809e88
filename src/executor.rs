//! Remote command execution.

use tracing::{debug, warn};

use crate::error::SessionError;
use crate::session::Session;
use crate::types::ExecutionResult;

/// Runs one command over an acquired session and collects its output.
///
/// The command is sent verbatim: no quoting, escaping or allow-listing. A
/// non-zero exit status is a successful result; only a broken transport is
/// an error.
#[derive(Debug, Clone, Copy, Default)]
pub struct RemoteExecutor;

impl RemoteExecutor {
    pub fn new() -> Self {
        Self
    }

    pub async fn run(
        &self,
        session: &Session,
        command: &str,
    ) -> Result<ExecutionResult, SessionError> {
        let _permit = session.exec_permit().await;
        debug!("Executing command on {} ({})", session.host_key(), session.id());

        match session.connection().exec(command).await {
            Ok(raw) => Ok(ExecutionResult::from_bytes(
                &raw.stdout,
                &raw.stderr,
                raw.exit_code,
                raw.complete,
            )),
            Err(failure) => {
                warn!(
                    "Command on {} failed: {}",
                    session.host_key(),
                    failure.reason
                );
                let partial = ExecutionResult::from_bytes(
                    &failure.partial.stdout,
                    &failure.partial.stderr,
                    failure.partial.exit_code,
                    false,
                );
                Err(SessionError::Transport {
                    host_key: session.host_key().to_string(),
                    message: failure.reason,
                    partial: Some(Box::new(partial)),
                })
            }
        }
    }
}
