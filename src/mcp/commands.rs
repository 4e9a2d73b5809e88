//! MCP tool implementations.
//!
//! - `ssh_execute`: Run a command on an inventory host, reusing its session
//! - `ssh_list_sessions`: List cached sessions
//! - `ssh_close_session`: Close the session for a host
//! - `vault_create_credential`: Store an encrypted credential
//! - `vault_list_credentials`: List credential metadata
//! - `vault_delete_credential`: Delete a credential
//! - `list_servers`: List inventory hosts
//!
//! Failures are returned as `"<kind> (<status class>): <message>"`, e.g.
//! `authentication_failed (unauthorized): ...`, so clients can branch on the
//! kind or the class without parsing prose.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use poem_mcpserver::{Tools, content::Text, tool::StructuredContent};
use secrecy::SecretString;
use tracing::{error, info};

use crate::error::{ErrorKind, SessionError, VaultError};
use crate::registry::StaticHostRegistry;
use crate::session::SessionManager;
use crate::types::{CredentialMetadata, ExecutionResult};
use crate::vault::{CredentialStore, CredentialType};

use super::types::{CredentialListResponse, ServerListResponse, SessionListResponse};

/// MCP tools over one session manager and one credential store.
///
/// Cloning is cheap; every MCP session gets its own clone sharing the same
/// state.
#[derive(Clone)]
pub struct VpsCommands {
    sessions: Arc<SessionManager>,
    vault: Arc<CredentialStore>,
    registry: Arc<StaticHostRegistry>,
}

fn tool_error(kind: ErrorKind, message: impl fmt::Display) -> String {
    format!("{} ({}): {}", kind, kind.status(), message)
}

fn session_error(e: SessionError) -> String {
    let mut message = tool_error(e.kind(), &e);
    if let Some(partial) = e.partial_output()
        && !partial.output.is_empty()
    {
        message.push_str("\npartial output:\n");
        message.push_str(&partial.output.join("\n"));
    }
    message
}

fn vault_error(e: VaultError) -> String {
    tool_error(e.kind(), &e)
}

impl VpsCommands {
    pub fn new(
        sessions: Arc<SessionManager>,
        vault: Arc<CredentialStore>,
        registry: Arc<StaticHostRegistry>,
    ) -> Self {
        Self {
            sessions,
            vault,
            registry,
        }
    }

    async fn run_command(&self, host: &str, command: &str) -> Result<ExecutionResult, String> {
        info!("Executing command on {}", host);
        self.sessions.execute(host, command).await.map_err(|e| {
            error!("Command on {} failed: {}", host, e);
            session_error(e)
        })
    }

    fn session_list(&self) -> SessionListResponse {
        let open_sessions = self.sessions.list_open();
        let sessions = self.sessions.sessions();
        let count = open_sessions.len();
        SessionListResponse {
            open_sessions,
            sessions,
            count,
        }
    }

    async fn create_credential(
        &self,
        name: &str,
        credential_type: &str,
        secret: String,
    ) -> Result<CredentialMetadata, String> {
        let credential_type = CredentialType::from_str(credential_type)
            .map_err(|e| tool_error(ErrorKind::Configuration, e))?;
        let credential = self
            .vault
            .create(name, credential_type, SecretString::new(secret))
            .await
            .map_err(vault_error)?;
        Ok(credential.metadata())
    }

    async fn credential_list(&self) -> Result<CredentialListResponse, String> {
        let credentials = self.vault.list().await.map_err(vault_error)?;
        let count = credentials.len();
        Ok(CredentialListResponse { credentials, count })
    }

    async fn delete_credential(&self, name: &str) -> Result<String, String> {
        let credential = self.vault.get_by_name(name).await.map_err(vault_error)?;
        self.vault.delete(&credential).await.map_err(vault_error)?;
        Ok(format!("Credential '{}' deleted", name))
    }

    fn server_list(&self) -> ServerListResponse {
        let servers = self.registry.names();
        let count = servers.len();
        ServerListResponse { servers, count }
    }
}

#[Tools]
impl VpsCommands {
    /// Execute a shell command on a server from the inventory.
    ///
    /// The first call for a host opens an SSH session; later calls reuse it.
    /// The command is sent verbatim. A non-zero exit code is a normal result.
    /// If the connection breaks mid-command the error includes any partial
    /// output and the session is dropped, so the next call reconnects.
    async fn ssh_execute(
        &self,
        /// Server name from list_servers, or its hostname
        host: String,
        /// Shell command to run on the remote server
        command: String,
    ) -> Result<StructuredContent<ExecutionResult>, String> {
        self.run_command(&host, &command)
            .await
            .map(StructuredContent)
    }

    /// List hosts with a cached SSH session.
    async fn ssh_list_sessions(&self) -> StructuredContent<SessionListResponse> {
        StructuredContent(self.session_list())
    }

    /// Close the cached SSH session for a host. Closing a host without a
    /// session is not an error.
    async fn ssh_close_session(
        &self,
        /// Server name the session was opened with
        host: String,
    ) -> Result<Text<String>, String> {
        self.sessions.close(&host).await;
        Ok(Text(format!("Session for {} closed", host)))
    }

    /// Store a credential in the encrypted vault.
    ///
    /// Returns metadata only; the secret can never be read back. Inventory
    /// hosts reference credentials by name (`password_ref` / `key_ref`).
    async fn vault_create_credential(
        &self,
        /// Unique credential name
        name: String,
        /// Credential type: "ssh_key" or "password"
        credential_type: String,
        /// Secret value: private key in OpenSSH/PEM format, or password
        secret: String,
    ) -> Result<StructuredContent<CredentialMetadata>, String> {
        self.create_credential(&name, &credential_type, secret)
            .await
            .map(StructuredContent)
    }

    /// List stored credentials. Secrets are never included.
    async fn vault_list_credentials(
        &self,
    ) -> Result<StructuredContent<CredentialListResponse>, String> {
        self.credential_list().await.map(StructuredContent)
    }

    /// Delete a credential by name. To rotate a secret, delete and recreate it.
    async fn vault_delete_credential(
        &self,
        /// Name of the credential to delete
        name: String,
    ) -> Result<Text<String>, String> {
        self.delete_credential(&name).await.map(Text)
    }

    /// List servers defined in the host inventory.
    async fn list_servers(&self) -> StructuredContent<ServerListResponse> {
        StructuredContent(self.server_list())
    }
}
