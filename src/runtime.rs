//! Process wiring shared by the binaries.

use std::sync::Arc;

use tracing::info;

use crate::config::{resolve_servers_file, resolve_vault_store_file};
use crate::error::SessionError;
use crate::mcp::VpsCommands;
use crate::registry::StaticHostRegistry;
use crate::resolver::ConnectionResolver;
use crate::session::SessionManager;
use crate::storage::{CredentialRepository, FileCredentialRepository, InMemoryCredentialRepository};
use crate::transport::{ConnectSettings, SshConnector};
use crate::vault::{CredentialStore, SecretCipher};

/// Build the tool surface from the environment.
///
/// Fails when the vault key is missing or invalid, or when the inventory or
/// credential file cannot be parsed. The returned manager is the one the
/// tools use, kept so the caller can close every session on shutdown.
pub async fn build_commands() -> Result<(VpsCommands, Arc<SessionManager>), SessionError> {
    let cipher = Arc::new(SecretCipher::from_env()?);

    let repository: Arc<dyn CredentialRepository> = match resolve_vault_store_file(None) {
        Some(path) => {
            info!("Credential store file: {:?}", path);
            Arc::new(FileCredentialRepository::open(path).await?)
        }
        None => {
            info!("No credential store file configured, credentials are kept in memory");
            Arc::new(InMemoryCredentialRepository::new())
        }
    };
    let vault = Arc::new(CredentialStore::new(cipher, repository));

    let registry = Arc::new(
        StaticHostRegistry::from_json_file(resolve_servers_file(None)).await?,
    );

    let settings = ConnectSettings::from_env();
    info!(
        "SSH connect timeout {}s, compression {}",
        settings.timeout.as_secs(),
        settings.compress
    );
    let sessions = Arc::new(SessionManager::new(
        registry.clone(),
        ConnectionResolver::with_vault(vault.clone()),
        Arc::new(SshConnector::new(settings)),
    ));

    Ok((VpsCommands::new(sessions.clone(), vault, registry), sessions))
}
