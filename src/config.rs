//! Configuration resolution.
//!
//! Values follow a three-tier priority system:
//!
//! 1. **Parameter** - Explicitly provided function parameter (highest priority)
//! 2. **Environment Variable** - Value from environment variable
//! 3. **Default** - Built-in default value (lowest priority)
//!
//! # Environment Variables
//!
//! | Variable | Default | Description |
//! |----------|---------|-------------|
//! | `VAULT_KEY` | required | Base64-encoded 32-byte vault key |
//! | `VAULT_STORE_FILE` | unset | Credential store file (in-memory when unset) |
//! | `VPS_SERVERS_FILE` | `servers.json` | Host inventory file |
//! | `SSH_CONNECT_TIMEOUT` | 30s | Connection and handshake timeout in seconds |
//! | `SSH_COMPRESSION` | true | Enable zlib compression |
//! | `MCP_PORT` | 8000 | Port of the MCP HTTP endpoint |

use std::env;
use std::path::PathBuf;
use std::time::Duration;

/// Default SSH connection timeout in seconds
pub(crate) const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 30;

/// Default host inventory file
pub(crate) const DEFAULT_SERVERS_FILE: &str = "servers.json";

/// Default MCP port
pub(crate) const DEFAULT_MCP_PORT: u16 = 8000;

/// Keepalive interval for cached sessions
pub(crate) const KEEPALIVE_INTERVAL: Duration = Duration::from_secs(30);

/// Unanswered keepalives before russh drops the connection
pub(crate) const KEEPALIVE_MAX: usize = 3;

/// Environment variable holding the vault key
pub const VAULT_KEY_ENV_VAR: &str = "VAULT_KEY";

/// Environment variable naming the credential store file
pub const VAULT_STORE_FILE_ENV_VAR: &str = "VAULT_STORE_FILE";

/// Environment variable naming the host inventory file
pub const SERVERS_FILE_ENV_VAR: &str = "VPS_SERVERS_FILE";

/// Environment variable name for SSH connection timeout
pub(crate) const CONNECT_TIMEOUT_ENV_VAR: &str = "SSH_CONNECT_TIMEOUT";

/// Environment variable name for SSH compression
pub(crate) const COMPRESSION_ENV_VAR: &str = "SSH_COMPRESSION";

/// Environment variable name for the MCP port
pub(crate) const MCP_PORT_ENV_VAR: &str = "MCP_PORT";

/// Resolve the connection timeout with priority: parameter -> env var -> default
pub fn resolve_connect_timeout(timeout_param: Option<u64>) -> Duration {
    // Priority 1: Use parameter if provided
    if let Some(timeout) = timeout_param {
        return Duration::from_secs(timeout);
    }

    // Priority 2: Use environment variable if set
    if let Ok(env_timeout) = env::var(CONNECT_TIMEOUT_ENV_VAR)
        && let Ok(timeout) = env_timeout.parse::<u64>()
    {
        return Duration::from_secs(timeout);
    }

    // Priority 3: Default value
    Duration::from_secs(DEFAULT_CONNECT_TIMEOUT_SECS)
}

/// Resolve the compression setting with priority: parameter -> env var -> default (true)
pub fn resolve_compression(compress_param: Option<bool>) -> bool {
    if let Some(compress) = compress_param {
        return compress;
    }

    if let Ok(env_compress) = env::var(COMPRESSION_ENV_VAR) {
        return env_compress.eq_ignore_ascii_case("true") || env_compress == "1";
    }

    true
}

/// Resolve the host inventory path with priority: parameter -> env var -> default
pub fn resolve_servers_file(path_param: Option<PathBuf>) -> PathBuf {
    if let Some(path) = path_param {
        return path;
    }

    match env::var(SERVERS_FILE_ENV_VAR) {
        Ok(path) if !path.is_empty() => PathBuf::from(path),
        _ => PathBuf::from(DEFAULT_SERVERS_FILE),
    }
}

/// Resolve the credential store path. `None` keeps credentials in memory.
pub fn resolve_vault_store_file(path_param: Option<PathBuf>) -> Option<PathBuf> {
    if path_param.is_some() {
        return path_param;
    }

    env::var(VAULT_STORE_FILE_ENV_VAR)
        .ok()
        .filter(|path| !path.is_empty())
        .map(PathBuf::from)
}

/// Resolve the MCP port with priority: parameter -> env var -> default
pub fn resolve_mcp_port(port_param: Option<u16>) -> u16 {
    if let Some(port) = port_param {
        return port;
    }

    env::var(MCP_PORT_ENV_VAR)
        .ok()
        .and_then(|p| p.parse().ok())
        .unwrap_or(DEFAULT_MCP_PORT)
}

#[cfg(test)]
pub(crate) mod test_env {
    use std::sync::Mutex as StdMutex;

    // Use a mutex to serialize env var tests to avoid race conditions
    pub(crate) static ENV_TEST_MUTEX: once_cell::sync::Lazy<StdMutex<()>> =
        once_cell::sync::Lazy::new(|| StdMutex::new(()));

    /// Helper to set an environment variable safely within tests.
    /// SAFETY: Must be called while holding ENV_TEST_MUTEX to prevent data races.
    pub(crate) unsafe fn set_env(key: &str, value: &str) {
        // SAFETY: Caller ensures ENV_TEST_MUTEX is held
        unsafe { std::env::set_var(key, value) };
    }

    /// Helper to remove an environment variable safely within tests.
    /// SAFETY: Must be called while holding ENV_TEST_MUTEX to prevent data races.
    pub(crate) unsafe fn remove_env(key: &str) {
        // SAFETY: Caller ensures ENV_TEST_MUTEX is held
        unsafe { std::env::remove_var(key) };
    }
}
