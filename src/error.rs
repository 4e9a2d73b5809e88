//! Error taxonomy for the vault and the session manager.
//!
//! Every failure is a distinct, typed variant so callers (and operators
//! reading logs) can tell "host unreachable" from "bad password" from
//! "misconfigured vault". No variant ever carries secret material.
//!
//! # Classification
//!
//! russh reports most failures as opaque error strings. [`is_auth_failure`]
//! sorts those into authentication failures (never retried, mapped to an
//! unauthorized-class response) and transport faults (which evict the session
//! so a later call can reconnect).
//!
//! ```rust,ignore
//! use vps_manager::error::is_auth_failure;
//!
//! assert!(is_auth_failure("Permission denied (publickey)"));
//! assert!(!is_auth_failure("Connection refused"));
//! ```

use std::fmt;

use thiserror::Error;

use crate::types::ExecutionResult;

/// Errors raised by the secret cipher and the credential store.
#[derive(Debug, Error)]
pub enum VaultError {
    /// Missing or unusable cipher key. Fatal at startup.
    #[error("vault configuration error: {0}")]
    Configuration(String),

    /// Ciphertext is malformed or was produced under a different key.
    #[error("crypto error: {0}")]
    Crypto(String),

    /// A credential with this name already exists.
    #[error("credential '{0}' already exists")]
    DuplicateName(String),

    /// No credential with this name.
    #[error("credential '{0}' not found")]
    NotFound(String),

    /// The persistence backend failed.
    #[error("credential storage error: {0}")]
    Storage(String),
}

/// Errors raised while acquiring sessions and executing commands.
#[derive(Debug, Error)]
pub enum SessionError {
    /// A referenced secret or host setting is missing.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// The host identifier is not known to the registry.
    #[error("host not found: {0}")]
    HostNotFound(String),

    /// The host record names an authentication type this system cannot use.
    #[error("unsupported auth type '{auth_type}' for host {host_key}")]
    UnsupportedAuthType { host_key: String, auth_type: String },

    /// The remote rejected the credentials.
    #[error("authentication failed for {username}@{host_key}: {reason}")]
    AuthenticationFailed {
        host_key: String,
        username: String,
        reason: String,
    },

    /// Network or protocol fault. `partial` holds whatever output was read
    /// before a channel broke mid-command.
    #[error("transport error on {host_key}: {message}")]
    Transport {
        host_key: String,
        message: String,
        partial: Option<Box<ExecutionResult>>,
    },

    #[error(transparent)]
    Vault(#[from] VaultError),
}

impl SessionError {
    pub(crate) fn transport(host_key: impl Into<String>, message: impl Into<String>) -> Self {
        SessionError::Transport {
            host_key: host_key.into(),
            message: message.into(),
            partial: None,
        }
    }

    /// Whether this failure should evict the session it happened on.
    pub fn is_transport(&self) -> bool {
        matches!(self, SessionError::Transport { .. })
    }

    /// Output collected before the transport broke, if any.
    pub fn partial_output(&self) -> Option<&ExecutionResult> {
        match self {
            SessionError::Transport { partial, .. } => partial.as_deref(),
            _ => None,
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            SessionError::Configuration(_) => ErrorKind::Configuration,
            SessionError::HostNotFound(_) => ErrorKind::HostNotFound,
            SessionError::UnsupportedAuthType { .. } => ErrorKind::UnsupportedAuthType,
            SessionError::AuthenticationFailed { .. } => ErrorKind::AuthenticationFailed,
            SessionError::Transport { .. } => ErrorKind::Transport,
            SessionError::Vault(e) => e.kind(),
        }
    }
}

impl VaultError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            VaultError::Configuration(_) => ErrorKind::Configuration,
            VaultError::Crypto(_) => ErrorKind::Crypto,
            VaultError::DuplicateName(_) => ErrorKind::DuplicateName,
            VaultError::NotFound(_) => ErrorKind::NotFound,
            VaultError::Storage(_) => ErrorKind::Storage,
        }
    }
}

/// Stable, externally visible name of each failure class.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Configuration,
    HostNotFound,
    UnsupportedAuthType,
    AuthenticationFailed,
    Transport,
    Crypto,
    DuplicateName,
    NotFound,
    Storage,
}

/// Response class an error maps to at the external boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusClass {
    ClientError,
    Unauthorized,
    ServerFault,
}

impl StatusClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            StatusClass::ClientError => "client_error",
            StatusClass::Unauthorized => "unauthorized",
            StatusClass::ServerFault => "server_fault",
        }
    }
}

impl fmt::Display for StatusClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Configuration => "configuration_error",
            ErrorKind::HostNotFound => "host_not_found",
            ErrorKind::UnsupportedAuthType => "unsupported_auth_type",
            ErrorKind::AuthenticationFailed => "authentication_failed",
            ErrorKind::Transport => "transport_error",
            ErrorKind::Crypto => "crypto_error",
            ErrorKind::DuplicateName => "duplicate_name",
            ErrorKind::NotFound => "not_found",
            ErrorKind::Storage => "storage_error",
        }
    }

    pub fn status(&self) -> StatusClass {
        match self {
            ErrorKind::HostNotFound | ErrorKind::DuplicateName | ErrorKind::NotFound => {
                StatusClass::ClientError
            }
            ErrorKind::AuthenticationFailed => StatusClass::Unauthorized,
            ErrorKind::Configuration
            | ErrorKind::UnsupportedAuthType
            | ErrorKind::Transport
            | ErrorKind::Crypto
            | ErrorKind::Storage => StatusClass::ServerFault,
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error message fragments that indicate the remote rejected credentials.
const AUTH_ERRORS: &[&str] = &[
    "authentication failed",
    "password authentication failed",
    "key authentication failed",
    "permission denied",
    "publickey",
    "auth fail",
    "no authentication",
    "not authenticated",
    "all authentication methods failed",
];

/// Whether a russh error message describes a credential rejection rather
/// than a network or protocol fault.
pub(crate) fn is_auth_failure(error: &str) -> bool {
    let error_lower = error.to_lowercase();
    AUTH_ERRORS.iter().any(|pattern| error_lower.contains(pattern))
}

#[cfg(test)]
mod tests {
    use super::*;

    mod auth_classification {
        use super::*;

        #[test]
        fn test_authentication_failed() {
            assert!(is_auth_failure("Authentication failed"));
            assert!(is_auth_failure("AUTHENTICATION FAILED"));
        }

        #[test]
        fn test_permission_denied() {
            assert!(is_auth_failure("Permission denied (publickey,password)"));
        }

        #[test]
        fn test_not_authenticated() {
            assert!(is_auth_failure("Not authenticated"));
        }

        #[test]
        fn test_connection_errors_are_transport() {
            assert!(!is_auth_failure("Connection refused"));
            assert!(!is_auth_failure("Network is unreachable"));
            assert!(!is_auth_failure("Connection timed out"));
            assert!(!is_auth_failure("broken pipe"));
        }

        #[test]
        fn test_empty_string_is_transport() {
            assert!(!is_auth_failure(""));
        }
    }

    mod kinds {
        use super::*;

        #[test]
        fn test_each_variant_has_distinct_kind() {
            let errors = [
                SessionError::Configuration("x".into()).kind(),
                SessionError::HostNotFound("h".into()).kind(),
                SessionError::UnsupportedAuthType {
                    host_key: "h".into(),
                    auth_type: "kerberos".into(),
                }
                .kind(),
                SessionError::AuthenticationFailed {
                    host_key: "h".into(),
                    username: "root".into(),
                    reason: "rejected".into(),
                }
                .kind(),
                SessionError::transport("h", "reset").kind(),
                SessionError::from(VaultError::Crypto("bad tag".into())).kind(),
                SessionError::from(VaultError::DuplicateName("n".into())).kind(),
            ];
            for (i, a) in errors.iter().enumerate() {
                for b in errors.iter().skip(i + 1) {
                    assert_ne!(a, b);
                }
            }
        }

        #[test]
        fn test_status_classes() {
            assert_eq!(
                ErrorKind::AuthenticationFailed.status(),
                StatusClass::Unauthorized
            );
            assert_eq!(ErrorKind::Transport.status(), StatusClass::ServerFault);
            assert_eq!(ErrorKind::HostNotFound.status(), StatusClass::ClientError);
        }

        #[test]
        fn test_vault_configuration_maps_to_configuration_kind() {
            let err = SessionError::from(VaultError::Configuration("missing key".into()));
            assert_eq!(err.kind(), ErrorKind::Configuration);
        }

        #[test]
        fn test_kind_display() {
            assert_eq!(ErrorKind::Transport.to_string(), "transport_error");
            assert_eq!(ErrorKind::Crypto.to_string(), "crypto_error");
        }
    }

    #[test]
    fn test_partial_output_only_on_transport() {
        let partial = ExecutionResult {
            output: vec!["line".to_string()],
            error: Vec::new(),
            exit_code: None,
            complete: false,
        };
        let err = SessionError::Transport {
            host_key: "h".into(),
            message: "channel closed".into(),
            partial: Some(Box::new(partial)),
        };
        assert!(err.is_transport());
        assert_eq!(err.partial_output().map(|p| p.output.len()), Some(1));
        assert!(
            SessionError::HostNotFound("h".into())
                .partial_output()
                .is_none()
        );
    }
}
