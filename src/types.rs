//! Serializable value types shared by the core and the MCP surface.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::vault::CredentialType;

/// Output of one remote command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct ExecutionResult {
    /// Standard output, one entry per line
    pub output: Vec<String>,
    /// Standard error, one entry per line (omitted when empty)
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub error: Vec<String>,
    /// Exit status reported by the remote, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schemars(schema_with = "crate::mcp::schema::optional_uint")]
    pub exit_code: Option<u32>,
    /// False when the channel broke before the command finished
    pub complete: bool,
}

impl ExecutionResult {
    /// Build a result from raw channel bytes.
    pub(crate) fn from_bytes(
        stdout: &[u8],
        stderr: &[u8],
        exit_code: Option<u32>,
        complete: bool,
    ) -> Self {
        Self {
            output: split_lines(stdout),
            error: split_lines(stderr),
            exit_code,
            complete,
        }
    }

    pub fn succeeded(&self) -> bool {
        self.complete && self.exit_code == Some(0)
    }
}

fn split_lines(bytes: &[u8]) -> Vec<String> {
    String::from_utf8_lossy(bytes)
        .lines()
        .map(str::to_string)
        .collect()
}

/// Snapshot of a cached session.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct SessionInfo {
    pub session_id: String,
    /// Identifier the session is cached under
    pub host_key: String,
    pub hostname: String,
    pub username: String,
    /// When the connection was established (RFC3339 format)
    pub created_at: String,
}

/// Credential metadata. The only credential shape that ever leaves the vault.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CredentialMetadata {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub credential_type: CredentialType,
    /// Creation time (RFC3339 format)
    pub created_at: String,
    /// Last update time (RFC3339 format)
    pub updated_at: String,
}
