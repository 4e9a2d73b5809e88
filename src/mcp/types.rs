//! Serializable response types for the MCP tools.
//!
//! Command results reuse [`ExecutionResult`](crate::types::ExecutionResult)
//! as-is; the types here wrap listings with a count.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::types::{CredentialMetadata, SessionInfo};

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct SessionListResponse {
    /// Host keys with a cached session
    pub open_sessions: Vec<String>,
    /// Metadata of every cached session
    pub sessions: Vec<SessionInfo>,
    /// Total number of cached sessions
    #[schemars(schema_with = "crate::mcp::schema::uint")]
    pub count: usize,
}

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct CredentialListResponse {
    /// Credential metadata; secrets are never included
    pub credentials: Vec<CredentialMetadata>,
    #[schemars(schema_with = "crate::mcp::schema::uint")]
    pub count: usize,
}

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct ServerListResponse {
    /// Server names from the host inventory
    pub servers: Vec<String>,
    #[schemars(schema_with = "crate::mcp::schema::uint")]
    pub count: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vault::CredentialType;

    #[test]
    fn test_session_list_json_structure() {
        let response = SessionListResponse {
            open_sessions: vec!["web-1".to_string()],
            sessions: vec![SessionInfo {
                session_id: "4b1f0c1e-0000-4000-8000-000000000000".to_string(),
                host_key: "web-1".to_string(),
                hostname: "203.0.113.10".to_string(),
                username: "root".to_string(),
                created_at: "2026-10-19T08:00:00+00:00".to_string(),
            }],
            count: 1,
        };

        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["open_sessions"], serde_json::json!(["web-1"]));
        assert_eq!(json["sessions"][0]["hostname"], "203.0.113.10");
        assert_eq!(json["count"], 1);
    }

    #[test]
    fn test_credential_list_uses_type_field() {
        let response = CredentialListResponse {
            credentials: vec![CredentialMetadata {
                id: "id".to_string(),
                name: "prod-key".to_string(),
                credential_type: CredentialType::SshKey,
                created_at: "2026-10-19T08:00:00+00:00".to_string(),
                updated_at: "2026-10-19T08:00:00+00:00".to_string(),
            }],
            count: 1,
        };

        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["credentials"][0]["type"], "ssh_key");
        assert!(json["credentials"][0].get("secret").is_none());
    }

    #[test]
    fn test_empty_server_list() {
        let json = serde_json::to_string(&ServerListResponse {
            servers: Vec::new(),
            count: 0,
        })
        .unwrap();
        assert_eq!(json, r#"{"servers":[],"count":0}"#);
    }
}
