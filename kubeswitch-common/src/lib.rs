//! Common types and utilities shared between the KubeSwitch client core and CLI

pub mod auth;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

pub use auth::{capabilities_for, Capability, Role, Session};

/// KubeSwitch user account as returned by the server
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: u64,
    pub username: String,
    pub role: Role,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

/// The caller's own account as returned by `/my/user`. The server may leave
/// out the id, so it is optional here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<u64>,
    pub username: String,
    pub role: Role,
}

impl From<User> for Profile {
    fn from(user: User) -> Self {
        Self {
            id: Some(user.id),
            username: user.username,
            role: user.role,
        }
    }
}

/// Registered Kubernetes cluster. The credential is never part of this payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cluster {
    pub id: u64,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

/// A single user↔cluster visibility record
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Grant {
    pub user_id: u64,
    pub cluster_id: u64,
}

/// Audit log entry, recorded server-side only
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditEntry {
    pub id: u64,
    pub user_id: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<AuditUser>,
    pub action: String,
    #[serde(default)]
    pub detail: String,
    #[serde(default, rename = "ip_address")]
    pub source_address: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditUser {
    pub username: String,
}

/// Cluster connection credential (kubeconfig document).
///
/// The content is opaque to the client. `Debug` is redacted so the blob
/// cannot end up in log output by accident.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Kubeconfig(String);

impl Kubeconfig {
    pub fn new(content: impl Into<String>) -> Self {
        Self(content.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_inner(self) -> String {
        self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for Kubeconfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Kubeconfig(<{} bytes redacted>)", self.0.len())
    }
}

// Wire payloads

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateClusterRequest {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub kubeconfig: Kubeconfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KubeconfigPayload {
    pub kubeconfig: Kubeconfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateUserRequest {
    pub username: String,
    pub password: String,
    pub role: Role,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChangePasswordRequest {
    pub old_password: String,
    pub new_password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResetPasswordRequest {
    pub new_password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateRoleRequest {
    pub role: Role,
}

/// `{"user_ids": [...]}`; the server may send `null` for an empty set
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ClusterPermissions {
    #[serde(default, deserialize_with = "nullable_ids")]
    pub user_ids: Vec<u64>,
}

/// `{"cluster_ids": [...]}`; the server may send `null` for an empty set
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UserPermissions {
    #[serde(default, deserialize_with = "nullable_ids")]
    pub cluster_ids: Vec<u64>,
}

fn nullable_ids<'de, D>(deserializer: D) -> std::result::Result<Vec<u64>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Ok(Option::<Vec<u64>>::deserialize(deserializer)?.unwrap_or_default())
}

/// Authentication failures
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum AuthError {
    #[error("Invalid username or password")]
    InvalidCredentials,
    #[error("Session expired, please log in again")]
    SessionExpired,
}

/// Why the access gate refused an action
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum DenyReason {
    #[error("not authenticated")]
    NotAuthenticated,
    #[error("your role does not allow this operation")]
    InsufficientRole,
    #[error("you have not been granted access to this cluster")]
    NoGrant,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum GrantError {
    #[error("referenced user or cluster no longer exists")]
    StaleReference,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    #[error("Cannot reach the server, check your network connection")]
    NetworkUnavailable,
    #[error("Request timed out")]
    Timeout,
}

/// Structured 400-class rejection from the server
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationError {
    pub message: String,
    pub fields: BTreeMap<String, Vec<String>>,
}

impl ValidationError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            fields: BTreeMap::new(),
        }
    }

    /// User-facing lines: one per field error when present, otherwise the message
    pub fn messages(&self) -> Vec<String> {
        if self.fields.is_empty() {
            return vec![self.message.clone()];
        }

        self.fields
            .iter()
            .flat_map(|(field, msgs)| msgs.iter().map(move |m| format!("{}: {}", field, m)))
            .collect()
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.messages().join("; "))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ServerError {
    #[error("{0}")]
    Validation(ValidationError),
    #[error("Forbidden: {0}")]
    Forbidden(String),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Server error ({status}): {message}")]
    Internal { status: u16, message: String },
}

/// Common error type
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error("Access denied: {0}")]
    AccessDenied(#[from] DenyReason),

    #[error(transparent)]
    Grant(#[from] GrantError),

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Server(#[from] ServerError),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// True for the server's "your token is no longer valid" signal
    pub fn is_auth_invalid(&self) -> bool {
        matches!(self, Error::Auth(AuthError::SessionExpired))
    }

    pub fn is_access_denied(&self) -> bool {
        matches!(self, Error::AccessDenied(_))
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_profile_without_id() {
        let body = r#"{"username":"alice","role":"user"}"#;
        let profile: Profile = serde_json::from_str(body).unwrap();
        assert_eq!(profile.id, None);
        assert_eq!(profile.username, "alice");
        assert_eq!(profile.role, Role::User);
        assert_eq!(serde_json::to_string(&profile).unwrap(), body);
    }

    #[test]
    fn test_audit_entry_with_joined_user() {
        let json = r#"{"id":3,"user_id":1,"action":"Login","detail":"User logged in",
            "ip_address":"10.0.0.1","created_at":"2024-05-01T10:00:00Z",
            "user":{"id":1,"username":"admin","role":"admin",
                "created_at":"2024-01-01T00:00:00Z","updated_at":"2024-01-01T00:00:00Z"}}"#;
        let entry: AuditEntry = serde_json::from_str(json).unwrap();
        assert_eq!(entry.user.unwrap().username, "admin");
        assert_eq!(entry.source_address, "10.0.0.1");
    }

    #[test]
    fn test_kubeconfig_debug_is_redacted() {
        let kc = Kubeconfig::new("apiVersion: v1\ntoken: s3cr3t\n");
        let debug = format!("{:?}", kc);
        assert!(!debug.contains("s3cr3t"));
        assert!(debug.contains("redacted"));
    }

    #[test]
    fn test_cluster_deserializes_without_credential() {
        let json = r#"{"id":7,"name":"prod","description":"",
            "created_at":"2024-05-01T10:00:00Z","kubeconfig":"x"}"#;
        let cluster: Cluster = serde_json::from_str(json).unwrap();
        assert_eq!(cluster.id, 7);
        assert_eq!(cluster.name, "prod");
        assert!(!serde_json::to_string(&cluster).unwrap().contains("kubeconfig"));
    }

    #[test]
    fn test_permission_payloads_accept_null() {
        let perms: UserPermissions = serde_json::from_str(r#"{"cluster_ids":null}"#).unwrap();
        assert!(perms.cluster_ids.is_empty());

        let perms: ClusterPermissions = serde_json::from_str(r#"{"user_ids":[1,2]}"#).unwrap();
        assert_eq!(perms.user_ids, vec![1, 2]);
    }

    #[test]
    fn test_audit_entry_wire_format() {
        let json = r#"{
            "id": 3,
            "user_id": 1,
            "user": {"username": "admin"},
            "action": "GetConfig",
            "detail": "Retrieved config for prod",
            "ip_address": "10.0.0.8",
            "created_at": "2024-05-01T10:00:00Z"
        }"#;
        let entry: AuditEntry = serde_json::from_str(json).unwrap();
        assert_eq!(entry.source_address, "10.0.0.8");
        assert_eq!(entry.user.unwrap().username, "admin");
    }

    #[test]
    fn test_validation_messages_field_by_field() {
        let mut err = ValidationError::new("request rejected");
        assert_eq!(err.messages(), vec!["request rejected".to_string()]);

        err.fields.insert("name".to_string(), vec!["is required".to_string()]);
        err.fields.insert(
            "kubeconfig".to_string(),
            vec!["is empty".to_string(), "is not yaml".to_string()],
        );
        assert_eq!(
            err.messages(),
            vec![
                "kubeconfig: is empty".to_string(),
                "kubeconfig: is not yaml".to_string(),
                "name: is required".to_string(),
            ]
        );
    }

    #[test]
    fn test_error_classification() {
        assert!(Error::from(AuthError::SessionExpired).is_auth_invalid());
        assert!(!Error::from(AuthError::InvalidCredentials).is_auth_invalid());
        assert!(Error::from(DenyReason::NoGrant).is_access_denied());
    }
}
