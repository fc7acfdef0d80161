//! Authentication and authorization types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use crate::User;

/// Account role. Anything the client does not recognise becomes `Unknown`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    User,
    #[serde(other)]
    Unknown,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::User => "user",
            Role::Unknown => "unknown",
        }
    }

    pub fn is_admin(&self) -> bool {
        matches!(self, Role::Admin)
    }

    pub fn capabilities(&self) -> BTreeSet<Capability> {
        capabilities_for(Some(self))
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Strict parse for operator input; only assignable roles are accepted.
impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "admin" => Ok(Role::Admin),
            "user" => Ok(Role::User),
            other => Err(format!("unknown role '{}' (expected admin or user)", other)),
        }
    }
}

/// Named permission unlocked by a role
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Capability {
    ViewClusters,
    ManageClusters,
    ManageUsers,
    ViewAudit,
    ManagePermissions,
}

impl Capability {
    pub const ALL: [Capability; 5] = [
        Capability::ViewClusters,
        Capability::ManageClusters,
        Capability::ManageUsers,
        Capability::ViewAudit,
        Capability::ManagePermissions,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Capability::ViewClusters => "view:clusters",
            Capability::ManageClusters => "manage:clusters",
            Capability::ManageUsers => "manage:users",
            Capability::ViewAudit => "view:audit",
            Capability::ManagePermissions => "manage:permissions",
        }
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Capability {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Capability::ALL
            .into_iter()
            .find(|c| c.as_str() == s)
            .ok_or_else(|| format!("unknown capability '{}'", s))
    }
}

/// Capability set granted by a role.
///
/// Total: unknown or absent roles get the empty set instead of an error.
pub fn capabilities_for(role: Option<&Role>) -> BTreeSet<Capability> {
    match role {
        Some(Role::Admin) => Capability::ALL.into_iter().collect(),
        Some(Role::User) => BTreeSet::from([Capability::ViewClusters]),
        Some(Role::Unknown) | None => BTreeSet::new(),
    }
}

/// Authenticated client session
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<u64>,
    pub role: Role,
    pub issued_at: DateTime<Utc>,
}

impl Session {
    pub fn is_admin(&self) -> bool {
        self.role.is_admin()
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("token", &"<redacted>")
            .field("user_id", &self.user_id)
            .field("role", &self.role)
            .field("issued_at", &self.issued_at)
            .finish()
    }
}

/// Login request
#[derive(Clone, Serialize, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

impl fmt::Debug for LoginRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoginRequest")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Login response; `user` is optional and older servers omit it
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginResponse {
    pub token: String,
    pub role: Role,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<User>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_capabilities_are_total() {
        assert_eq!(capabilities_for(Some(&Role::Admin)).len(), Capability::ALL.len());
        assert_eq!(
            capabilities_for(Some(&Role::User)),
            BTreeSet::from([Capability::ViewClusters])
        );
        assert!(capabilities_for(Some(&Role::Unknown)).is_empty());
        assert!(capabilities_for(None).is_empty());
    }

    #[test]
    fn test_admin_superset_of_user() {
        let admin = Role::Admin.capabilities();
        let user = Role::User.capabilities();
        assert!(admin.is_superset(&user));
        assert_eq!(capabilities_for(Some(&Role::User)), user);
    }

    #[test]
    fn test_unknown_role_deserializes() {
        let role: Role = serde_json::from_str("\"auditor\"").unwrap();
        assert_eq!(role, Role::Unknown);
        assert!(role.capabilities().is_empty());

        let role: Role = serde_json::from_str("\"admin\"").unwrap();
        assert_eq!(role, Role::Admin);
    }

    #[test]
    fn test_role_from_str_is_strict() {
        assert_eq!("Admin".parse::<Role>().unwrap(), Role::Admin);
        assert_eq!("user".parse::<Role>().unwrap(), Role::User);
        assert!("root".parse::<Role>().is_err());
    }

    #[test]
    fn test_capability_names() {
        for cap in Capability::ALL {
            assert_eq!(cap.as_str().parse::<Capability>().unwrap(), cap);
        }
        assert!("delete:everything".parse::<Capability>().is_err());
    }

    #[test]
    fn test_login_response_without_user() {
        let resp: LoginResponse =
            serde_json::from_str(r#"{"token":"abc","role":"user"}"#).unwrap();
        assert_eq!(resp.role, Role::User);
        assert!(resp.user.is_none());
    }

    #[test]
    fn test_session_debug_hides_token() {
        let session = Session {
            token: "very-secret-token".to_string(),
            user_id: Some(4),
            role: Role::User,
            issued_at: Utc::now(),
        };
        assert!(!format!("{:?}", session).contains("very-secret-token"));
    }
}
