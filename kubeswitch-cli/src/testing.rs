///! In-memory server used by the unit tests

use crate::backend::Backend;
use async_trait::async_trait;
use chrono::Utc;
use kubeswitch_common::auth::{LoginRequest, LoginResponse};
use kubeswitch_common::{
    AuditEntry, AuditUser, AuthError, ChangePasswordRequest, Cluster, CreateClusterRequest,
    CreateUserRequest, Error, Kubeconfig, Profile, Result, Role, ServerError, TransportError,
    User, ValidationError,
};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::{Arc, Mutex, MutexGuard};

pub const KUBECONFIG: &str = "apiVersion: v1\nkind: Config\nclusters:\n- name: demo\n";

/// Failure injected into the next backend call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fault {
    Unauthorized,
    Timeout,
    Network,
    Internal,
}

impl Fault {
    fn into_error(self) -> Error {
        match self {
            Fault::Unauthorized => Error::Auth(AuthError::SessionExpired),
            Fault::Timeout => Error::Transport(TransportError::Timeout),
            Fault::Network => Error::Transport(TransportError::NetworkUnavailable),
            Fault::Internal => Error::Server(ServerError::Internal {
                status: 500,
                message: "boom".to_string(),
            }),
        }
    }
}

#[derive(Default)]
struct State {
    next_id: u64,
    users: BTreeMap<u64, (User, String)>,
    clusters: BTreeMap<u64, (Cluster, Kubeconfig)>,
    grants: BTreeSet<(u64, u64)>,
    tokens: HashMap<String, u64>,
    audit: Vec<AuditEntry>,
    current_token: Option<String>,
    calls: Vec<&'static str>,
    faults: HashMap<&'static str, Fault>,
    omit_user_in_login: bool,
}

impl State {
    fn id(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }

    fn record(&mut self, call: &'static str) -> Result<()> {
        self.calls.push(call);
        match self.faults.remove(call) {
            Some(fault) => Err(fault.into_error()),
            None => Ok(()),
        }
    }

    fn principal(&self) -> Result<User> {
        self.current_token
            .as_ref()
            .and_then(|t| self.tokens.get(t))
            .and_then(|id| self.users.get(id))
            .map(|(u, _)| u.clone())
            .ok_or(Error::Auth(AuthError::SessionExpired))
    }

    fn admin(&self) -> Result<User> {
        let user = self.principal()?;
        if user.role != Role::Admin {
            return Err(Error::Server(ServerError::Forbidden(
                "Admin access required".to_string(),
            )));
        }
        Ok(user)
    }

    fn log_audit(&mut self, user_id: u64, action: &str, detail: String) {
        let id = self.audit.len() as u64 + 1;
        let username = self.users.get(&user_id).map(|(u, _)| u.username.clone());
        self.audit.push(AuditEntry {
            id,
            user_id,
            user: username.map(|username| AuditUser { username }),
            action: action.to_string(),
            detail,
            source_address: "127.0.0.1".to_string(),
            created_at: Utc::now() + chrono::Duration::milliseconds(id as i64),
        });
    }
}

fn not_found(what: &str) -> Error {
    Error::Server(ServerError::NotFound(format!("{} not found", what)))
}

#[derive(Clone, Default)]
pub struct FakeBackend {
    state: Arc<Mutex<State>>,
}

impl FakeBackend {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|p| p.into_inner())
    }

    pub fn add_user(&self, username: &str, password: &str, role: Role) -> u64 {
        let mut s = self.lock();
        let id = s.id();
        let user = User {
            id,
            username: username.to_string(),
            role,
            created_at: Some(Utc::now()),
            updated_at: None,
        };
        s.users.insert(id, (user, password.to_string()));
        id
    }

    pub fn add_cluster(&self, name: &str, kubeconfig: &str) -> u64 {
        let mut s = self.lock();
        let id = s.id();
        let cluster = Cluster {
            id,
            name: name.to_string(),
            description: None,
            created_at: Some(Utc::now()),
            updated_at: None,
        };
        s.clusters.insert(id, (cluster, Kubeconfig::new(kubeconfig)));
        id
    }

    pub fn grant(&self, user_id: u64, cluster_id: u64) {
        self.lock().grants.insert((user_id, cluster_id));
    }

    pub fn kubeconfig_of(&self, cluster_id: u64) -> Option<Kubeconfig> {
        self.lock().clusters.get(&cluster_id).map(|(_, k)| k.clone())
    }

    pub fn cluster_grants(&self, cluster_id: u64) -> BTreeSet<u64> {
        self.lock()
            .grants
            .iter()
            .filter(|(_, c)| *c == cluster_id)
            .map(|(u, _)| *u)
            .collect()
    }

    /// Invalidate every issued token, as a server restart with a new secret would
    pub fn revoke_all_tokens(&self) {
        self.lock().tokens.clear();
    }

    pub fn fail_next(&self, call: &'static str, fault: Fault) {
        self.lock().faults.insert(call, fault);
    }

    pub fn omit_user_in_login(&self) {
        self.lock().omit_user_in_login = true;
    }

    pub fn calls(&self) -> Vec<&'static str> {
        self.lock().calls.clone()
    }

    pub fn call_count(&self, call: &str) -> usize {
        self.lock().calls.iter().filter(|c| **c == call).count()
    }

    pub fn clear_calls(&self) {
        self.lock().calls.clear();
    }

    pub fn current_token(&self) -> Option<String> {
        self.lock().current_token.clone()
    }
}

#[async_trait]
impl Backend for FakeBackend {
    async fn set_token(&self, token: Option<String>) {
        self.lock().current_token = token;
    }

    async fn login(&self, request: &LoginRequest) -> Result<LoginResponse> {
        let mut s = self.lock();
        s.record("login")?;
        let user = s
            .users
            .values()
            .find(|(u, p)| u.username == request.username && *p == request.password)
            .map(|(u, _)| u.clone())
            .ok_or(Error::Auth(AuthError::InvalidCredentials))?;

        let token = format!("token-{}-{}", user.id, s.tokens.len() + 1);
        s.tokens.insert(token.clone(), user.id);
        s.log_audit(user.id, "Login", "User logged in".to_string());

        Ok(LoginResponse {
            token,
            role: user.role,
            user: if s.omit_user_in_login { None } else { Some(user) },
        })
    }

    async fn logout(&self) -> Result<()> {
        let mut s = self.lock();
        s.record("logout")?;
        let user = s.principal()?;
        s.log_audit(user.id, "Logout", "User logged out".to_string());
        Ok(())
    }

    /// Like the real server, the profile carries no id
    async fn current_user(&self) -> Result<Profile> {
        let mut s = self.lock();
        s.record("current_user")?;
        let user = s.principal()?;
        Ok(Profile {
            id: None,
            username: user.username,
            role: user.role,
        })
    }

    async fn change_password(&self, request: &ChangePasswordRequest) -> Result<()> {
        let mut s = self.lock();
        s.record("change_password")?;
        let user = s.principal()?;
        let entry = s.users.get_mut(&user.id).ok_or_else(|| not_found("User"))?;
        if entry.1 != request.old_password {
            return Err(Error::Server(ServerError::Validation(ValidationError::new(
                "old password is incorrect",
            ))));
        }
        entry.1 = request.new_password.clone();
        Ok(())
    }

    async fn list_clusters(&self) -> Result<Vec<Cluster>> {
        let mut s = self.lock();
        s.record("list_clusters")?;
        let user = s.principal()?;
        Ok(s.clusters
            .values()
            .filter(|(c, _)| user.role == Role::Admin || s.grants.contains(&(user.id, c.id)))
            .map(|(c, _)| c.clone())
            .collect())
    }

    async fn create_cluster(&self, request: &CreateClusterRequest) -> Result<Cluster> {
        let mut s = self.lock();
        s.record("create_cluster")?;
        let admin = s.admin()?;
        if s.clusters.values().any(|(c, _)| c.name == request.name) {
            return Err(Error::Server(ServerError::Validation(ValidationError::new(
                "Failed to create cluster",
            ))));
        }
        let id = s.id();
        let cluster = Cluster {
            id,
            name: request.name.clone(),
            description: request.description.clone(),
            created_at: Some(Utc::now()),
            updated_at: None,
        };
        s.clusters.insert(id, (cluster.clone(), request.kubeconfig.clone()));
        s.log_audit(admin.id, "CreateCluster", format!("Created cluster {}", request.name));
        Ok(cluster)
    }

    async fn delete_cluster(&self, cluster_id: u64) -> Result<()> {
        let mut s = self.lock();
        s.record("delete_cluster")?;
        let admin = s.admin()?;
        s.clusters.remove(&cluster_id).ok_or_else(|| not_found("Cluster"))?;
        s.grants.retain(|(_, c)| *c != cluster_id);
        s.log_audit(admin.id, "DeleteCluster", format!("Deleted cluster {}", cluster_id));
        Ok(())
    }

    async fn get_kubeconfig(&self, cluster_id: u64) -> Result<Kubeconfig> {
        let mut s = self.lock();
        s.record("get_kubeconfig")?;
        let user = s.principal()?;
        if user.role != Role::Admin && !s.grants.contains(&(user.id, cluster_id)) {
            return Err(Error::Server(ServerError::Forbidden("Access denied".to_string())));
        }
        let (cluster, kubeconfig) = s
            .clusters
            .get(&cluster_id)
            .cloned()
            .ok_or_else(|| not_found("Cluster"))?;
        s.log_audit(user.id, "GetConfig", format!("Retrieved config for {}", cluster.name));
        Ok(kubeconfig)
    }

    async fn import_kubeconfig(&self, cluster_id: u64, kubeconfig: &Kubeconfig) -> Result<()> {
        let mut s = self.lock();
        s.record("import_kubeconfig")?;
        let admin = s.admin()?;
        let entry = s.clusters.get_mut(&cluster_id).ok_or_else(|| not_found("Cluster"))?;
        entry.1 = kubeconfig.clone();
        s.log_audit(admin.id, "ImportConfig", format!("Imported config for {}", cluster_id));
        Ok(())
    }

    async fn cluster_permissions(&self, cluster_id: u64) -> Result<Vec<u64>> {
        let mut s = self.lock();
        s.record("cluster_permissions")?;
        s.admin()?;
        if !s.clusters.contains_key(&cluster_id) {
            return Err(not_found("Cluster"));
        }
        Ok(s.grants
            .iter()
            .filter(|(_, c)| *c == cluster_id)
            .map(|(u, _)| *u)
            .collect())
    }

    async fn set_cluster_permissions(&self, cluster_id: u64, user_ids: &[u64]) -> Result<()> {
        let mut s = self.lock();
        s.record("set_cluster_permissions")?;
        let admin = s.admin()?;
        let unknown_user = user_ids.iter().any(|u| !s.users.contains_key(u));
        if !s.clusters.contains_key(&cluster_id) || unknown_user {
            return Err(not_found("User or cluster"));
        }
        s.grants.retain(|(_, c)| *c != cluster_id);
        for user_id in user_ids {
            s.grants.insert((*user_id, cluster_id));
        }
        let detail = format!("Updated grants for cluster {}", cluster_id);
        s.log_audit(admin.id, "SetClusterPermissions", detail);
        Ok(())
    }

    async fn list_users(&self) -> Result<Vec<User>> {
        let mut s = self.lock();
        s.record("list_users")?;
        s.admin()?;
        Ok(s.users.values().map(|(u, _)| u.clone()).collect())
    }

    async fn create_user(&self, request: &CreateUserRequest) -> Result<User> {
        let mut s = self.lock();
        s.record("create_user")?;
        s.admin()?;
        if s.users.values().any(|(u, _)| u.username == request.username) {
            return Err(Error::Server(ServerError::Validation(ValidationError::new(
                "Failed to create user (username might exist)",
            ))));
        }
        let id = s.id();
        let user = User {
            id,
            username: request.username.clone(),
            role: request.role,
            created_at: Some(Utc::now()),
            updated_at: None,
        };
        s.users.insert(id, (user.clone(), request.password.clone()));
        Ok(user)
    }

    async fn delete_user(&self, user_id: u64) -> Result<()> {
        let mut s = self.lock();
        s.record("delete_user")?;
        s.admin()?;
        let (user, _) = s.users.get(&user_id).cloned().ok_or_else(|| not_found("User"))?;
        let admins = s.users.values().filter(|(u, _)| u.role == Role::Admin).count();
        if user.role == Role::Admin && admins <= 1 {
            return Err(Error::Server(ServerError::Validation(ValidationError::new(
                "Cannot delete the last admin",
            ))));
        }
        s.users.remove(&user_id);
        s.grants.retain(|(u, _)| *u != user_id);
        s.tokens.retain(|_, u| *u != user_id);
        Ok(())
    }

    async fn reset_password(&self, user_id: u64, new_password: &str) -> Result<()> {
        let mut s = self.lock();
        s.record("reset_password")?;
        s.admin()?;
        let entry = s.users.get_mut(&user_id).ok_or_else(|| not_found("User"))?;
        entry.1 = new_password.to_string();
        Ok(())
    }

    async fn update_role(&self, user_id: u64, role: Role) -> Result<()> {
        let mut s = self.lock();
        s.record("update_role")?;
        s.admin()?;
        let entry = s.users.get_mut(&user_id).ok_or_else(|| not_found("User"))?;
        entry.0.role = role;
        Ok(())
    }

    async fn user_permissions(&self, user_id: u64) -> Result<Vec<u64>> {
        let mut s = self.lock();
        s.record("user_permissions")?;
        s.admin()?;
        if !s.users.contains_key(&user_id) {
            return Err(not_found("User"));
        }
        Ok(s.grants
            .iter()
            .filter(|(u, _)| *u == user_id)
            .map(|(_, c)| *c)
            .collect())
    }

    async fn set_user_permissions(&self, user_id: u64, cluster_ids: &[u64]) -> Result<()> {
        let mut s = self.lock();
        s.record("set_user_permissions")?;
        let admin = s.admin()?;
        let unknown_cluster = cluster_ids.iter().any(|c| !s.clusters.contains_key(c));
        if !s.users.contains_key(&user_id) || unknown_cluster {
            return Err(not_found("User or cluster"));
        }
        s.grants.retain(|(u, _)| *u != user_id);
        for cluster_id in cluster_ids {
            s.grants.insert((user_id, *cluster_id));
        }
        let detail = format!("Updated grants for user {}", user_id);
        s.log_audit(admin.id, "SetUserPermissions", detail);
        Ok(())
    }

    async fn audit_log(&self) -> Result<Vec<AuditEntry>> {
        let mut s = self.lock();
        s.record("audit_log")?;
        s.admin()?;
        // Oldest first on purpose; the recorder is responsible for ordering
        Ok(s.audit.clone())
    }
}
