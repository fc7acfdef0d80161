///! REST surface the client core depends on
///!
///! `ApiClient` implements it over HTTP; tests substitute an in-memory server.

use async_trait::async_trait;
use kubeswitch_common::auth::{LoginRequest, LoginResponse};
use kubeswitch_common::{
    AuditEntry, ChangePasswordRequest, Cluster, CreateClusterRequest, CreateUserRequest,
    Kubeconfig, Profile, Result, Role, User,
};

#[async_trait]
pub trait Backend: Send + Sync {
    /// Install or remove the bearer token sent with every later request
    async fn set_token(&self, token: Option<String>);

    /// `POST /login`; a 401 here means bad credentials, not an expired session
    async fn login(&self, request: &LoginRequest) -> Result<LoginResponse>;
    async fn logout(&self) -> Result<()>;
    /// `GET /my/user`; the server may omit the id
    async fn current_user(&self) -> Result<Profile>;
    async fn change_password(&self, request: &ChangePasswordRequest) -> Result<()>;

    /// Admins get every cluster, users only the ones granted to them
    async fn list_clusters(&self) -> Result<Vec<Cluster>>;
    async fn create_cluster(&self, request: &CreateClusterRequest) -> Result<Cluster>;
    async fn delete_cluster(&self, cluster_id: u64) -> Result<()>;
    async fn get_kubeconfig(&self, cluster_id: u64) -> Result<Kubeconfig>;
    async fn import_kubeconfig(&self, cluster_id: u64, kubeconfig: &Kubeconfig) -> Result<()>;
    async fn cluster_permissions(&self, cluster_id: u64) -> Result<Vec<u64>>;
    async fn set_cluster_permissions(&self, cluster_id: u64, user_ids: &[u64]) -> Result<()>;

    async fn list_users(&self) -> Result<Vec<User>>;
    async fn create_user(&self, request: &CreateUserRequest) -> Result<User>;
    async fn delete_user(&self, user_id: u64) -> Result<()>;
    async fn reset_password(&self, user_id: u64, new_password: &str) -> Result<()>;
    async fn update_role(&self, user_id: u64, role: Role) -> Result<()>;
    async fn user_permissions(&self, user_id: u64) -> Result<Vec<u64>>;
    async fn set_user_permissions(&self, user_id: u64, cluster_ids: &[u64]) -> Result<()>;

    async fn audit_log(&self) -> Result<Vec<AuditEntry>>;
}
