///! Console facade
///!
///! Composes the session manager, access gate, grant matrix, credential store
///! and audit recorder behind one API. Every protected operation asks the gate
///! first, so a denied action never reaches the network. Every response passes
///! through `settle`, which tears the session down when the server reports the
///! token as no longer valid.

use crate::audit::AuditRecorder;
use crate::backend::Backend;
use crate::credentials::CredentialStore;
use crate::gate::{AccessGate, Navigation, NavigationGuard, Route};
use crate::grants::{GrantEditor, GrantMatrix, GrantTarget};
use crate::session::SessionManager;
use crate::token_store::TokenStore;
use crate::validation::{validate_password, validate_username};
use crate::view::{ViewState, ViewTicket};
use kubeswitch_common::{
    AuditEntry, Capability, Cluster, CreateUserRequest, DenyReason, Error, Kubeconfig, Profile,
    Result, Role, Session, User,
};
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::{info, warn};

pub struct Console<S: TokenStore> {
    backend: Arc<dyn Backend>,
    session: SessionManager<S>,
    gate: AccessGate,
    grants: GrantMatrix,
    credentials: CredentialStore,
    audit: AuditRecorder,
    guard: NavigationGuard,
    clusters: Vec<Cluster>,
    users: Vec<User>,
    credential_view: ViewState<u64, Kubeconfig>,
}

impl<S: TokenStore> Console<S> {
    pub fn new(backend: Arc<dyn Backend>, store: S) -> Self {
        let grants = GrantMatrix::new(backend.clone());
        Self {
            session: SessionManager::new(backend.clone(), store),
            gate: AccessGate::new(grants.clone()),
            credentials: CredentialStore::new(backend.clone()),
            audit: AuditRecorder::new(backend.clone()),
            guard: NavigationGuard::new(None),
            clusters: Vec::new(),
            users: Vec::new(),
            credential_view: ViewState::new(),
            grants,
            backend,
        }
    }

    /// Pick up a session persisted by an earlier run
    pub async fn start(&mut self) -> Result<Option<Session>> {
        let session = self.session.restore().await?;
        self.guard = NavigationGuard::new(session.as_ref());
        Ok(session)
    }

    pub fn backend(&self) -> &Arc<dyn Backend> {
        &self.backend
    }

    pub fn session(&self) -> Option<Session> {
        self.session.current_session()
    }

    pub fn profile(&self) -> Option<&Profile> {
        self.session.profile()
    }

    pub fn navigate(&mut self, route: Route) -> Navigation {
        self.guard.navigate(route)
    }

    pub fn take_pending_redirect(&mut self) -> Option<Route> {
        self.guard.take_pending_redirect()
    }

    /// Cluster list as of the last successful load or mutation
    pub fn cached_clusters(&self) -> &[Cluster] {
        &self.clusters
    }

    pub fn cached_users(&self) -> &[User] {
        &self.users
    }

    /// The cluster whose credential is on display, and the credential once loaded
    pub fn credential_view(&self) -> &ViewState<u64, Kubeconfig> {
        &self.credential_view
    }

    // Session

    /// Returns the new session and the view to continue with
    pub async fn login(&mut self, username: &str, password: &str) -> Result<(Session, Route)> {
        let session = self.session.login(username, password).await?;
        let next = self.guard.on_login(session.role);
        Ok((session, next))
    }

    pub async fn logout(&mut self) -> Result<()> {
        self.clusters.clear();
        self.users.clear();
        self.credential_view.clear();
        self.guard.on_logout();
        self.session.logout().await
    }

    pub async fn refresh_profile(&mut self) -> Result<Profile> {
        self.authorize_session()?;
        let result = self.session.refresh_profile().await;
        self.settle(result).await
    }

    pub async fn change_password(&mut self, old_password: &str, new_password: &str) -> Result<()> {
        self.authorize_session()?;
        validate_password(new_password)?;
        let result = self.session.change_password(old_password, new_password).await;
        self.settle(result).await
    }

    // Clusters and credentials

    pub async fn list_clusters(&mut self) -> Result<&[Cluster]> {
        self.authorize(Capability::ViewClusters, None).await?;
        let result = self.credentials.list_clusters().await;
        self.clusters = self.settle(result).await?;
        Ok(&self.clusters)
    }

    pub async fn create_cluster(
        &mut self,
        name: &str,
        description: Option<String>,
        kubeconfig: Kubeconfig,
    ) -> Result<Cluster> {
        self.authorize(Capability::ManageClusters, None).await?;
        let result = self.credentials.create_cluster(name, description, kubeconfig).await;
        let cluster = self.settle(result).await?;
        self.clusters.push(cluster.clone());
        Ok(cluster)
    }

    pub async fn delete_cluster(&mut self, cluster_id: u64) -> Result<()> {
        self.authorize(Capability::ManageClusters, None).await?;
        let result = self.credentials.delete_cluster(cluster_id).await;
        self.settle(result).await?;
        self.clusters.retain(|c| c.id != cluster_id);
        Ok(())
    }

    pub async fn fetch_credential(&mut self, cluster_id: u64) -> Result<Kubeconfig> {
        self.authorize(Capability::ViewClusters, Some(cluster_id)).await?;
        let result = self.credentials.fetch_credential(cluster_id).await;
        self.settle(result).await
    }

    /// Switch the credential view to `cluster_id`; pass the ticket to
    /// `fetch_credential_for` to load it
    pub fn open_credential(&mut self, cluster_id: u64) -> ViewTicket {
        self.credential_view.navigate(cluster_id)
    }

    /// Fetch a credential for the view navigation `ticket` belongs to.
    ///
    /// Returns `None` when the view has moved on while the request was out;
    /// the late credential is dropped rather than shown.
    pub async fn fetch_credential_for(
        &mut self,
        ticket: ViewTicket,
        cluster_id: u64,
    ) -> Result<Option<&Kubeconfig>> {
        let blob = self.fetch_credential(cluster_id).await?;
        if self.credential_view.apply(ticket, blob) {
            Ok(self.credential_view.value())
        } else {
            Ok(None)
        }
    }

    pub async fn import_credential(
        &mut self,
        cluster_id: u64,
        kubeconfig: Kubeconfig,
    ) -> Result<()> {
        self.authorize(Capability::ManageClusters, None).await?;
        let result = self.credentials.import_credential(cluster_id, kubeconfig).await;
        self.settle(result).await
    }

    // Grants

    pub async fn grants_for_cluster(&mut self, cluster_id: u64) -> Result<BTreeSet<u64>> {
        self.authorize(Capability::ManagePermissions, None).await?;
        let result = self.grants.grants_for_cluster(cluster_id).await;
        self.settle(result).await
    }

    pub async fn grants_for_user(&mut self, user_id: u64) -> Result<BTreeSet<u64>> {
        self.authorize(Capability::ManagePermissions, None).await?;
        let result = self.grants.grants_for_user(user_id).await;
        self.settle(result).await
    }

    pub async fn set_grants_for_cluster(
        &mut self,
        cluster_id: u64,
        user_ids: &BTreeSet<u64>,
    ) -> Result<()> {
        self.authorize(Capability::ManagePermissions, None).await?;
        let result = self.grants.set_grants_for_cluster(cluster_id, user_ids).await;
        self.settle(result).await
    }

    pub async fn set_grants_for_user(
        &mut self,
        user_id: u64,
        cluster_ids: &BTreeSet<u64>,
    ) -> Result<()> {
        self.authorize(Capability::ManagePermissions, None).await?;
        let result = self.grants.set_grants_for_user(user_id, cluster_ids).await;
        self.settle(result).await
    }

    pub async fn open_grant_editor(&mut self, target: GrantTarget) -> Result<GrantEditor> {
        self.authorize(Capability::ManagePermissions, None).await?;
        let result = GrantEditor::open(self.grants.clone(), target).await;
        self.settle(result).await
    }

    pub async fn commit_grant_editor(
        &mut self,
        editor: &mut GrantEditor,
        selection: BTreeSet<u64>,
    ) -> Result<()> {
        self.authorize(Capability::ManagePermissions, None).await?;
        let result = editor.commit(selection).await;
        self.settle(result).await
    }

    // Users

    pub async fn list_users(&mut self) -> Result<&[User]> {
        self.authorize(Capability::ManageUsers, None).await?;
        let result = self.backend.list_users().await;
        self.users = self.settle(result).await?;
        Ok(&self.users)
    }

    pub async fn create_user(
        &mut self,
        username: &str,
        password: &str,
        role: Role,
    ) -> Result<User> {
        self.authorize(Capability::ManageUsers, None).await?;
        validate_username(username)?;
        validate_password(password)?;
        let role = known_role(role)?;

        let request = CreateUserRequest {
            username: username.to_string(),
            password: password.to_string(),
            role,
        };
        let result = self.backend.create_user(&request).await;
        let user = self.settle(result).await?;
        info!(user_id = user.id, username, %role, "created user");
        self.users.push(user.clone());
        Ok(user)
    }

    pub async fn delete_user(&mut self, user_id: u64) -> Result<()> {
        self.authorize(Capability::ManageUsers, None).await?;
        let result = self.backend.delete_user(user_id).await;
        self.settle(result).await?;
        info!(user_id, "deleted user");
        self.users.retain(|u| u.id != user_id);
        Ok(())
    }

    pub async fn reset_password(&mut self, user_id: u64, new_password: &str) -> Result<()> {
        self.authorize(Capability::ManageUsers, None).await?;
        validate_password(new_password)?;
        let result = self.backend.reset_password(user_id, new_password).await;
        self.settle(result).await?;
        info!(user_id, "reset user password");
        Ok(())
    }

    pub async fn set_role(&mut self, user_id: u64, role: Role) -> Result<()> {
        self.authorize(Capability::ManageUsers, None).await?;
        let role = known_role(role)?;
        let result = self.backend.update_role(user_id, role).await;
        self.settle(result).await?;
        info!(user_id, %role, "changed user role");
        if let Some(user) = self.users.iter_mut().find(|u| u.id == user_id) {
            user.role = role;
        }
        Ok(())
    }

    // Audit

    pub async fn audit_log(&mut self) -> Result<Vec<AuditEntry>> {
        self.authorize(Capability::ViewAudit, None).await?;
        let result = self.audit.list().await;
        self.settle(result).await
    }

    fn authorize_session(&self) -> Result<()> {
        match self.session.current_session() {
            Some(_) => Ok(()),
            None => Err(Error::AccessDenied(DenyReason::NotAuthenticated)),
        }
    }

    async fn authorize(&mut self, capability: Capability, cluster_id: Option<u64>) -> Result<()> {
        let session = self.session.current_session();
        let result = self.gate.decide(session.as_ref(), capability, cluster_id).await;
        self.settle(result).await?.into_result()
    }

    /// Central handler for responses: a rejected token ends the session
    async fn settle<T>(&mut self, result: Result<T>) -> Result<T> {
        if let Err(e) = &result {
            if e.is_auth_invalid() {
                if let Err(clear_err) = self.session.invalidate().await {
                    warn!(error = %clear_err, "failed to clear rejected session");
                }
                self.clusters.clear();
                self.users.clear();
                self.credential_view.clear();
                self.guard.on_auth_invalid();
            }
        }
        result
    }
}

fn known_role(role: Role) -> Result<Role> {
    match role {
        Role::Unknown => Err(Error::InvalidInput("role must be admin or user".to_string())),
        known => Ok(known),
    }
}
