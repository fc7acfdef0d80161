///! Grant matrix: which users may see which clusters
///!
///! Reads are never cached. Writes replace one side of the relation in a
///! single call and the server is authoritative for the other side.

use crate::backend::Backend;
use kubeswitch_common::{Error, GrantError, Result, ServerError};
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::{debug, info, warn};

#[derive(Clone)]
pub struct GrantMatrix {
    backend: Arc<dyn Backend>,
}

impl GrantMatrix {
    pub fn new(backend: Arc<dyn Backend>) -> Self {
        Self { backend }
    }

    pub async fn grants_for_user(&self, user_id: u64) -> Result<BTreeSet<u64>> {
        let ids = self.backend.user_permissions(user_id).await.map_err(stale)?;
        Ok(ids.into_iter().collect())
    }

    pub async fn grants_for_cluster(&self, cluster_id: u64) -> Result<BTreeSet<u64>> {
        let ids = self
            .backend
            .cluster_permissions(cluster_id)
            .await
            .map_err(stale)?;
        Ok(ids.into_iter().collect())
    }

    /// Cluster ids visible to the current principal.
    ///
    /// Non-admins cannot read the permission endpoints, so their own grants
    /// are projected from the cluster listing.
    pub async fn own_grants(&self) -> Result<BTreeSet<u64>> {
        let clusters = self.backend.list_clusters().await?;
        debug!(count = clusters.len(), "fetched own cluster grants");
        Ok(clusters.into_iter().map(|c| c.id).collect())
    }

    pub async fn set_grants_for_cluster(
        &self,
        cluster_id: u64,
        user_ids: &BTreeSet<u64>,
    ) -> Result<()> {
        let ids: Vec<u64> = user_ids.iter().copied().collect();
        self.backend
            .set_cluster_permissions(cluster_id, &ids)
            .await
            .map_err(stale)?;
        info!(cluster_id, users = ids.len(), "replaced cluster grants");
        Ok(())
    }

    pub async fn set_grants_for_user(
        &self,
        user_id: u64,
        cluster_ids: &BTreeSet<u64>,
    ) -> Result<()> {
        let ids: Vec<u64> = cluster_ids.iter().copied().collect();
        self.backend
            .set_user_permissions(user_id, &ids)
            .await
            .map_err(stale)?;
        info!(user_id, clusters = ids.len(), "replaced user grants");
        Ok(())
    }
}

/// A 404 from a grant endpoint means the user or cluster is gone
fn stale(err: Error) -> Error {
    match err {
        Error::Server(ServerError::NotFound(msg)) => {
            warn!(%msg, "grant references a deleted user or cluster");
            Error::Grant(GrantError::StaleReference)
        }
        other => other,
    }
}

/// Which side of the relation an editor replaces
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GrantTarget {
    /// Edit the users allowed on one cluster
    Cluster(u64),
    /// Edit the clusters one user may see
    User(u64),
}

/// Permission-edit session.
///
/// Opening always re-fetches from the server. The local snapshot only moves
/// after the server confirmed a replace.
pub struct GrantEditor {
    matrix: GrantMatrix,
    target: GrantTarget,
    snapshot: BTreeSet<u64>,
}

impl GrantEditor {
    pub async fn open(matrix: GrantMatrix, target: GrantTarget) -> Result<Self> {
        let snapshot = match target {
            GrantTarget::Cluster(id) => matrix.grants_for_cluster(id).await?,
            GrantTarget::User(id) => matrix.grants_for_user(id).await?,
        };
        Ok(Self {
            matrix,
            target,
            snapshot,
        })
    }

    pub fn target(&self) -> GrantTarget {
        self.target
    }

    pub fn current(&self) -> &BTreeSet<u64> {
        &self.snapshot
    }

    /// Replace the whole set on the server, then adopt it locally
    pub async fn commit(&mut self, selection: BTreeSet<u64>) -> Result<()> {
        match self.target {
            GrantTarget::Cluster(id) => self.matrix.set_grants_for_cluster(id, &selection).await?,
            GrantTarget::User(id) => self.matrix.set_grants_for_user(id, &selection).await?,
        }
        self.snapshot = selection;
        Ok(())
    }
}
