///! Cluster credential custody
///!
///! Kubeconfigs are fetched on demand and handed straight to the caller;
///! nothing here keeps a copy.

use crate::backend::Backend;
use crate::validation::{validate_cluster_name, validate_kubeconfig};
use kubeswitch_common::{
    Cluster, CreateClusterRequest, DenyReason, Error, Kubeconfig, Result, ServerError,
};
use std::sync::Arc;
use tracing::{debug, info};

#[derive(Clone)]
pub struct CredentialStore {
    backend: Arc<dyn Backend>,
}

impl CredentialStore {
    pub fn new(backend: Arc<dyn Backend>) -> Self {
        Self { backend }
    }

    pub async fn list_clusters(&self) -> Result<Vec<Cluster>> {
        self.backend.list_clusters().await
    }

    /// Retrieve a cluster's kubeconfig; a server-side 403 is a missing grant
    pub async fn fetch_credential(&self, cluster_id: u64) -> Result<Kubeconfig> {
        let kubeconfig = self
            .backend
            .get_kubeconfig(cluster_id)
            .await
            .map_err(|e| match e {
                Error::Server(ServerError::Forbidden(_)) => {
                    Error::AccessDenied(DenyReason::NoGrant)
                }
                other => other,
            })?;
        debug!(cluster_id, bytes = kubeconfig.len(), "fetched credential");
        Ok(kubeconfig)
    }

    /// Replace a cluster's credential wholesale
    pub async fn import_credential(&self, cluster_id: u64, kubeconfig: Kubeconfig) -> Result<()> {
        validate_kubeconfig(kubeconfig.as_str())?;
        self.backend.import_kubeconfig(cluster_id, &kubeconfig).await?;
        info!(cluster_id, "imported credential");
        Ok(())
    }

    /// Register a cluster together with its initial credential in one request
    pub async fn create_cluster(
        &self,
        name: &str,
        description: Option<String>,
        kubeconfig: Kubeconfig,
    ) -> Result<Cluster> {
        validate_cluster_name(name)?;
        validate_kubeconfig(kubeconfig.as_str())?;

        let request = CreateClusterRequest {
            name: name.trim().to_string(),
            description: description.filter(|d| !d.trim().is_empty()),
            kubeconfig,
        };
        let cluster = self.backend.create_cluster(&request).await?;
        info!(cluster_id = cluster.id, name = %cluster.name, "created cluster");
        Ok(cluster)
    }

    pub async fn delete_cluster(&self, cluster_id: u64) -> Result<()> {
        self.backend.delete_cluster(cluster_id).await?;
        info!(cluster_id, "deleted cluster");
        Ok(())
    }
}
