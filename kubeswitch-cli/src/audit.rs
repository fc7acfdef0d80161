///! Read-only view of the server's audit trail

use crate::backend::Backend;
use kubeswitch_common::{AuditEntry, Result};
use std::sync::Arc;

#[derive(Clone)]
pub struct AuditRecorder {
    backend: Arc<dyn Backend>,
}

impl AuditRecorder {
    pub fn new(backend: Arc<dyn Backend>) -> Self {
        Self { backend }
    }

    /// Full audit log, most recent first
    pub async fn list(&self) -> Result<Vec<AuditEntry>> {
        let mut entries = self.backend.audit_log().await?;
        // Stable sort keeps the server's order for equal timestamps
        entries.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(entries)
    }
}
