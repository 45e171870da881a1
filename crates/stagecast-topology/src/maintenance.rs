//! Maintenance-state filtering
//!
//! Hosts under maintenance are excluded from candidate sets before host
//! selection. Filtering only shrinks the set; it never fails a dispatch.

use std::collections::BTreeSet;

use async_trait::async_trait;
use tracing::warn;

/// Operation context handed to the maintenance predicate.
#[derive(Debug, Clone, Default)]
pub struct OperationScope {
    pub cluster: Option<String>,
    pub service: Option<String>,
    pub component: Option<String>,
}

impl OperationScope {
    /// Scope for a cluster-wide operation
    #[must_use]
    pub fn cluster_wide(cluster: impl Into<String>) -> Self {
        Self {
            cluster: Some(cluster.into()),
            service: None,
            component: None,
        }
    }

    /// Narrow the scope to a service
    #[must_use]
    pub fn with_service(mut self, service: impl Into<String>) -> Self {
        self.service = Some(service.into());
        self
    }

    /// Narrow the scope to a component
    #[must_use]
    pub fn with_component(mut self, component: impl Into<String>) -> Self {
        self.component = Some(component.into());
        self
    }
}

/// Predicate deciding whether a host is excluded from an operation.
#[async_trait]
pub trait MaintenanceFilter: Send + Sync {
    /// True when the host must not receive tasks for this operation scope
    async fn is_excluded(&self, scope: &OperationScope, host: &str) -> bool;
}

/// Pass-through filter: no host is ever under maintenance.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoMaintenance;

#[async_trait]
impl MaintenanceFilter for NoMaintenance {
    async fn is_excluded(&self, _scope: &OperationScope, _host: &str) -> bool {
        false
    }
}

/// Remove hosts under maintenance from a candidate set.
///
/// Removed hosts are logged, not failed; an empty result is left for the
/// selection policy to reject.
pub async fn filter_maintenance(
    filter: &dyn MaintenanceFilter,
    scope: &OperationScope,
    candidates: &mut BTreeSet<String>,
) {
    let mut excluded = Vec::new();
    for host in candidates.iter() {
        if filter.is_excluded(scope, host).await {
            excluded.push(host.clone());
        }
    }

    if !excluded.is_empty() {
        warn!(
            excluded = ?excluded,
            service = scope.service.as_deref().unwrap_or(""),
            component = scope.component.as_deref().unwrap_or(""),
            "ignoring hosts under maintenance"
        );
        for host in &excluded {
            candidates.remove(host);
        }
    }
}
