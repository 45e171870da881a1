//! Topology directory trait and in-memory implementation
//!
//! The directory answers "what runs where" questions: which hosts carry a
//! component, what the cluster's current stack and repository version are,
//! and which configuration tags apply to a host. The dispatch engine only
//! reads from it; the backing store is external.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use async_trait::async_trait;

use crate::types::{ClusterHostInfo, ComponentInfo, Host, RepositoryVersion, StackId};

/// Read-only view of cluster topology.
///
/// Lookups against unknown clusters return empty sets or `None`; existence
/// is checked explicitly via [`TopologyDirectory::cluster_exists`].
#[async_trait]
pub trait TopologyDirectory: Send + Sync {
    /// Whether the cluster is known
    async fn cluster_exists(&self, cluster: &str) -> bool;

    /// The cluster's current stack version
    async fn current_stack(&self, cluster: &str) -> Option<StackId>;

    /// Whether the service exists in the cluster's current stack
    async fn service_in_stack(&self, cluster: &str, service: &str) -> bool;

    /// Stack metadata for a component, if it exists
    async fn component_in_stack(
        &self,
        cluster: &str,
        service: &str,
        component: &str,
    ) -> Option<ComponentInfo>;

    /// Hosts running the given component
    async fn hosts_for_component(
        &self,
        cluster: &str,
        service: &str,
        component: &str,
    ) -> BTreeSet<String>;

    /// Hosts running any component of the given service
    async fn hosts_for_service(&self, cluster: &str, service: &str) -> BTreeSet<String>;

    /// Every host in the cluster
    async fn all_hosts(&self, cluster: &str) -> BTreeSet<String>;

    /// Host record by name
    async fn host(&self, cluster: &str, name: &str) -> Option<Host>;

    /// Configuration tags (config type to tag) effective for a host,
    /// host-level overrides already applied. Tags, not resolved values; the
    /// agent resolves values lazily so it always sees the freshest version.
    async fn resolve_config_tags(&self, cluster: &str, host: &str) -> BTreeMap<String, String>;

    /// The cluster's current repository version, if one is installed
    async fn current_repository(&self, cluster: &str) -> Option<RepositoryVersion>;

    /// Serializable topology snapshot for agent self-orientation
    async fn cluster_host_info(&self, cluster: &str) -> Option<ClusterHostInfo>;
}

#[derive(Debug, Clone)]
struct ComponentRecord {
    info: ComponentInfo,
    hosts: BTreeSet<String>,
}

#[derive(Debug, Clone, Default)]
struct ClusterRecord {
    stack: Option<StackId>,
    hosts: BTreeMap<String, Host>,
    /// service name to component name to record
    services: BTreeMap<String, BTreeMap<String, ComponentRecord>>,
    /// cluster-level config tags, config type to tag
    config_tags: BTreeMap<String, String>,
    /// per-host tag overrides
    host_config_tags: BTreeMap<String, BTreeMap<String, String>>,
    repository: Option<RepositoryVersion>,
}

/// In-memory [`TopologyDirectory`] for embedding and tests.
///
/// Built up-front with `with_*` methods, then shared read-only.
#[derive(Debug, Clone, Default)]
pub struct InMemoryTopology {
    clusters: HashMap<String, ClusterRecord>,
}

impl InMemoryTopology {
    /// Create an empty directory
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a cluster with its current stack
    #[must_use]
    pub fn with_cluster(mut self, cluster: impl Into<String>, stack: StackId) -> Self {
        self.clusters.entry(cluster.into()).or_default().stack = Some(stack);
        self
    }

    /// Register a host in a cluster
    #[must_use]
    pub fn with_host(mut self, cluster: &str, host: Host) -> Self {
        self.clusters
            .entry(cluster.to_string())
            .or_default()
            .hosts
            .insert(host.name.clone(), host);
        self
    }

    /// Register a service in the cluster's stack (no components yet)
    #[must_use]
    pub fn with_service(mut self, cluster: &str, service: impl Into<String>) -> Self {
        self.clusters
            .entry(cluster.to_string())
            .or_default()
            .services
            .entry(service.into())
            .or_default();
        self
    }

    /// Register a component and the hosts it is placed on
    #[must_use]
    pub fn with_component<I, S>(
        mut self,
        cluster: &str,
        service: &str,
        info: ComponentInfo,
        hosts: I,
    ) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let record = ComponentRecord {
            hosts: hosts.into_iter().map(Into::into).collect(),
            info: info.clone(),
        };
        self.clusters
            .entry(cluster.to_string())
            .or_default()
            .services
            .entry(service.to_string())
            .or_default()
            .insert(info.name.clone(), record);
        self
    }

    /// Set a cluster-level configuration tag
    #[must_use]
    pub fn with_config_tag(
        mut self,
        cluster: &str,
        config_type: impl Into<String>,
        tag: impl Into<String>,
    ) -> Self {
        self.clusters
            .entry(cluster.to_string())
            .or_default()
            .config_tags
            .insert(config_type.into(), tag.into());
        self
    }

    /// Set a host-level configuration tag override
    #[must_use]
    pub fn with_host_config_tag(
        mut self,
        cluster: &str,
        host: &str,
        config_type: impl Into<String>,
        tag: impl Into<String>,
    ) -> Self {
        self.clusters
            .entry(cluster.to_string())
            .or_default()
            .host_config_tags
            .entry(host.to_string())
            .or_default()
            .insert(config_type.into(), tag.into());
        self
    }

    /// Set the cluster's current repository version
    #[must_use]
    pub fn with_repository(mut self, cluster: &str, repository: RepositoryVersion) -> Self {
        self.clusters
            .entry(cluster.to_string())
            .or_default()
            .repository = Some(repository);
        self
    }

    fn cluster(&self, name: &str) -> Option<&ClusterRecord> {
        self.clusters.get(name)
    }
}

#[async_trait]
impl TopologyDirectory for InMemoryTopology {
    async fn cluster_exists(&self, cluster: &str) -> bool {
        self.clusters.contains_key(cluster)
    }

    async fn current_stack(&self, cluster: &str) -> Option<StackId> {
        self.cluster(cluster).and_then(|c| c.stack.clone())
    }

    async fn service_in_stack(&self, cluster: &str, service: &str) -> bool {
        self.cluster(cluster)
            .is_some_and(|c| c.services.contains_key(service))
    }

    async fn component_in_stack(
        &self,
        cluster: &str,
        service: &str,
        component: &str,
    ) -> Option<ComponentInfo> {
        self.cluster(cluster)
            .and_then(|c| c.services.get(service))
            .and_then(|s| s.get(component))
            .map(|record| record.info.clone())
    }

    async fn hosts_for_component(
        &self,
        cluster: &str,
        service: &str,
        component: &str,
    ) -> BTreeSet<String> {
        self.cluster(cluster)
            .and_then(|c| c.services.get(service))
            .and_then(|s| s.get(component))
            .map(|record| record.hosts.clone())
            .unwrap_or_default()
    }

    async fn hosts_for_service(&self, cluster: &str, service: &str) -> BTreeSet<String> {
        self.cluster(cluster)
            .and_then(|c| c.services.get(service))
            .map(|components| {
                components
                    .values()
                    .flat_map(|record| record.hosts.iter().cloned())
                    .collect()
            })
            .unwrap_or_default()
    }

    async fn all_hosts(&self, cluster: &str) -> BTreeSet<String> {
        self.cluster(cluster)
            .map(|c| c.hosts.keys().cloned().collect())
            .unwrap_or_default()
    }

    async fn host(&self, cluster: &str, name: &str) -> Option<Host> {
        self.cluster(cluster).and_then(|c| c.hosts.get(name)).cloned()
    }

    async fn resolve_config_tags(&self, cluster: &str, host: &str) -> BTreeMap<String, String> {
        let Some(record) = self.cluster(cluster) else {
            return BTreeMap::new();
        };
        let mut tags = record.config_tags.clone();
        if let Some(overrides) = record.host_config_tags.get(host) {
            for (config_type, tag) in overrides {
                tags.insert(config_type.clone(), tag.clone());
            }
        }
        tags
    }

    async fn current_repository(&self, cluster: &str) -> Option<RepositoryVersion> {
        self.cluster(cluster).and_then(|c| c.repository.clone())
    }

    async fn cluster_host_info(&self, cluster: &str) -> Option<ClusterHostInfo> {
        let record = self.cluster(cluster)?;
        let mut components = BTreeMap::new();
        for service in record.services.values() {
            for (name, component) in service {
                components.insert(name.clone(), component.hosts.iter().cloned().collect());
            }
        }
        Some(ClusterHostInfo {
            cluster: cluster.to_string(),
            stack: record.stack.clone(),
            hosts: record.hosts.keys().cloned().collect(),
            components,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn directory() -> InMemoryTopology {
        InMemoryTopology::new()
            .with_cluster("prod", StackId::new("HDP", "2.3"))
            .with_host("prod", Host::new("h1", "redhat6"))
            .with_host("prod", Host::new("h2", "redhat6"))
            .with_host("prod", Host::new("h3", "debian7"))
            .with_component(
                "prod",
                "HDFS",
                ComponentInfo::new("DATANODE", "SLAVE"),
                ["h1", "h2"],
            )
            .with_component(
                "prod",
                "HDFS",
                ComponentInfo::new("NAMENODE", "MASTER"),
                ["h3"],
            )
    }

    #[tokio::test]
    async fn test_component_hosts() {
        let dir = directory();
        let hosts = dir.hosts_for_component("prod", "HDFS", "DATANODE").await;
        assert_eq!(hosts.len(), 2);
        assert!(hosts.contains("h1"));
    }

    #[tokio::test]
    async fn test_service_hosts_union() {
        let dir = directory();
        let hosts = dir.hosts_for_service("prod", "HDFS").await;
        assert_eq!(hosts.len(), 3);
    }

    #[tokio::test]
    async fn test_unknown_cluster_is_empty() {
        let dir = directory();
        assert!(!dir.cluster_exists("staging").await);
        assert!(dir.all_hosts("staging").await.is_empty());
        assert!(dir.current_stack("staging").await.is_none());
    }

    #[tokio::test]
    async fn test_host_tag_overrides() {
        let dir = directory()
            .with_config_tag("prod", "hdfs-site", "version1")
            .with_host_config_tag("prod", "h2", "hdfs-site", "version2");

        let h1_tags = dir.resolve_config_tags("prod", "h1").await;
        assert_eq!(h1_tags["hdfs-site"], "version1");

        let h2_tags = dir.resolve_config_tags("prod", "h2").await;
        assert_eq!(h2_tags["hdfs-site"], "version2");
    }

    #[tokio::test]
    async fn test_cluster_host_info_snapshot() {
        let info = directory().cluster_host_info("prod").await.unwrap();
        assert_eq!(info.hosts.len(), 3);
        assert_eq!(info.components["DATANODE"], vec!["h1", "h2"]);
        assert_eq!(info.stack.unwrap().to_string(), "HDP-2.3");
    }
}
