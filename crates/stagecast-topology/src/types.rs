//! Topology type definitions

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

// ============================================================================
// Hosts
// ============================================================================

/// Health signal used by the healthiest-host selection policy.
///
/// Ordering is by rank: `Healthy < Degraded < Unreachable`. Ties between
/// hosts of equal health are broken by lexicographic host name, which keeps
/// selection reproducible.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HostHealth {
    /// Heartbeating and responsive
    Healthy,
    /// Heartbeating but degraded (late heartbeats, failed components)
    Degraded,
    /// Not heartbeating
    Unreachable,
}

impl HostHealth {
    /// Numeric rank, lower is healthier
    #[must_use]
    pub fn rank(self) -> u8 {
        match self {
            HostHealth::Healthy => 0,
            HostHealth::Degraded => 1,
            HostHealth::Unreachable => 2,
        }
    }
}

/// A managed host as known to the topology directory.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Host {
    /// Unique hostname
    pub name: String,
    /// OS family identifier, e.g. `redhat6`, used to match repository metadata
    pub os_family: String,
    /// Current health signal
    pub health: HostHealth,
}

impl Host {
    /// Create a healthy host
    pub fn new(name: impl Into<String>, os_family: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            os_family: os_family.into(),
            health: HostHealth::Healthy,
        }
    }

    /// Set the health signal
    #[must_use]
    pub fn with_health(mut self, health: HostHealth) -> Self {
        self.health = health;
        self
    }
}

// ============================================================================
// Stacks and services
// ============================================================================

/// Identifies a software stack version, e.g. `HDP-2.3`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StackId {
    pub name: String,
    pub version: String,
}

impl StackId {
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
        }
    }
}

impl fmt::Display for StackId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.name, self.version)
    }
}

/// Stack metadata for a component.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComponentInfo {
    pub name: String,
    /// Category, e.g. `MASTER`, `SLAVE`, `CLIENT`; forwarded to agents as a
    /// role parameter when known
    pub category: String,
}

impl ComponentInfo {
    pub fn new(name: impl Into<String>, category: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            category: category.into(),
        }
    }
}

// ============================================================================
// Repositories
// ============================================================================

/// One package repository within a repository version.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RepoEntry {
    pub base_url: String,
    pub name: String,
    pub id: String,
}

impl RepoEntry {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        base_url: impl Into<String>,
    ) -> Self {
        Self {
            base_url: base_url.into(),
            name: name.into(),
            id: id.into(),
        }
    }
}

/// Repositories for one OS family.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OsRepos {
    pub os_family: String,
    pub repos: Vec<RepoEntry>,
}

/// The cluster's current repository version, keyed by OS family.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RepositoryVersion {
    pub version: String,
    pub operating_systems: Vec<OsRepos>,
}

impl RepositoryVersion {
    pub fn new(version: impl Into<String>) -> Self {
        Self {
            version: version.into(),
            operating_systems: Vec::new(),
        }
    }

    /// Add repositories for an OS family
    #[must_use]
    pub fn with_os(mut self, os_family: impl Into<String>, repos: Vec<RepoEntry>) -> Self {
        self.operating_systems.push(OsRepos {
            os_family: os_family.into(),
            repos,
        });
        self
    }

    /// Repositories matching the given OS family, if any
    #[must_use]
    pub fn repos_for_os(&self, os_family: &str) -> Option<&[RepoEntry]> {
        self.operating_systems
            .iter()
            .find(|os| os.os_family == os_family)
            .map(|os| os.repos.as_slice())
    }
}

// ============================================================================
// Cluster snapshot
// ============================================================================

/// Serializable snapshot of cluster topology attached to each command so
/// agents can self-orient without a directory round trip.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClusterHostInfo {
    pub cluster: String,
    pub stack: Option<StackId>,
    /// All hosts in the cluster
    pub hosts: Vec<String>,
    /// Component name to host names
    pub components: BTreeMap<String, Vec<String>>,
}
