//! stagecast-topology: Cluster topology and collaborator seams
//!
//! Provides the traits the dispatch engine consumes for cluster topology,
//! maintenance state, the action catalog, and secret resolution, plus
//! in-memory implementations for embedding and tests.

pub mod catalog;
pub mod directory;
pub mod error;
pub mod maintenance;
pub mod secrets;
pub mod types;

pub use catalog::{ActionCatalog, ActionDefinition, StaticCatalog};
pub use directory::{InMemoryTopology, TopologyDirectory};
pub use error::TopologyError;
pub use maintenance::{MaintenanceFilter, NoMaintenance, OperationScope, filter_maintenance};
pub use secrets::{SecretResolver, StaticSecretStore, is_secret_reference, resolve_secret_params};
pub use types::{
    ClusterHostInfo, ComponentInfo, Host, HostHealth, OsRepos, RepoEntry, RepositoryVersion,
    StackId,
};
