//! Action request types
//!
//! An [`ActionRequest`] is the caller-facing description of an administrative
//! action to run against a cluster: which action, which cluster, an optional
//! resource filter narrowing the target service/component/hosts, and free-form
//! parameters handed through to the remote agent.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Host selection policy for an action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TargetHostType {
    /// Every candidate host receives a task
    All,
    /// Exactly one host, chosen by the healthiest-host policy
    Any,
    /// `floor(n/2) + 1` of n candidates
    Majority,
    /// Caller must supply explicit host names
    Specific,
}

impl fmt::Display for TargetHostType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TargetHostType::All => write!(f, "ALL"),
            TargetHostType::Any => write!(f, "ANY"),
            TargetHostType::Majority => write!(f, "MAJORITY"),
            TargetHostType::Specific => write!(f, "SPECIFIC"),
        }
    }
}

impl FromStr for TargetHostType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "ALL" => Ok(TargetHostType::All),
            "ANY" => Ok(TargetHostType::Any),
            "MAJORITY" => Ok(TargetHostType::Majority),
            "SPECIFIC" => Ok(TargetHostType::Specific),
            other => Err(format!("unknown target host type: {other}")),
        }
    }
}

/// Scopes an action to a service, component, and/or explicit host list.
///
/// At most one filter may be attached to a request; the validator rejects
/// anything more.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResourceFilter {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub service: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub component: Option<String>,
    #[serde(default)]
    pub hosts: Vec<String>,
}

impl ResourceFilter {
    /// Create an empty filter
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Scope to a service
    #[must_use]
    pub fn with_service(mut self, service: impl Into<String>) -> Self {
        self.service = Some(service.into());
        self
    }

    /// Scope to a component (requires a service scope as well)
    #[must_use]
    pub fn with_component(mut self, component: impl Into<String>) -> Self {
        self.component = Some(component.into());
        self
    }

    /// Add an explicit target host
    #[must_use]
    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.hosts.push(host.into());
        self
    }

    /// Service name, empty string when unset
    #[must_use]
    pub fn service_name(&self) -> &str {
        self.service.as_deref().unwrap_or("")
    }

    /// Component name, empty string when unset
    #[must_use]
    pub fn component_name(&self) -> &str {
        self.component.as_deref().unwrap_or("")
    }
}

/// A request to execute a catalog action against a cluster.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionRequest {
    /// Catalog action name, e.g. `update_repo`
    pub action: String,
    /// Target cluster; cluster-less requests may only address explicit hosts
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cluster: Option<String>,
    /// Resource filters; at most one is accepted
    #[serde(default)]
    pub filters: Vec<ResourceFilter>,
    /// Free-form parameters forwarded to the agent as role parameters
    #[serde(default)]
    pub parameters: BTreeMap<String, String>,
    /// Explicit command timeout in seconds; the effective timeout never goes
    /// below the configured agent default
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout_secs: Option<u64>,
    /// Whether the external scheduler may retry failed tasks
    #[serde(default)]
    pub retry_allowed: bool,
    /// Whether the external scheduler may skip over failed tasks
    #[serde(default)]
    pub failure_auto_skipped: bool,
    /// Overrides the action definition's target host type
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_type_override: Option<TargetHostType>,
}

impl ActionRequest {
    /// Create a request for the named action
    pub fn new(action: impl Into<String>) -> Self {
        Self {
            action: action.into(),
            cluster: None,
            filters: Vec::new(),
            parameters: BTreeMap::new(),
            timeout_secs: None,
            retry_allowed: false,
            failure_auto_skipped: false,
            target_type_override: None,
        }
    }

    /// Target a cluster
    #[must_use]
    pub fn with_cluster(mut self, cluster: impl Into<String>) -> Self {
        self.cluster = Some(cluster.into());
        self
    }

    /// Attach a resource filter
    #[must_use]
    pub fn with_filter(mut self, filter: ResourceFilter) -> Self {
        self.filters.push(filter);
        self
    }

    /// Set a caller parameter
    #[must_use]
    pub fn with_parameter(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.parameters.insert(key.into(), value.into());
        self
    }

    /// Request a command timeout in seconds
    #[must_use]
    pub fn with_timeout_secs(mut self, secs: u64) -> Self {
        self.timeout_secs = Some(secs);
        self
    }

    /// Allow the external scheduler to retry failed tasks
    #[must_use]
    pub fn with_retry_allowed(mut self, allowed: bool) -> Self {
        self.retry_allowed = allowed;
        self
    }

    /// Override the action definition's target host type
    #[must_use]
    pub fn with_target_type(mut self, target_type: TargetHostType) -> Self {
        self.target_type_override = Some(target_type);
        self
    }

    /// First filter, if any
    #[must_use]
    pub fn filter(&self) -> Option<&ResourceFilter> {
        self.filters.first()
    }
}
