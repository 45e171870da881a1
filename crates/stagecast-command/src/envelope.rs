//! Self-contained execution envelope
//!
//! One [`CommandEnvelope`] carries everything a remote agent needs to run a
//! command on one host: script binding, timeout, configuration tags, role
//! parameters and topology snapshots. The transport layer needs nothing
//! beyond the envelope to execute remotely.
//!
//! Envelopes are produced through [`CommandEnvelopeBuilder`] and frozen at
//! `finish()`; after dispatch only the task state tracked alongside them
//! changes.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Command verb understood by the agent shim.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RoleCommand {
    Install,
    Start,
    Stop,
    /// Custom action execution; the only verb the action dispatch path emits
    ActionExecute,
    Custom,
}

impl fmt::Display for RoleCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RoleCommand::Install => "INSTALL",
            RoleCommand::Start => "START",
            RoleCommand::Stop => "STOP",
            RoleCommand::ActionExecute => "ACTIONEXECUTE",
            RoleCommand::Custom => "CUSTOM",
        };
        write!(f, "{name}")
    }
}

/// One host's execution command within a stage.
///
/// `role_params` may contain resolved secrets; the `Debug` implementation
/// redacts them and they must never be echoed into logs or error messages.
#[derive(Clone, Serialize, Deserialize)]
pub struct CommandEnvelope {
    /// Target host name
    pub host: String,
    /// Role, derived from the action name
    pub role: String,
    /// Command verb
    pub role_command: RoleCommand,
    pub cluster: Option<String>,
    pub service: Option<String>,
    pub component: Option<String>,
    /// Agent shim contract parameters: script binding and timeout
    pub command_params: BTreeMap<String, String>,
    /// Always empty at dispatch; the agent populates values from the tags
    pub configurations: BTreeMap<String, BTreeMap<String, String>>,
    /// Always empty at dispatch, same rule as `configurations`
    pub configuration_attributes: BTreeMap<String, BTreeMap<String, String>>,
    /// Config type to tag; resolved lazily by the agent
    pub config_tags: BTreeMap<String, String>,
    /// Caller parameters with secrets already substituted
    pub role_params: BTreeMap<String, String>,
    /// Config categories the agent must refresh before executing
    pub refresh_config_tags_before_execution: BTreeSet<String>,
    /// Topology snapshot for agent self-orientation
    pub cluster_host_info: Option<serde_json::Value>,
    /// Repository metadata matching this host's OS family
    pub repo_info: Option<serde_json::Value>,
    /// Hint for the external scheduler
    pub retry_allowed: bool,
    /// Hint for the external scheduler
    pub failure_auto_skipped: bool,
    pub created_at: DateTime<Utc>,
}

impl fmt::Debug for CommandEnvelope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CommandEnvelope")
            .field("host", &self.host)
            .field("role", &self.role)
            .field("role_command", &self.role_command)
            .field("cluster", &self.cluster)
            .field("service", &self.service)
            .field("component", &self.component)
            .field("command_params", &self.command_params)
            .field("config_tags", &self.config_tags)
            .field("role_params", &"<redacted>")
            .finish_non_exhaustive()
    }
}

impl CommandEnvelope {
    /// Start building an envelope for a host/role pair
    #[must_use]
    pub fn builder(host: impl Into<String>, role: impl Into<String>) -> CommandEnvelopeBuilder {
        CommandEnvelopeBuilder::new(host, role)
    }
}

/// Finalize-once builder for [`CommandEnvelope`].
///
/// Each stage step sets its own fields and nothing is shared between hosts,
/// so parameter maps cannot alias across envelopes.
#[derive(Debug)]
pub struct CommandEnvelopeBuilder {
    envelope: CommandEnvelope,
}

impl CommandEnvelopeBuilder {
    /// Create a builder with empty configuration state
    pub fn new(host: impl Into<String>, role: impl Into<String>) -> Self {
        Self {
            envelope: CommandEnvelope {
                host: host.into(),
                role: role.into(),
                role_command: RoleCommand::ActionExecute,
                cluster: None,
                service: None,
                component: None,
                command_params: BTreeMap::new(),
                configurations: BTreeMap::new(),
                configuration_attributes: BTreeMap::new(),
                config_tags: BTreeMap::new(),
                role_params: BTreeMap::new(),
                refresh_config_tags_before_execution: BTreeSet::new(),
                cluster_host_info: None,
                repo_info: None,
                retry_allowed: false,
                failure_auto_skipped: false,
                created_at: Utc::now(),
            },
        }
    }

    /// Set the command verb
    #[must_use]
    pub fn role_command(mut self, role_command: RoleCommand) -> Self {
        self.envelope.role_command = role_command;
        self
    }

    /// Set the cluster name
    #[must_use]
    pub fn cluster(mut self, cluster: impl Into<String>) -> Self {
        self.envelope.cluster = Some(cluster.into());
        self
    }

    /// Set the service name; empty input is treated as unset
    #[must_use]
    pub fn service(mut self, service: &str) -> Self {
        if !service.is_empty() {
            self.envelope.service = Some(service.to_string());
        }
        self
    }

    /// Set the component name; empty input is treated as unset
    #[must_use]
    pub fn component(mut self, component: &str) -> Self {
        if !component.is_empty() {
            self.envelope.component = Some(component.to_string());
        }
        self
    }

    /// Set one command parameter
    #[must_use]
    pub fn command_param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.envelope.command_params.insert(key.into(), value.into());
        self
    }

    /// Attach configuration tags
    #[must_use]
    pub fn config_tags(mut self, tags: BTreeMap<String, String>) -> Self {
        self.envelope.config_tags = tags;
        self
    }

    /// Replace the role parameter map
    #[must_use]
    pub fn role_params(mut self, params: BTreeMap<String, String>) -> Self {
        self.envelope.role_params = params;
        self
    }

    /// Record config categories that must refresh before execution
    #[must_use]
    pub fn refresh_config_tags(mut self, categories: BTreeSet<String>) -> Self {
        self.envelope.refresh_config_tags_before_execution = categories;
        self
    }

    /// Attach the cluster topology snapshot
    #[must_use]
    pub fn cluster_host_info(mut self, info: serde_json::Value) -> Self {
        self.envelope.cluster_host_info = Some(info);
        self
    }

    /// Attach repository metadata
    #[must_use]
    pub fn repo_info(mut self, info: serde_json::Value) -> Self {
        self.envelope.repo_info = Some(info);
        self
    }

    /// Set the scheduler hints
    #[must_use]
    pub fn scheduler_hints(mut self, retry_allowed: bool, failure_auto_skipped: bool) -> Self {
        self.envelope.retry_allowed = retry_allowed;
        self.envelope.failure_auto_skipped = failure_auto_skipped;
        self
    }

    /// Freeze the envelope
    #[must_use]
    pub fn finish(self) -> CommandEnvelope {
        self.envelope
    }
}
