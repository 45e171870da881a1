//! Error types for stagecast-core
//!
//! Everything here is scoped to one request or stage; nothing is fatal to
//! the process. Validation and selection failures are fully recoverable by
//! the caller correcting the request. Once a stage is dispatched, individual
//! task failures are quorum input, not errors.

use thiserror::Error;

use stagecast_api::TargetHostType;
use stagecast_command::error::DeliveryError;
use stagecast_command::state::TaskState;
use stagecast_topology::error::TopologyError;

/// Request validation failures, raised before any host selection or command
/// building.
#[derive(Error, Debug, Clone)]
pub enum ValidationError {
    /// Action name empty or not in the catalog
    #[error("action does not exist: {0}")]
    UnknownAction(String),

    /// A mandatory declared input is missing from the parameters
    #[error("action {action} requires input '{input}' that is not provided")]
    MissingInput {
        /// Action name
        action: String,
        /// Missing input name
        input: String,
    },

    /// More than one resource filter supplied
    #[error("only one resource filter may be specified")]
    AmbiguousFilter,

    /// Named cluster is not known
    #[error("cluster not found: {0}")]
    UnknownCluster(String),

    /// Filter's service contradicts the action definition's target service
    #[error("action {action} targets service {actual} which does not match expected {expected}")]
    ServiceMismatch {
        action: String,
        expected: String,
        actual: String,
    },

    /// Resolved target service is absent from the cluster's current stack
    #[error("action {action} targets service {service} that does not exist")]
    UnknownService { action: String, service: String },

    /// Filter's component contradicts the action definition's target component
    #[error("action {action} targets component {actual} which does not match expected {expected}")]
    ComponentMismatch {
        action: String,
        expected: String,
        actual: String,
    },

    /// Resolved target component is absent from the cluster's current stack
    #[error("action {action} targets component {component} that does not exist")]
    UnknownComponent { action: String, component: String },

    /// A component was named without a service to own it
    #[error("action {action} targets component {component} without specifying the target service")]
    ComponentWithoutService { action: String, component: String },

    /// The action requires explicit target hosts and none were supplied
    #[error("action {action} requires explicit target host(s) that are not provided")]
    MissingHosts { action: String },
}

/// Host resolution failures, raised pre-dispatch.
#[derive(Error, Debug, Clone)]
pub enum SelectionError {
    /// Candidate set came up empty and no explicit hosts were given
    #[error("no suitable hosts found: service={service}, component={component}")]
    NoSuitableHosts { service: String, component: String },

    /// An explicit host is not part of the candidate set
    #[error("host {host} is not valid for service={service}, component={component}")]
    HostNotInScope {
        host: String,
        service: String,
        component: String,
    },

    /// Selection policy cannot self-select hosts for this target type
    #[error("unsupported target type: {0}")]
    UnsupportedTargetType(TargetHostType),
}

/// Command assembly failures; any of these aborts the whole dispatch and no
/// partial stage is exposed.
#[derive(Error, Debug, Clone)]
pub enum BuildError {
    /// A stage-level override parameter is malformed. The message cites the
    /// parameter name only; values are never echoed.
    #[error("malformed value for parameter '{parameter}' of action {action}")]
    BadParameter { action: String, parameter: String },

    /// Secret resolution failed
    #[error(transparent)]
    Secret(#[from] TopologyError),

    /// Cluster host info snapshot could not be serialized
    #[error("failed to serialize cluster host info: {0}")]
    Snapshot(String),
}

/// Umbrella error for the dispatch engine.
#[derive(Error, Debug, Clone)]
pub enum DispatchError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Selection(#[from] SelectionError),

    #[error(transparent)]
    Build(#[from] BuildError),

    #[error(transparent)]
    Delivery(#[from] DeliveryError),

    /// Stage id is not registered
    #[error("stage not found: {0}")]
    StageNotFound(u64),

    /// No task for the given host and role in the stage
    #[error("task not found: host={host}, role={role}")]
    TaskNotFound { host: String, role: String },

    /// Reported state is not reachable from the task's current state
    #[error("invalid task transition from {from} to {to}")]
    InvalidTaskTransition { from: TaskState, to: TaskState },

    /// Actor communication error
    #[error("actor communication error: {0}")]
    ActorError(String),
}
