//! Message types for actor communication
//!
//! Message handlers are implemented in their respective actor modules.

use chrono::{DateTime, Utc};
use kameo_macros::Reply;

use stagecast_api::ActionRequest;
use stagecast_command::state::TaskState;

use crate::stage::{Stage, StageOutcome};

// ============================================================================
// StageActor Messages
// ============================================================================

/// Report a task state transition observed by the transport
#[derive(Debug)]
pub struct ReportTaskState {
    /// Host whose task changed
    pub host: String,
    /// Role of the task
    pub role: String,
    /// New state
    pub state: TaskState,
}

/// Abort every non-terminal task in the stage
#[derive(Debug)]
pub struct Abort;

/// Get the stage's current aggregate status
#[derive(Debug)]
pub struct GetStatus;

/// Aggregate stage status response
#[derive(Debug, Clone, Reply)]
pub struct StageStatus {
    /// Stage identifier
    pub stage: u64,
    /// Action that created the stage
    pub action: String,
    /// Current aggregate outcome
    pub outcome: StageOutcome,
    /// Per-role quorum progress
    pub roles: Vec<RoleStatus>,
    /// Per-task states
    pub tasks: Vec<TaskStatus>,
    /// Stage creation timestamp
    pub created_at: DateTime<Utc>,
}

/// Quorum progress for one role
#[derive(Debug, Clone)]
pub struct RoleStatus {
    pub role: String,
    pub success_factor: f32,
    pub total: usize,
    pub completed: usize,
    pub failed: usize,
    pub required: usize,
}

/// State of one task
#[derive(Debug, Clone)]
pub struct TaskStatus {
    pub host: String,
    pub role: String,
    pub state: TaskState,
    pub created_at: DateTime<Utc>,
}

impl StageStatus {
    /// Snapshot a stage's aggregate state
    #[must_use]
    pub fn of(stage: &Stage) -> Self {
        Self {
            stage: stage.id(),
            action: stage.action().to_string(),
            outcome: stage.outcome(),
            roles: stage
                .roles()
                .iter()
                .map(|(role, progress)| RoleStatus {
                    role: role.clone(),
                    success_factor: progress.success_factor,
                    total: progress.total,
                    completed: progress.completed,
                    failed: progress.failed,
                    required: progress.required,
                })
                .collect(),
            tasks: stage
                .tasks()
                .iter()
                .map(|task| TaskStatus {
                    host: task.envelope.host.clone(),
                    role: task.envelope.role.clone(),
                    state: task.state,
                    created_at: task.envelope.created_at,
                })
                .collect(),
            created_at: stage.created_at(),
        }
    }
}

// ============================================================================
// DispatcherActor Messages
// ============================================================================

/// Submit an action request for validation, selection, and dispatch
#[derive(Debug)]
pub struct SubmitAction {
    /// The caller's request
    pub request: ActionRequest,
}

/// Forward a transport task report to the owning stage
#[derive(Debug)]
pub struct ReportTask {
    /// Stage identifier
    pub stage: u64,
    /// Host whose task changed
    pub host: String,
    /// Role of the task
    pub role: String,
    /// New state
    pub state: TaskState,
}

/// Abort a dispatched stage
#[derive(Debug)]
pub struct AbortStage {
    /// Stage identifier
    pub stage: u64,
}

/// Get the status of a dispatched stage
#[derive(Debug)]
pub struct GetStage {
    /// Stage identifier
    pub stage: u64,
}

/// List the status of every registered stage
#[derive(Debug)]
pub struct ListStages;
