//! Task state machine
//!
//! Every envelope dispatched to a host is tracked through this lifecycle:
//!
//! ```text
//! Pending -> Queued -> InProgress -> Completed | Failed | TimedOut
//!     any non-terminal state -> Aborted
//! ```
//!
//! Completed, Failed, TimedOut and Aborted are terminal; nothing transitions
//! out of them.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Execution state of one per-host task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskState {
    /// Created, not yet accepted by transport
    Pending,
    /// Accepted by transport
    Queued,
    /// Agent began execution
    InProgress,
    /// Agent reported success
    Completed,
    /// Agent reported failure
    Failed,
    /// Transport enforced the per-task timeout
    TimedOut,
    /// Administrative cancellation
    Aborted,
}

impl TaskState {
    /// Whether no further transitions are possible
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            TaskState::Completed | TaskState::Failed | TaskState::TimedOut | TaskState::Aborted
        )
    }

    /// Whether this state counts toward quorum
    #[must_use]
    pub fn is_success(self) -> bool {
        self == TaskState::Completed
    }

    /// Whether the transition to `next` is legal
    #[must_use]
    pub fn can_transition_to(self, next: TaskState) -> bool {
        if self.is_terminal() {
            return false;
        }
        match next {
            TaskState::Aborted => true,
            TaskState::Queued => self == TaskState::Pending,
            TaskState::InProgress => self == TaskState::Queued,
            TaskState::Completed | TaskState::Failed | TaskState::TimedOut => {
                self == TaskState::InProgress
            }
            TaskState::Pending => false,
        }
    }
}

impl fmt::Display for TaskState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TaskState::Pending => "PENDING",
            TaskState::Queued => "QUEUED",
            TaskState::InProgress => "IN_PROGRESS",
            TaskState::Completed => "COMPLETED",
            TaskState::Failed => "FAILED",
            TaskState::TimedOut => "TIMEDOUT",
            TaskState::Aborted => "ABORTED",
        };
        write!(f, "{name}")
    }
}
