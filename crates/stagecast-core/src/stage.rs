//! Stage aggregate and quorum evaluation
//!
//! A stage owns every per-host task for one action dispatch and folds task
//! state transitions into a per-role quorum. Evaluation is incremental: each
//! transition updates one role's counters and the aggregate outcome, so
//! success and unreachable-failure are declared as soon as they are
//! mathematically decided, not when the last task reports.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};

use stagecast_command::envelope::CommandEnvelope;
use stagecast_command::state::TaskState;

use crate::error::DispatchError;

/// Aggregate outcome of a stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageOutcome {
    InProgress,
    /// Every role with tasks reached its quorum
    Succeeded,
    /// Some role can no longer reach its quorum
    Failed,
    /// Administratively cancelled before a decision
    Aborted,
}

impl StageOutcome {
    /// Whether the outcome can still change
    #[must_use]
    pub fn is_terminal(self) -> bool {
        self != StageOutcome::InProgress
    }
}

impl fmt::Display for StageOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            StageOutcome::InProgress => "IN_PROGRESS",
            StageOutcome::Succeeded => "SUCCEEDED",
            StageOutcome::Failed => "FAILED",
            StageOutcome::Aborted => "ABORTED",
        };
        write!(f, "{name}")
    }
}

/// One envelope plus its tracked execution state.
#[derive(Debug, Clone)]
pub struct TaskRecord {
    pub envelope: CommandEnvelope,
    pub state: TaskState,
}

/// Incremental quorum fold for one role.
///
/// `required` is fixed at stage creation: `max(1, ceil(factor * total))`,
/// with factor defaulting to 1.0 when the stage carries no explicit success
/// factor for the role. The threshold is inclusive: `completed >= required`
/// satisfies the role.
#[derive(Debug, Clone)]
pub struct RoleProgress {
    pub success_factor: f32,
    pub total: usize,
    pub completed: usize,
    /// Terminal non-success outcomes (failed, timed out, aborted)
    pub failed: usize,
    pub required: usize,
}

impl RoleProgress {
    fn new(total: usize, success_factor: Option<f32>) -> Self {
        let factor = success_factor.unwrap_or(1.0);
        // f64 and a small epsilon keep exact thresholds (0.5 * 4 = 2) from
        // rounding up through float noise
        let required = ((f64::from(factor) * total as f64) - 1e-9).ceil().max(0.0) as usize;
        Self {
            success_factor: factor,
            total,
            completed: 0,
            failed: 0,
            required: required.max(1),
        }
    }

    /// Tasks not yet in a terminal state
    #[must_use]
    pub fn remaining(&self) -> usize {
        self.total - self.completed - self.failed
    }

    /// Quorum reached
    #[must_use]
    pub fn satisfied(&self) -> bool {
        self.completed >= self.required
    }

    /// Quorum can no longer be reached even if every remaining task completes
    #[must_use]
    pub fn unsatisfiable(&self) -> bool {
        self.completed + self.remaining() < self.required
    }
}

/// Result of applying one task transition to a stage.
#[derive(Debug, Clone)]
pub struct TransitionApplied {
    pub from: TaskState,
    pub to: TaskState,
    /// The task's role reached its quorum on this exact transition
    pub role_newly_satisfied: bool,
    /// Aggregate outcome after the transition
    pub outcome: StageOutcome,
    /// The outcome became terminal on this exact transition
    pub newly_finished: bool,
}

/// The unit of dispatch: all per-host tasks for one action invocation plus
/// per-role quorum thresholds.
///
/// Owned exclusively by its stage actor once dispatched; all mutation goes
/// through [`Stage::apply_transition`] and [`Stage::abort`].
#[derive(Debug, Clone)]
pub struct Stage {
    id: u64,
    action: String,
    tasks: Vec<TaskRecord>,
    roles: BTreeMap<String, RoleProgress>,
    outcome: StageOutcome,
    created_at: DateTime<Utc>,
}

impl Stage {
    /// Create a stage from built envelopes and per-role success factors.
    ///
    /// Roles present in `success_factors` but without tasks are dropped;
    /// roles with tasks but no factor default to 1.0.
    #[must_use]
    pub fn new(
        id: u64,
        action: impl Into<String>,
        success_factors: &BTreeMap<String, f32>,
        envelopes: Vec<CommandEnvelope>,
    ) -> Self {
        let mut totals: BTreeMap<String, usize> = BTreeMap::new();
        for envelope in &envelopes {
            *totals.entry(envelope.role.clone()).or_default() += 1;
        }

        let roles = totals
            .into_iter()
            .map(|(role, total)| {
                let progress = RoleProgress::new(total, success_factors.get(&role).copied());
                (role, progress)
            })
            .collect();

        Self {
            id,
            action: action.into(),
            tasks: envelopes
                .into_iter()
                .map(|envelope| TaskRecord {
                    envelope,
                    state: TaskState::Pending,
                })
                .collect(),
            roles,
            outcome: StageOutcome::InProgress,
            created_at: Utc::now(),
        }
    }

    #[must_use]
    pub fn id(&self) -> u64 {
        self.id
    }

    #[must_use]
    pub fn action(&self) -> &str {
        &self.action
    }

    #[must_use]
    pub fn outcome(&self) -> StageOutcome {
        self.outcome
    }

    #[must_use]
    pub fn tasks(&self) -> &[TaskRecord] {
        &self.tasks
    }

    #[must_use]
    pub fn roles(&self) -> &BTreeMap<String, RoleProgress> {
        &self.roles
    }

    #[must_use]
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Apply one task state transition and fold it into the quorum.
    ///
    /// When duplicate tasks exist for the same host and role, the first one
    /// for which the transition is legal is updated. A terminal aggregate
    /// outcome is latched: straggler transitions are still recorded per
    /// task, but the outcome never regresses.
    ///
    /// # Errors
    /// `TaskNotFound` when no task matches host and role;
    /// `InvalidTaskTransition` when the reported state is unreachable from
    /// the task's current state.
    pub fn apply_transition(
        &mut self,
        host: &str,
        role: &str,
        next: TaskState,
    ) -> Result<TransitionApplied, DispatchError> {
        let mut first_match: Option<usize> = None;
        let mut chosen: Option<usize> = None;
        for (index, task) in self.tasks.iter().enumerate() {
            if task.envelope.host == host && task.envelope.role == role {
                if first_match.is_none() {
                    first_match = Some(index);
                }
                if task.state.can_transition_to(next) {
                    chosen = Some(index);
                    break;
                }
            }
        }

        let Some(first) = first_match else {
            return Err(DispatchError::TaskNotFound {
                host: host.to_string(),
                role: role.to_string(),
            });
        };
        let Some(index) = chosen else {
            return Err(DispatchError::InvalidTaskTransition {
                from: self.tasks[first].state,
                to: next,
            });
        };

        let from = self.tasks[index].state;
        self.tasks[index].state = next;

        let progress = self
            .roles
            .get_mut(role)
            .ok_or_else(|| DispatchError::TaskNotFound {
                host: host.to_string(),
                role: role.to_string(),
            })?;
        let was_satisfied = progress.satisfied();
        if next == TaskState::Completed {
            progress.completed += 1;
        } else if next.is_terminal() {
            progress.failed += 1;
        }
        let role_newly_satisfied = !was_satisfied && progress.satisfied();

        let was_terminal = self.outcome.is_terminal();
        if !was_terminal {
            self.outcome = self.evaluate();
        }

        Ok(TransitionApplied {
            from,
            to: next,
            role_newly_satisfied,
            outcome: self.outcome,
            newly_finished: !was_terminal && self.outcome.is_terminal(),
        })
    }

    fn evaluate(&self) -> StageOutcome {
        if self.roles.values().any(RoleProgress::unsatisfiable) {
            StageOutcome::Failed
        } else if self.roles.values().all(RoleProgress::satisfied) {
            StageOutcome::Succeeded
        } else {
            StageOutcome::InProgress
        }
    }

    /// Transition every non-terminal task to aborted. Idempotent: already
    /// terminal tasks are untouched and a decided outcome is kept.
    ///
    /// Returns `(host, role, previous state)` for each task actually aborted.
    pub fn abort(&mut self) -> Vec<(String, String, TaskState)> {
        let mut aborted = Vec::new();
        for task in &mut self.tasks {
            if !task.state.is_terminal() {
                aborted.push((
                    task.envelope.host.clone(),
                    task.envelope.role.clone(),
                    task.state,
                ));
                task.state = TaskState::Aborted;
                if let Some(progress) = self.roles.get_mut(&task.envelope.role) {
                    progress.failed += 1;
                }
            }
        }

        if !self.outcome.is_terminal() {
            self.outcome = StageOutcome::Aborted;
        }
        aborted
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn envelope(host: &str, role: &str) -> CommandEnvelope {
        CommandEnvelope::builder(host, role).finish()
    }

    fn stage(factor: Option<f32>, hosts: &[&str]) -> Stage {
        let envelopes = hosts.iter().map(|h| envelope(h, "update_repo")).collect();
        let mut factors = BTreeMap::new();
        if let Some(f) = factor {
            factors.insert("update_repo".to_string(), f);
        }
        Stage::new(1, "update_repo", &factors, envelopes)
    }

    fn drive_to(stage: &mut Stage, host: &str, terminal: TaskState) {
        stage
            .apply_transition(host, "update_repo", TaskState::Queued)
            .unwrap();
        stage
            .apply_transition(host, "update_repo", TaskState::InProgress)
            .unwrap();
        stage
            .apply_transition(host, "update_repo", terminal)
            .unwrap();
    }

    #[test]
    fn test_required_counts() {
        assert_eq!(stage(Some(0.5), &["h1", "h2", "h3", "h4"]).roles()["update_repo"].required, 2);
        assert_eq!(stage(Some(0.5), &["h1", "h2", "h3", "h4", "h5"]).roles()["update_repo"].required, 3);
        assert_eq!(stage(Some(0.0), &["h1", "h2"]).roles()["update_repo"].required, 1);
        assert_eq!(stage(None, &["h1", "h2"]).roles()["update_repo"].required, 2);
        assert_eq!(stage(Some(1.0), &["h1", "h2", "h3"]).roles()["update_repo"].required, 3);
    }

    #[test]
    fn test_quorum_satisfied_at_exact_threshold() {
        // factor 0.5 of 4 tasks: satisfied at exactly 2 completions, with two
        // tasks still outstanding
        let mut stage = stage(Some(0.5), &["h1", "h2", "h3", "h4"]);

        drive_to(&mut stage, "h1", TaskState::Completed);
        assert_eq!(stage.outcome(), StageOutcome::InProgress);

        drive_to(&mut stage, "h2", TaskState::Completed);
        assert_eq!(stage.outcome(), StageOutcome::Succeeded);
        assert_eq!(stage.roles()["update_repo"].remaining(), 2);
    }

    #[test]
    fn test_quorum_fails_early_when_unreachable() {
        // factor 0.5 of 4: two failures leave max 2/4 = 0.5 reachable, which
        // still satisfies; the third failure makes the quorum unreachable
        let mut stage = stage(Some(0.5), &["h1", "h2", "h3", "h4"]);

        drive_to(&mut stage, "h1", TaskState::Failed);
        drive_to(&mut stage, "h2", TaskState::TimedOut);
        assert_eq!(stage.outcome(), StageOutcome::InProgress);

        drive_to(&mut stage, "h3", TaskState::Failed);
        assert_eq!(stage.outcome(), StageOutcome::Failed);
    }

    #[test]
    fn test_default_factor_requires_every_task() {
        let mut stage = stage(None, &["h1", "h2"]);

        drive_to(&mut stage, "h1", TaskState::Completed);
        assert_eq!(stage.outcome(), StageOutcome::InProgress);

        drive_to(&mut stage, "h2", TaskState::Completed);
        assert_eq!(stage.outcome(), StageOutcome::Succeeded);
    }

    #[test]
    fn test_default_factor_fails_on_first_failure() {
        let mut stage = stage(None, &["h1", "h2"]);
        drive_to(&mut stage, "h1", TaskState::Failed);
        assert_eq!(stage.outcome(), StageOutcome::Failed);
    }

    #[test]
    fn test_zero_factor_still_needs_one_success() {
        let mut stage = stage(Some(0.0), &["h1", "h2"]);

        drive_to(&mut stage, "h1", TaskState::Failed);
        assert_eq!(stage.outcome(), StageOutcome::InProgress);

        drive_to(&mut stage, "h2", TaskState::Completed);
        assert_eq!(stage.outcome(), StageOutcome::Succeeded);
    }

    #[test]
    fn test_outcome_latched_for_stragglers() {
        let mut stage = stage(Some(0.5), &["h1", "h2", "h3", "h4"]);
        drive_to(&mut stage, "h1", TaskState::Completed);
        drive_to(&mut stage, "h2", TaskState::Completed);
        assert_eq!(stage.outcome(), StageOutcome::Succeeded);

        // late failures are recorded but never regress the outcome
        drive_to(&mut stage, "h3", TaskState::Failed);
        drive_to(&mut stage, "h4", TaskState::TimedOut);
        assert_eq!(stage.outcome(), StageOutcome::Succeeded);
    }

    #[test]
    fn test_invalid_transition_rejected() {
        let mut stage = stage(None, &["h1"]);
        let err = stage
            .apply_transition("h1", "update_repo", TaskState::Completed)
            .unwrap_err();
        assert!(matches!(
            err,
            DispatchError::InvalidTaskTransition {
                from: TaskState::Pending,
                to: TaskState::Completed,
            }
        ));
    }

    #[test]
    fn test_unknown_task_rejected() {
        let mut stage = stage(None, &["h1"]);
        let err = stage
            .apply_transition("h9", "update_repo", TaskState::Queued)
            .unwrap_err();
        assert!(matches!(err, DispatchError::TaskNotFound { host, .. } if host == "h9"));
    }

    #[test]
    fn test_abort_is_idempotent() {
        let mut stage = stage(Some(0.5), &["h1", "h2", "h3", "h4"]);
        drive_to(&mut stage, "h1", TaskState::Completed);

        let aborted = stage.abort();
        assert_eq!(aborted.len(), 3);
        assert_eq!(stage.outcome(), StageOutcome::Aborted);
        assert!(stage.tasks().iter().all(|t| t.state.is_terminal()));

        // second abort finds nothing to do
        assert!(stage.abort().is_empty());
        assert_eq!(stage.outcome(), StageOutcome::Aborted);
    }

    #[test]
    fn test_abort_keeps_decided_outcome() {
        let mut stage = stage(Some(0.0), &["h1", "h2"]);
        drive_to(&mut stage, "h1", TaskState::Completed);
        assert_eq!(stage.outcome(), StageOutcome::Succeeded);

        let aborted = stage.abort();
        assert_eq!(aborted.len(), 1);
        assert_eq!(stage.outcome(), StageOutcome::Succeeded);
    }

    #[test]
    fn test_multi_role_stage_needs_every_role() {
        let envelopes = vec![
            envelope("h1", "update_repo"),
            envelope("h2", "update_repo"),
            envelope("h1", "restart_agent"),
        ];
        let factors = BTreeMap::from([("update_repo".to_string(), 0.5)]);
        let mut stage = Stage::new(7, "update_repo", &factors, envelopes);

        let step = |stage: &mut Stage, host: &str, role: &str, state| {
            stage.apply_transition(host, role, state).unwrap()
        };
        for state in [TaskState::Queued, TaskState::InProgress, TaskState::Completed] {
            step(&mut stage, "h1", "update_repo", state);
        }
        // update_repo satisfied (1 of 2 >= 0.5); restart_agent still pending
        assert_eq!(stage.outcome(), StageOutcome::InProgress);

        for state in [TaskState::Queued, TaskState::InProgress, TaskState::Completed] {
            step(&mut stage, "h1", "restart_agent", state);
        }
        assert_eq!(stage.outcome(), StageOutcome::Succeeded);
    }
}
