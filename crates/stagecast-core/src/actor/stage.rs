//! `StageActor`: Per-stage task state tracking
//!
//! Owns one `Stage` for its lifetime. The actor mailbox serializes task
//! state notifications (one logical writer per stage) while asks return the
//! current aggregate; every observable change is broadcast as a
//! [`StageEvent`].

use kameo::actor::{ActorRef, WeakActorRef};
use kameo::error::ActorStopReason;
use kameo::message::{Context, Message};
use kameo::prelude::*;
use tokio::sync::broadcast;
use tracing::{info, warn};

use stagecast_api::StageEvent;
use stagecast_command::state::TaskState;

use crate::error::DispatchError;
use crate::message::{Abort, GetStatus, ReportTaskState, StageStatus};
use crate::stage::Stage;

/// Arguments for spawning a `StageActor`
pub struct StageActorArgs {
    /// The stage to own
    pub stage: Stage,
    /// Event broadcast sender
    pub event_tx: broadcast::Sender<StageEvent>,
}

/// Per-stage actor folding task outcomes into the quorum aggregate
pub struct StageActor {
    stage: Stage,
    event_tx: broadcast::Sender<StageEvent>,
}

impl StageActor {
    /// Stage identifier
    #[must_use]
    pub fn stage_id(&self) -> u64 {
        self.stage.id()
    }

    fn emit(&self, event: StageEvent) {
        // No subscribers is fine
        let _ = self.event_tx.send(event);
    }
}

impl Actor for StageActor {
    type Args = StageActorArgs;
    type Error = DispatchError;

    async fn on_start(args: Self::Args, actor_ref: ActorRef<Self>) -> Result<Self, Self::Error> {
        info!(
            stage = args.stage.id(),
            action = %args.stage.action(),
            tasks = args.stage.tasks().len(),
            id = %actor_ref.id(),
            "StageActor starting"
        );

        Ok(Self {
            stage: args.stage,
            event_tx: args.event_tx,
        })
    }

    async fn on_stop(
        &mut self,
        _actor_ref: WeakActorRef<Self>,
        reason: ActorStopReason,
    ) -> Result<(), Self::Error> {
        info!(
            stage = self.stage.id(),
            outcome = %self.stage.outcome(),
            reason = ?reason,
            "StageActor stopping"
        );
        Ok(())
    }
}

// ============================================================================
// Message Handlers
// ============================================================================

impl Message<ReportTaskState> for StageActor {
    type Reply = Result<(), DispatchError>;

    async fn handle(
        &mut self,
        msg: ReportTaskState,
        _ctx: &mut Context<Self, Self::Reply>,
    ) -> Self::Reply {
        let applied = self.stage.apply_transition(&msg.host, &msg.role, msg.state)?;

        info!(
            stage = self.stage.id(),
            host = %msg.host,
            role = %msg.role,
            from = %applied.from,
            to = %applied.to,
            "task state transition"
        );

        self.emit(StageEvent::TaskStateChanged {
            stage: self.stage.id(),
            host: msg.host,
            role: msg.role.clone(),
            from: applied.from.to_string(),
            to: applied.to.to_string(),
        });

        if applied.role_newly_satisfied {
            self.emit(StageEvent::RoleSatisfied {
                stage: self.stage.id(),
                role: msg.role,
            });
        }

        if applied.newly_finished {
            info!(
                stage = self.stage.id(),
                outcome = %applied.outcome,
                "stage finished"
            );
            self.emit(StageEvent::StageFinished {
                stage: self.stage.id(),
                outcome: applied.outcome.to_string(),
            });
        }

        Ok(())
    }
}

impl Message<Abort> for StageActor {
    type Reply = Result<(), DispatchError>;

    async fn handle(&mut self, _msg: Abort, _ctx: &mut Context<Self, Self::Reply>) -> Self::Reply {
        let was_terminal = self.stage.outcome().is_terminal();
        let aborted = self.stage.abort();

        if aborted.is_empty() && was_terminal {
            // Aborting a finished stage is a no-op
            return Ok(());
        }

        warn!(
            stage = self.stage.id(),
            aborted = aborted.len(),
            outcome = %self.stage.outcome(),
            "stage aborted"
        );

        for (host, role, from) in aborted {
            self.emit(StageEvent::TaskStateChanged {
                stage: self.stage.id(),
                host,
                role,
                from: from.to_string(),
                to: TaskState::Aborted.to_string(),
            });
        }

        self.emit(StageEvent::StageAborted {
            stage: self.stage.id(),
        });
        if !was_terminal {
            self.emit(StageEvent::StageFinished {
                stage: self.stage.id(),
                outcome: self.stage.outcome().to_string(),
            });
        }

        Ok(())
    }
}

impl Message<GetStatus> for StageActor {
    type Reply = StageStatus;

    async fn handle(
        &mut self,
        _msg: GetStatus,
        _ctx: &mut Context<Self, Self::Reply>,
    ) -> Self::Reply {
        StageStatus::of(&self.stage)
    }
}
