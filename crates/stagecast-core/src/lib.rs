//! stagecast-core: Action dispatch and stage execution engine
//!
//! Implements the `DispatcherActor` and `StageActor` using the kameo
//! framework. Contains request validation, host selection policy, command
//! building, and the per-stage quorum state machine.

pub mod actor;
pub mod build;
pub mod config;
pub mod error;
pub mod message;
pub mod select;
pub mod stage;
pub mod validate;

pub use actor::dispatcher::{DispatcherActor, DispatcherArgs};
pub use actor::stage::{StageActor, StageActorArgs};
pub use build::{ACTION_UPDATE_REPO, ActionKind, CommandBuilder, SUCCESS_FACTOR_PARAMETER};
pub use config::DispatchConfig;
pub use error::{BuildError, DispatchError, SelectionError, ValidationError};
pub use message::{
    Abort, AbortStage, GetStage, GetStatus, ListStages, ReportTask, ReportTaskState, RoleStatus,
    StageStatus, SubmitAction, TaskStatus,
};
pub use select::{resolve_candidates, select_targets};
pub use stage::{RoleProgress, Stage, StageOutcome, TaskRecord, TransitionApplied};
pub use validate::{ValidatedAction, validate};
