//! Actor implementations

pub mod dispatcher;
pub mod stage;

pub use dispatcher::{DispatcherActor, DispatcherArgs};
pub use stage::{StageActor, StageActorArgs};
