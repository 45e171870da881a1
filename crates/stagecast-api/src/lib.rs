//! stagecast-api: Shared API types and schemas
//!
//! Contains the action request model and stage event types shared between
//! the dispatch engine and its embedders.

pub mod events;
pub mod requests;

pub use events::StageEvent;
pub use requests::{ActionRequest, ResourceFilter, TargetHostType};
