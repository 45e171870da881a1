//! stagecast-command: Per-host command envelopes
//!
//! Defines the self-contained execution envelope shipped to remote agents,
//! the task state machine tracked per envelope, and the sink trait through
//! which finished stages are handed to the external transport.

pub mod envelope;
pub mod error;
pub mod keys;
pub mod state;
pub mod traits;

pub use envelope::{CommandEnvelope, CommandEnvelopeBuilder, RoleCommand};
pub use error::DeliveryError;
pub use state::TaskState;
pub use traits::{CommandSink, NullSink};
