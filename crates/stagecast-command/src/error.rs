//! Error types for stagecast-command

use thiserror::Error;

/// Errors surfaced by transport sinks when accepting a stage
#[derive(Error, Debug, Clone)]
pub enum DeliveryError {
    /// Transport could not accept the stage
    #[error("transport error: {0}")]
    Transport(String),

    /// Transport rejected a specific host's envelope
    #[error("delivery rejected for host {host}: {reason}")]
    Rejected {
        /// Host whose envelope was rejected
        host: String,
        /// Transport-provided reason
        reason: String,
    },
}
