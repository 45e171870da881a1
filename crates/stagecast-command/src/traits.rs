//! Transport-facing sink trait

use std::sync::Mutex;

use async_trait::async_trait;

use crate::envelope::CommandEnvelope;
use crate::error::DeliveryError;

/// Accepts a fully built stage for remote execution.
///
/// The engine prepares work and consumes completion notifications; actual
/// transport and execution are external and asynchronous.
#[async_trait]
pub trait CommandSink: Send + Sync {
    /// Hand the stage's envelopes to the transport.
    ///
    /// # Errors
    /// Returns a [`DeliveryError`] when the transport cannot accept the
    /// stage; the dispatcher surfaces this to the caller.
    async fn deliver(&self, stage: u64, envelopes: &[CommandEnvelope]) -> Result<(), DeliveryError>;
}

/// Records deliveries without transporting anything. For tests and dry runs.
#[derive(Debug, Default)]
pub struct NullSink {
    delivered: Mutex<Vec<(u64, Vec<CommandEnvelope>)>>,
}

impl NullSink {
    /// Create an empty sink
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Stages delivered so far
    #[must_use]
    pub fn deliveries(&self) -> Vec<(u64, Vec<CommandEnvelope>)> {
        self.delivered.lock().map(|d| d.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl CommandSink for NullSink {
    async fn deliver(&self, stage: u64, envelopes: &[CommandEnvelope]) -> Result<(), DeliveryError> {
        if let Ok(mut delivered) = self.delivered.lock() {
            delivered.push((stage, envelopes.to_vec()));
        }
        Ok(())
    }
}
