//! Stage lifecycle event types

use serde::{Deserialize, Serialize};

/// Events broadcast by the dispatch engine as task outcomes arrive.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum StageEvent {
    TaskStateChanged {
        stage: u64,
        host: String,
        role: String,
        from: String,
        to: String,
    },
    RoleSatisfied {
        stage: u64,
        role: String,
    },
    StageFinished {
        stage: u64,
        outcome: String,
    },
    StageAborted {
        stage: u64,
    },
}
