//! Configuration for the dispatch engine

use serde::{Deserialize, Serialize};

/// Process-wide dispatch defaults, threaded explicitly into the dispatcher
/// at construction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DispatchConfig {
    /// Floor for every task's command timeout, in seconds. A request
    /// timeout only takes effect when it exceeds this value.
    #[serde(default = "default_agent_timeout_secs")]
    pub default_agent_timeout_secs: u64,
    /// Stage event broadcast channel capacity
    #[serde(default = "default_event_channel_capacity")]
    pub event_channel_capacity: usize,
}

fn default_agent_timeout_secs() -> u64 {
    900
}

fn default_event_channel_capacity() -> usize {
    1024
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            default_agent_timeout_secs: default_agent_timeout_secs(),
            event_channel_capacity: default_event_channel_capacity(),
        }
    }
}
