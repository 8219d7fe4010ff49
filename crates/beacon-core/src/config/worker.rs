//! Housekeeping job configuration.

use serde::{Deserialize, Serialize};

/// Settings for the periodic liveness jobs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerConfig {
    /// Whether the housekeeping jobs run.
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Seconds between ping-inactive ticks.
    #[serde(default = "default_tick")]
    pub ping_tick_seconds: u64,
    /// Seconds between prune-stale ticks.
    #[serde(default = "default_tick")]
    pub prune_tick_seconds: u64,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            ping_tick_seconds: default_tick(),
            prune_tick_seconds: default_tick(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_tick() -> u64 {
    10
}
