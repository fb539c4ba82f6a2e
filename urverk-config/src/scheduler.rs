//! Scheduler configuration.

use serde::{Deserialize, Serialize};
use validator::{self, Validate};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
pub struct SchedulerConfig {
    /// Upper bound on timers fired per domain per tick.
    #[serde(default = "default_max_exec_per_tick")]
    #[validate(range(min = 1, max = 100000))]
    pub max_exec_per_tick: usize,
}

fn default_max_exec_per_tick() -> usize {
    50
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            max_exec_per_tick: default_max_exec_per_tick(),
        }
    }
}
