//! Simulator configuration.

use serde::{Deserialize, Serialize};
use validator::{self, Validate};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
pub struct SimulatorConfig {
    /// Seed for frame-time jitter.
    #[serde(default = "default_seed")]
    pub seed: u64,

    /// Nominal frame duration.
    #[serde(default = "default_frame_ms")]
    #[validate(range(min = 1, max = 1000))]
    pub frame_ms: u64,

    /// Maximum deviation from `frame_ms` per frame.
    #[serde(default)]
    #[validate(range(max = 100))]
    pub jitter_ms: u64,
}

fn default_seed() -> u64 {
    42
}

fn default_frame_ms() -> u64 {
    16
}

impl Default for SimulatorConfig {
    fn default() -> Self {
        Self {
            seed: default_seed(),
            frame_ms: default_frame_ms(),
            jitter_ms: 0,
        }
    }
}
