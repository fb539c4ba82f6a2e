//! Trusted clock configuration.
//!
//! Skew thresholds decide when a device/trusted disagreement counts as a
//! tamper signal.

use serde::{Deserialize, Serialize};
use validator::{self, Validate};

use crate::validation;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
pub struct ClockConfig {
    /// Max |device - trusted| when the application resumes (ms).
    #[serde(default = "default_resume_skew")]
    #[validate(range(min = 1))]
    pub resume_skew_threshold_ms: i64,

    /// Max |device - trusted| at sync time (ms).
    #[serde(default = "default_sync_skew")]
    #[validate(range(min = 1))]
    pub sync_skew_threshold_ms: i64,

    /// Storage key of the persisted snapshot.
    #[serde(default = "default_snapshot_key")]
    #[validate(custom(function = validation::validate_storage_key))]
    pub snapshot_key: String,
}

fn default_resume_skew() -> i64 {
    5 * 60 * 1_000
}

fn default_sync_skew() -> i64 {
    10 * 60 * 1_000
}

fn default_snapshot_key() -> String {
    "timing.gameclock.snapshot.v1".into()
}

impl Default for ClockConfig {
    fn default() -> Self {
        Self {
            resume_skew_threshold_ms: default_resume_skew(),
            sync_skew_threshold_ms: default_sync_skew(),
            snapshot_key: default_snapshot_key(),
        }
    }
}
