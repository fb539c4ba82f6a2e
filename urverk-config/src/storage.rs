//! Persistence backend configuration.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use validator::{self, Validate};

use crate::validation;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    /// One JSON file per key under `directory`.
    #[default]
    File,
    /// Process-local; state is lost on exit.
    Memory,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
pub struct StorageConfig {
    #[serde(default)]
    pub backend: StorageBackend,

    #[serde(default = "default_directory")]
    pub directory: PathBuf,

    /// Storage key of the timer-state record.
    #[serde(default = "default_timers_key")]
    #[validate(custom(function = validation::validate_storage_key))]
    pub timers_key: String,
}

fn default_directory() -> PathBuf {
    PathBuf::from("state")
}

fn default_timers_key() -> String {
    "timing.timers.state.v1".into()
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::default(),
            directory: default_directory(),
            timers_key: default_timers_key(),
        }
    }
}
