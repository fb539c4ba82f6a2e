//! Runtime settings derived from [`UrverkConfig`].

use std::sync::Arc;

use tracing::info;
use urverk_config::{StorageBackend, StorageConfig, UrverkConfig};
use urverk_core::clock::{ClockSettings, ClockThresholds};
use urverk_core::storage::{MemoryStore, SharedStore};
use urverk_core::timer::DEFAULT_MAX_EXEC_PER_TICK;
use urverk_storage::{FileStore, TIMERS_KEY};

use crate::error::EngineError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuntimeSettings {
    pub clock: ClockSettings,
    pub max_exec_per_tick: usize,
    pub timers_key: String,
}

impl Default for RuntimeSettings {
    fn default() -> Self {
        Self {
            clock: ClockSettings::default(),
            max_exec_per_tick: DEFAULT_MAX_EXEC_PER_TICK,
            timers_key: TIMERS_KEY.to_string(),
        }
    }
}

impl From<&UrverkConfig> for RuntimeSettings {
    fn from(config: &UrverkConfig) -> Self {
        Self {
            clock: ClockSettings {
                thresholds: ClockThresholds {
                    resume_skew_ms: config.clock.resume_skew_threshold_ms,
                    sync_skew_ms: config.clock.sync_skew_threshold_ms,
                },
                snapshot_key: config.clock.snapshot_key.clone(),
            },
            max_exec_per_tick: config.scheduler.max_exec_per_tick,
            timers_key: config.storage.timers_key.clone(),
        }
    }
}

/// Opens the configured key-value backend.
pub fn open_store(config: &StorageConfig) -> Result<SharedStore, EngineError> {
    let store: SharedStore = match config.backend {
        StorageBackend::File => {
            info!(directory = %config.directory.display(), "Using file storage");
            Arc::new(FileStore::open(&config.directory)?)
        }
        StorageBackend::Memory => {
            info!("Using in-memory storage, state will not survive restarts");
            Arc::new(MemoryStore::new())
        }
    };
    Ok(store)
}

#[cfg(test)]
mod tests {
    use super::*;
    use urverk_core::storage::KeyValueStore;

    #[test]
    fn test_settings_follow_config() {
        let mut config = UrverkConfig::default();
        config.scheduler.max_exec_per_tick = 7;
        config.clock.sync_skew_threshold_ms = 1_000;
        let settings = RuntimeSettings::from(&config);
        assert_eq!(settings.max_exec_per_tick, 7);
        assert_eq!(settings.clock.thresholds.sync_skew_ms, 1_000);
        assert_eq!(settings.clock.snapshot_key, "timing.gameclock.snapshot.v1");
        assert_eq!(settings.timers_key, TIMERS_KEY);
    }

    #[test]
    fn test_open_file_store_creates_directory() {
        let dir = tempfile::tempdir().unwrap();
        let config = StorageConfig {
            directory: dir.path().join("nested/state"),
            ..StorageConfig::default()
        };
        let store = open_store(&config).unwrap();
        store.save("k", "v").unwrap();
        assert!(dir.path().join("nested/state/k.json").exists());
    }
}
