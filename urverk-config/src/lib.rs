//! # urverk Configuration
//!
//! Hierarchical configuration for the timing runtime.
//!
//! ## Features
//! - **Layered sources**: defaults, YAML files, then `URVERK_*` environment
//! - **Validation**: every section is checked with `validator` after extraction

#![warn(unsafe_code)]
#![deny(rustdoc::broken_intra_doc_links)]

use std::path::{Path, PathBuf};

use figment::{
    providers::{Env, Format, Serialized, Yaml},
    Figment,
};
use serde::{Deserialize, Serialize};
use validator::Validate;

mod clock;
mod error;
mod scheduler;
mod simulator;
mod storage;
mod telemetry;
mod validation;

pub use clock::ClockConfig;
pub use error::ConfigError;
pub use scheduler::SchedulerConfig;
pub use simulator::SimulatorConfig;
pub use storage::{StorageBackend, StorageConfig};
pub use telemetry::TelemetryConfig;

const ENV_PREFIX: &str = "URVERK_";

/// Top‑level configuration container.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate, Default)]
pub struct UrverkConfig {
    /// Execution budget.
    #[serde(default)]
    #[validate(nested)]
    pub scheduler: SchedulerConfig,

    /// Trusted clock thresholds and snapshot key.
    #[serde(default)]
    #[validate(nested)]
    pub clock: ClockConfig,

    /// Where the clock snapshot and timer state live.
    #[serde(default)]
    #[validate(nested)]
    pub storage: StorageConfig,

    #[serde(default)]
    #[validate(nested)]
    pub telemetry: TelemetryConfig,

    /// Frame timing for `simulate`.
    #[serde(default)]
    #[validate(nested)]
    pub simulator: SimulatorConfig,
}

impl UrverkConfig {
    /// Load configuration from default files and environment.
    ///
    /// Hierarchy:
    /// 1. Default Values
    /// 2. `config/urverk.yaml`, if present
    /// 3. `config/<URVERK_ENV>.yaml` (default `production`), if present
    /// 4. `URVERK_*` environment variables, `__` separating nested keys
    pub fn load() -> Result<Self, ConfigError> {
        let mut figment = Figment::from(Serialized::defaults(UrverkConfig::default()));

        if Path::new("config/urverk.yaml").exists() {
            figment = figment.merge(Yaml::file("config/urverk.yaml"));
        }

        let env = std::env::var("URVERK_ENV").unwrap_or_else(|_| "production".into());
        let env_file = format!("config/{}.yaml", env);
        if Path::new(&env_file).exists() {
            figment = figment.merge(Yaml::file(env_file));
        }

        Self::extract(figment)
    }

    /// Load configuration from a specific file (over defaults) plus environment.
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(ConfigError::FileNotFound(PathBuf::from(path)));
        }

        Self::extract(
            Figment::from(Serialized::defaults(UrverkConfig::default())).merge(Yaml::file(path)),
        )
    }

    fn extract(figment: Figment) -> Result<Self, ConfigError> {
        figment
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .extract()
            .map_err(ConfigError::from)
            .and_then(|config: Self| {
                config.validate()?;
                Ok(config)
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_validate() {
        let config = UrverkConfig::default();
        config.validate().expect("Default config should validate");
        assert_eq!(config.scheduler.max_exec_per_tick, 50);
        assert_eq!(config.clock.resume_skew_threshold_ms, 300_000);
        assert_eq!(config.clock.sync_skew_threshold_ms, 600_000);
        assert_eq!(config.storage.backend, StorageBackend::File);
        assert_eq!(config.storage.timers_key, "timing.timers.state.v1");
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("urverk.yaml");
        std::fs::write(
            &path,
            "scheduler:\n  max_exec_per_tick: 8\nstorage:\n  backend: memory\n",
        )
        .unwrap();

        let config = UrverkConfig::load_from_path(&path).unwrap();
        assert_eq!(config.scheduler.max_exec_per_tick, 8);
        assert_eq!(config.storage.backend, StorageBackend::Memory);
        assert_eq!(config.storage.directory, PathBuf::from("state"));
        assert_eq!(config.telemetry.log_level, "info");
    }

    #[test]
    fn test_missing_file() {
        let err = UrverkConfig::load_from_path("does/not/exist.yaml").unwrap_err();
        assert!(matches!(err, ConfigError::FileNotFound(_)));
    }

    #[test]
    fn test_invalid_values_are_listed() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.yaml");
        std::fs::write(
            &path,
            "scheduler:\n  max_exec_per_tick: 0\nstorage:\n  timers_key: \"../escape\"\n",
        )
        .unwrap();

        let err = UrverkConfig::load_from_path(&path).unwrap_err();
        let message = err.to_string();
        assert!(matches!(err, ConfigError::Validation(_)));
        assert!(message.contains("max_exec_per_tick"), "{message}");
        assert!(message.contains("timers_key"), "{message}");
    }

    #[test]
    fn test_environment_override() {
        std::env::set_var("URVERK_SIMULATOR__SEED", "9001");
        let config = UrverkConfig::load().unwrap();
        std::env::remove_var("URVERK_SIMULATOR__SEED");
        assert_eq!(config.simulator.seed, 9001);
    }
}
