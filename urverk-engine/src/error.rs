use thiserror::Error;
use urverk_config::ConfigError;
use urverk_core::{StorageError, TimerError};
use urverk_simulator::ScenarioError;
use urverk_storage::PersistenceError;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Persistence error: {0}")]
    Persistence(#[from] PersistenceError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Timer error: {0}")]
    Timer(#[from] TimerError),

    #[error("Scenario error: {0}")]
    Scenario(#[from] ScenarioError),

    #[error("Scenario references unknown timer label '{0}'")]
    UnknownLabel(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("State hash mismatch: expected {expected}, got {actual}")]
    HashMismatch { expected: String, actual: String },
}
