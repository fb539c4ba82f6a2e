use thiserror::Error;
use urverk_core::StorageError;

#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("Timer state storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Timer state encoding error: {0}")]
    Encode(#[from] serde_json::Error),
}
