use thiserror::Error;

/// Errors returned by scheduling and restore calls.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TimerError {
    #[error("Repeating interval must be positive, got {0} ms")]
    NonPositiveInterval(i64),

    #[error("Timer interval cannot be negative, got {0} ms")]
    NegativeInterval(i64),

    #[error("Timer id {0} is already in use")]
    DuplicateId(u64),

    #[error("Timer id 0 is reserved")]
    ReservedId,
}

/// Errors raised by a key-value storage backend.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Storage I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Storage backend error: {0}")]
    Backend(String),
}
