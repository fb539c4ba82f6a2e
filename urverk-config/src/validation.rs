//! Custom validation functions for configuration.

use std::sync::LazyLock;

use regex::Regex;
use validator::ValidationError;

static STORAGE_KEY: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new("^[A-Za-z0-9_.-]+$").ok());

const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// Storage keys become file names, so they are restricted to a safe charset.
pub fn validate_storage_key(key: &str) -> Result<(), ValidationError> {
    let re = STORAGE_KEY
        .as_ref()
        .ok_or_else(|| ValidationError::new("invalid_regex"))?;
    if re.is_match(key) && !key.starts_with('.') {
        Ok(())
    } else {
        Err(ValidationError::new("invalid_storage_key")
            .with_message("must match ^[A-Za-z0-9_.-]+$ and not start with '.'".into()))
    }
}

/// Validate a `tracing` level name.
pub fn validate_log_level(level: &str) -> Result<(), ValidationError> {
    if LOG_LEVELS.iter().any(|name| name.eq_ignore_ascii_case(level)) {
        Ok(())
    } else {
        Err(ValidationError::new("invalid_log_level"))
    }
}
