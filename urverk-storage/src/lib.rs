//! # urverk-storage
//!
//! Durable state for the trusted clock and the timer scheduler.
//!
//! ### Key Submodules:
//! - `file`: one-file-per-key store with atomic replacement
//! - `record`: on-disk timer-state record
//! - `persistence`: save/load of scheduler state with post-load catch-up

pub mod error;
pub mod file;
pub mod persistence;
pub mod record;

pub use error::PersistenceError;
pub use file::FileStore;
pub use persistence::{LoadOutcome, TimerPersistence, TIMERS_KEY};
pub use record::{DomainClocksRecord, TimerRecord, TimerStateRecord};
