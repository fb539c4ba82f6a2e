//! # urverk-core
//!
//! Trusted time and multi-domain timer scheduling for tick-driven applications.
//!
//! ### Key Submodules:
//! - `heap`: binary min-heap with an id→position index (O(log n) remove/update)
//! - `clock`: trusted clock anchored to a device monotonic counter
//! - `domain`: Real / App / Gameplay notions of "now"
//! - `timer`: timer entries, callback registry and the scheduler
//! - `storage`: key-value persistence contract used by the clock and timers
//! - `format`: duration helpers and countdown formatting
//!
//! Everything here is single-threaded and cooperative: the host calls into the
//! scheduler once per update cycle and nothing blocks or spawns.

pub mod clock;
pub mod domain;
pub mod error;
pub mod format;
pub mod heap;
pub mod storage;
pub mod timer;

pub mod prelude {
    pub use crate::clock::*;
    pub use crate::domain::*;
    pub use crate::error::*;
    pub use crate::storage::*;
    pub use crate::timer::*;
}

pub use error::{StorageError, TimerError};
