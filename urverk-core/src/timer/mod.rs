//! ## urverk-core::timer
//! **Timer entries and the multi-domain scheduler**
//!
//! ### Key Submodules:
//! - `entry`: timer records, handles and labels
//! - `registry`: string-keyed callback registry
//! - `scheduler`: per-domain heaps, id table, group/tag indices, tick loop

mod entry;
mod registry;
mod scheduler;

pub use entry::{TimerEntry, TimerHandle, TimerId, TimerLabels, TimerState};
pub use registry::{CallbackRegistry, TimerCallback};
pub use scheduler::{catch_up_due, TickReport, TimerScheduler, DEFAULT_MAX_EXEC_PER_TICK};
