//! ## urverk-core::clock
//! **Trusted clock anchored to a device monotonic counter**
//!
//! ### Key Submodules:
//! - `source`: monotonic counter and wall clock traits (system + virtual)
//! - `snapshot`: persisted baseline
//! - `trusted`: the trusted clock state machine and tamper signals

pub mod snapshot;
pub mod source;
pub mod trusted;

pub use snapshot::TrustedClockSnapshot;
pub use source::{
    MonotonicSource, SystemMonotonic, SystemWallClock, VirtualMonotonic, VirtualWallClock,
    WallClock,
};
pub use trusted::{ClockSettings, ClockThresholds, TamperReason, TrustedClock, SNAPSHOT_KEY};
