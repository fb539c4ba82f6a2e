//! # Virtual device clocks
//!
//! The monotonic counter and wall clock a simulated device would expose. Both
//! are shared handles: the trusted clock owns clones and the simulation moves
//! them.

use tracing::debug;
use urverk_core::clock::{VirtualMonotonic, VirtualWallClock, WallClock};

/// Default start of the simulated wall clock (2023-11-14T22:13:20Z).
pub const DEFAULT_START_EPOCH_MS: i64 = 1_700_000_000_000;

#[derive(Debug, Clone)]
pub struct VirtualDevice {
    monotonic: VirtualMonotonic,
    wall: VirtualWallClock,
}

impl VirtualDevice {
    /// Counter at zero with nanosecond frequency, wall clock at `start_epoch_ms`.
    pub fn new(start_epoch_ms: i64) -> Self {
        Self {
            monotonic: VirtualMonotonic::new(0, 1_000_000_000),
            wall: VirtualWallClock::new(start_epoch_ms),
        }
    }

    pub fn monotonic(&self) -> VirtualMonotonic {
        self.monotonic.clone()
    }

    pub fn wall(&self) -> VirtualWallClock {
        self.wall.clone()
    }

    /// Current device wall clock reading.
    pub fn wall_now_ms(&self) -> i64 {
        self.wall.now_epoch_ms()
    }

    /// Real time passing: both clocks move together.
    pub fn elapse_ms(&self, ms: i64) {
        self.monotonic.advance_ms(ms);
        self.wall.advance_ms(ms);
    }

    /// Process suspended or backgrounded for `ms`. No frames run meanwhile.
    pub fn suspend(&self, ms: i64) {
        debug!(ms, "Device suspended");
        self.elapse_ms(ms);
    }

    /// The user moves the device clock without real time passing.
    pub fn shift_wall(&self, offset_ms: i64) {
        debug!(offset_ms, "Device wall clock shifted");
        self.wall.advance_ms(offset_ms);
    }

    /// Powered off for `downtime_ms`: the wall clock keeps going and the
    /// monotonic counter restarts from zero.
    pub fn reboot(&self, downtime_ms: i64) {
        debug!(downtime_ms, "Device rebooted");
        self.wall.advance_ms(downtime_ms);
        self.monotonic.set_ticks(0);
    }
}

impl Default for VirtualDevice {
    fn default() -> Self {
        Self::new(DEFAULT_START_EPOCH_MS)
    }
}
