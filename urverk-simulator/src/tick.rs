//! Per-frame elapsed time with pause and timescale.

use urverk_core::domain::FrameDelta;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TickSource {
    paused: bool,
    time_scale: f64,
}

impl Default for TickSource {
    fn default() -> Self {
        Self {
            paused: false,
            time_scale: 1.0,
        }
    }
}

impl TickSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn paused(&self) -> bool {
        self.paused
    }

    pub fn set_paused(&mut self, paused: bool) {
        self.paused = paused;
    }

    pub fn time_scale(&self) -> f64 {
        self.time_scale
    }

    /// Negative and NaN scales clamp to zero.
    pub fn set_time_scale(&mut self, scale: f64) {
        self.time_scale = if scale > 0.0 { scale } else { 0.0 };
    }

    /// Deltas for one frame of `unscaled_secs` wall time.
    #[inline]
    pub fn frame(&self, unscaled_secs: f64) -> FrameDelta {
        let scaled_secs = if self.paused {
            0.0
        } else {
            unscaled_secs * self.time_scale
        };
        FrameDelta::new(unscaled_secs, scaled_secs)
    }
}
