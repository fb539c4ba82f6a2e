//! Seeded frame durations.

use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};

/// Yields `frame_ms ± jitter_ms` per frame, reproducibly for a given seed.
#[derive(Debug, Clone)]
pub struct FrameClock {
    rng: SmallRng,
    frame_ms: u64,
    jitter_ms: u64,
}

impl FrameClock {
    pub fn new(seed: u64, frame_ms: u64, jitter_ms: u64) -> Self {
        Self {
            rng: SmallRng::seed_from_u64(seed),
            frame_ms,
            jitter_ms,
        }
    }

    /// Next frame duration in milliseconds, never below 1.
    pub fn next_ms(&mut self) -> i64 {
        let base = self.frame_ms as i64;
        let jitter = self.jitter_ms as i64;
        let offset = if jitter > 0 {
            self.rng.random_range(-jitter..=jitter)
        } else {
            0
        };
        (base + offset).max(1)
    }

    pub fn frame_ms(&self) -> u64 {
        self.frame_ms
    }
}
