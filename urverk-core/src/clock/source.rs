//! Device time sources.
//!
//! The trusted clock reads two device clocks: a monotonic counter that never
//! goes backwards while the device stays up, and the wall clock, which the user
//! can change at will and is therefore only used for diagnostics once a
//! trusted baseline exists.

use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

/// Raw monotonic counter.
pub trait MonotonicSource: Send + Sync {
    /// Current counter value.
    fn ticks(&self) -> i64;

    /// Counter ticks per second.
    fn frequency(&self) -> i64;
}

/// Device wall clock in Unix epoch milliseconds.
pub trait WallClock: Send + Sync {
    fn now_epoch_ms(&self) -> i64;
}

/// Nanosecond monotonic counter read from the OS.
///
/// On Linux and Android this is `CLOCK_BOOTTIME`, which keeps counting while
/// the device sleeps; `CLOCK_MONOTONIC` stops during suspend there.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemMonotonic;

const NANOS_PER_SEC: i64 = 1_000_000_000;

#[cfg(any(target_os = "linux", target_os = "android"))]
const COUNTER_CLOCK: libc::clockid_t = libc::CLOCK_BOOTTIME;
#[cfg(all(unix, not(any(target_os = "linux", target_os = "android"))))]
const COUNTER_CLOCK: libc::clockid_t = libc::CLOCK_MONOTONIC;

impl MonotonicSource for SystemMonotonic {
    #[cfg(unix)]
    #[inline]
    fn ticks(&self) -> i64 {
        let mut ts = libc::timespec {
            tv_sec: 0,
            tv_nsec: 0,
        };
        // SAFETY: `ts` is a valid, writable timespec for the duration of the call.
        unsafe {
            libc::clock_gettime(COUNTER_CLOCK, &mut ts);
        }
        (ts.tv_sec as i64) * NANOS_PER_SEC + (ts.tv_nsec as i64)
    }

    #[cfg(not(unix))]
    fn ticks(&self) -> i64 {
        use std::sync::OnceLock;
        use std::time::Instant;

        // Process-local origin; a restart looks like a counter reset.
        static ORIGIN: OnceLock<Instant> = OnceLock::new();
        let origin = ORIGIN.get_or_init(Instant::now);
        origin.elapsed().as_nanos().min(i64::MAX as u128) as i64
    }

    #[inline]
    fn frequency(&self) -> i64 {
        NANOS_PER_SEC
    }
}

/// The OS wall clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemWallClock;

impl WallClock for SystemWallClock {
    fn now_epoch_ms(&self) -> i64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis().min(i64::MAX as u128) as i64)
            .unwrap_or(0)
    }
}

/// Monotonic counter under explicit control.
///
/// Clones share the same counter, so a simulation can keep one handle while
/// the trusted clock owns another.
#[derive(Debug, Clone)]
pub struct VirtualMonotonic {
    ticks: Arc<AtomicI64>,
    frequency: i64,
}

impl VirtualMonotonic {
    /// Counter starting at `start` ticks with `frequency` ticks per second.
    pub fn new(start: i64, frequency: i64) -> Self {
        Self {
            ticks: Arc::new(AtomicI64::new(start)),
            frequency,
        }
    }

    /// Millisecond-resolution counter starting at zero.
    pub fn millis() -> Self {
        Self::new(0, 1_000)
    }

    pub fn advance_ticks(&self, ticks: i64) {
        self.ticks.fetch_add(ticks, Ordering::AcqRel);
    }

    pub fn advance_ms(&self, ms: i64) {
        self.advance_ticks(ms.saturating_mul(self.frequency) / 1_000);
    }

    /// Overwrites the counter, e.g. to model a device reboot.
    pub fn set_ticks(&self, ticks: i64) {
        self.ticks.store(ticks, Ordering::Release);
    }
}

impl MonotonicSource for VirtualMonotonic {
    #[inline]
    fn ticks(&self) -> i64 {
        self.ticks.load(Ordering::Acquire)
    }

    #[inline]
    fn frequency(&self) -> i64 {
        self.frequency
    }
}

/// Wall clock under explicit control. Clones share state.
#[derive(Debug, Clone)]
pub struct VirtualWallClock {
    epoch_ms: Arc<AtomicI64>,
}

impl VirtualWallClock {
    pub fn new(epoch_ms: i64) -> Self {
        Self {
            epoch_ms: Arc::new(AtomicI64::new(epoch_ms)),
        }
    }

    pub fn advance_ms(&self, ms: i64) {
        self.epoch_ms.fetch_add(ms, Ordering::AcqRel);
    }

    pub fn set_epoch_ms(&self, epoch_ms: i64) {
        self.epoch_ms.store(epoch_ms, Ordering::Release);
    }
}

impl WallClock for VirtualWallClock {
    #[inline]
    fn now_epoch_ms(&self) -> i64 {
        self.epoch_ms.load(Ordering::Acquire)
    }
}
