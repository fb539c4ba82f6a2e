use serde::{Deserialize, Serialize};

/// Persisted trusted-clock baseline.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrustedClockSnapshot {
    /// Trusted epoch milliseconds at the moment the baseline was taken.
    pub trusted_epoch_ms_at_sync: i64,
    /// Raw monotonic counter at the same moment.
    pub monotonic_ticks_at_sync: i64,
    /// Counter ticks per second.
    pub monotonic_frequency: i64,
    /// Device wall clock at the last sync. Diagnostic only.
    pub device_epoch_ms_at_sync: i64,
    pub tamper_count: u32,
    /// Highest trusted time observed at a checkpoint.
    pub last_known_trusted_epoch_ms: i64,
}

impl TrustedClockSnapshot {
    /// A snapshot is usable only if its counter frequency is meaningful.
    pub fn is_valid(&self) -> bool {
        self.monotonic_frequency > 0
    }

    /// Milliseconds elapsed on the monotonic counter since the baseline.
    /// Negative when the counter is behind the baseline.
    pub fn elapsed_ms(&self, monotonic_now: i64) -> i64 {
        let delta_ticks = i128::from(monotonic_now) - i128::from(self.monotonic_ticks_at_sync);
        let ms = delta_ticks * 1_000 / i128::from(self.monotonic_frequency.max(1));
        ms.clamp(i128::from(i64::MIN), i128::from(i64::MAX)) as i64
    }
}
