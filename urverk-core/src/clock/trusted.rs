//! Trusted wall-clock estimate.
//!
//! `now = trusted_epoch_ms_at_sync + (monotonic_now - monotonic_at_sync)`,
//! converted to milliseconds. The baseline is refreshed whenever the host hands
//! in an authoritative epoch (e.g. a server timestamp). Tamper detection is
//! advisory: it raises a flag and bumps a counter, it never alters a reading.

use std::fmt;

use tracing::{debug, info, warn};

use super::snapshot::TrustedClockSnapshot;
use super::source::{MonotonicSource, WallClock};
use crate::storage::SharedStore;

/// Storage key of the persisted snapshot.
pub const SNAPSHOT_KEY: &str = "timing.gameclock.snapshot.v1";

const MINUTE_MS: i64 = 60 * 1_000;

/// Skew limits beyond which the device clock is considered suspicious.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClockThresholds {
    /// Max |device - trusted| on resume.
    pub resume_skew_ms: i64,
    /// Max |device - trusted| at sync time.
    pub sync_skew_ms: i64,
}

impl Default for ClockThresholds {
    fn default() -> Self {
        Self {
            resume_skew_ms: 5 * MINUTE_MS,
            sync_skew_ms: 10 * MINUTE_MS,
        }
    }
}

/// Construction parameters for [`TrustedClock`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClockSettings {
    pub thresholds: ClockThresholds,
    pub snapshot_key: String,
}

impl Default for ClockSettings {
    fn default() -> Self {
        Self {
            thresholds: ClockThresholds::default(),
            snapshot_key: SNAPSHOT_KEY.to_string(),
        }
    }
}

/// Why a tamper signal was raised.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TamperReason {
    /// The monotonic counter reads behind the baseline.
    NegativeMonotonicDelta { delta_ms: i64 },
    /// Device and trusted time disagree at sync.
    SyncSkew { skew_ms: i64 },
    /// Device and trusted time disagree on resume.
    ResumeSkew { skew_ms: i64 },
    /// Trusted time fell below the last persisted checkpoint.
    BackwardTime { trusted_ms: i64, last_known_ms: i64 },
}

impl fmt::Display for TamperReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NegativeMonotonicDelta { delta_ms } => {
                write!(f, "monotonic delta is negative ({delta_ms} ms)")
            }
            Self::SyncSkew { skew_ms } => write!(f, "device/trusted skew at sync is {skew_ms} ms"),
            Self::ResumeSkew { skew_ms } => {
                write!(f, "device/trusted skew on resume is {skew_ms} ms")
            }
            Self::BackwardTime {
                trusted_ms,
                last_known_ms,
            } => write!(
                f,
                "trusted time {trusted_ms} went backwards past checkpoint {last_known_ms}"
            ),
        }
    }
}

/// Wall-clock estimate resistant to device clock changes.
pub struct TrustedClock {
    snapshot: TrustedClockSnapshot,
    settings: ClockSettings,
    monotonic: Box<dyn MonotonicSource>,
    wall: Box<dyn WallClock>,
    store: SharedStore,
    suspected_tampering: bool,
    /// Baseline came from the device clock, not from a trusted sync.
    bootstrapped: bool,
    /// A negative delta is reported once per baseline, not on every read.
    negative_delta_flagged: bool,
    reasons: Vec<TamperReason>,
}

impl fmt::Debug for TrustedClock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TrustedClock")
            .field("snapshot", &self.snapshot)
            .field("settings", &self.settings)
            .field("suspected_tampering", &self.suspected_tampering)
            .field("bootstrapped", &self.bootstrapped)
            .finish_non_exhaustive()
    }
}

impl TrustedClock {
    /// Loads the persisted baseline, or bootstraps one from the device clock
    /// when none is usable.
    pub fn open(
        settings: ClockSettings,
        monotonic: impl MonotonicSource + 'static,
        wall: impl WallClock + 'static,
        store: SharedStore,
    ) -> Self {
        let mut clock = Self {
            snapshot: TrustedClockSnapshot::default(),
            settings,
            monotonic: Box::new(monotonic),
            wall: Box::new(wall),
            store,
            suspected_tampering: false,
            bootstrapped: false,
            negative_delta_flagged: false,
            reasons: Vec::new(),
        };

        match clock.load() {
            Some(snapshot) => {
                debug!(?snapshot, "Restored trusted clock baseline");
                clock.snapshot = snapshot;
            }
            None => {
                let device_ms = clock.wall.now_epoch_ms();
                info!(device_ms, "No trusted baseline, bootstrapping from device clock");
                clock.reset_baseline(device_ms);
                clock.snapshot.device_epoch_ms_at_sync = device_ms;
                clock.bootstrapped = true;
                clock.persist();
            }
        }
        clock
    }

    /// Current trusted epoch milliseconds.
    pub fn now_ms(&mut self) -> i64 {
        let elapsed = self.snapshot.elapsed_ms(self.monotonic.ticks());
        if elapsed < 0 && !self.negative_delta_flagged {
            self.negative_delta_flagged = true;
            self.flag(TamperReason::NegativeMonotonicDelta { delta_ms: elapsed });
            self.persist();
        }
        self.snapshot.trusted_epoch_ms_at_sync.saturating_add(elapsed)
    }

    /// Re-baselines on an authoritative epoch value.
    pub fn sync(&mut self, trusted_epoch_ms: i64) {
        let device_ms = self.wall.now_epoch_ms();
        self.reset_baseline(trusted_epoch_ms);
        self.snapshot.device_epoch_ms_at_sync = device_ms;
        self.bootstrapped = false;

        let skew_ms = device_ms.saturating_sub(trusted_epoch_ms).saturating_abs();
        if skew_ms > self.settings.thresholds.sync_skew_ms {
            self.flag(TamperReason::SyncSkew { skew_ms });
        }
        info!(trusted_epoch_ms, skew_ms, "Trusted clock synced");
        self.persist();
    }

    /// Checks the device clock against trusted time after the host regains
    /// the foreground.
    pub fn on_resume(&mut self) {
        let trusted_ms = self.now_ms();
        let device_ms = self.wall.now_epoch_ms();

        let skew_ms = device_ms.saturating_sub(trusted_ms).saturating_abs();
        if skew_ms > self.settings.thresholds.resume_skew_ms {
            self.flag(TamperReason::ResumeSkew { skew_ms });
        }

        let last_known_ms = self.snapshot.last_known_trusted_epoch_ms;
        if trusted_ms < last_known_ms {
            self.flag(TamperReason::BackwardTime {
                trusted_ms,
                last_known_ms,
            });
        }

        self.snapshot.last_known_trusted_epoch_ms = last_known_ms.max(trusted_ms);
        self.persist();
    }

    pub fn suspected_tampering(&self) -> bool {
        self.suspected_tampering
    }

    pub fn tamper_count(&self) -> u32 {
        self.snapshot.tamper_count
    }

    /// True until the first successful [`TrustedClock::sync`] when the
    /// baseline came from the device clock.
    pub fn is_bootstrapped(&self) -> bool {
        self.bootstrapped
    }

    pub fn snapshot(&self) -> &TrustedClockSnapshot {
        &self.snapshot
    }

    pub fn thresholds(&self) -> ClockThresholds {
        self.settings.thresholds
    }

    /// Tamper reasons raised since the last call.
    pub fn take_tamper_reasons(&mut self) -> Vec<TamperReason> {
        std::mem::take(&mut self.reasons)
    }

    /// Writes the snapshot through the store. Failures are logged and absorbed.
    pub fn persist(&self) {
        let blob = match serde_json::to_string(&self.snapshot) {
            Ok(blob) => blob,
            Err(e) => {
                warn!("Failed to encode trusted clock snapshot: {e}");
                return;
            }
        };
        if let Err(e) = self.store.save(&self.settings.snapshot_key, &blob) {
            warn!(key = %self.settings.snapshot_key, "Failed to persist trusted clock: {e}");
        }
    }

    fn load(&self) -> Option<TrustedClockSnapshot> {
        Self::read_snapshot(&self.store, &self.settings.snapshot_key)
    }

    /// Reads a persisted baseline without opening a clock. Unreadable or
    /// invalid snapshots are logged and treated as absent.
    pub fn read_snapshot(store: &SharedStore, key: &str) -> Option<TrustedClockSnapshot> {
        let blob = match store.try_load(key) {
            Ok(Some(blob)) => blob,
            Ok(None) => return None,
            Err(e) => {
                warn!(key, "Failed to read trusted clock: {e}");
                return None;
            }
        };
        match serde_json::from_str::<TrustedClockSnapshot>(&blob) {
            Ok(snapshot) if snapshot.is_valid() => Some(snapshot),
            Ok(_) => {
                warn!("Persisted trusted clock has no counter frequency, discarding");
                None
            }
            Err(e) => {
                warn!("Persisted trusted clock is malformed, discarding: {e}");
                None
            }
        }
    }

    fn reset_baseline(&mut self, trusted_epoch_ms: i64) {
        self.snapshot.trusted_epoch_ms_at_sync = trusted_epoch_ms;
        self.snapshot.monotonic_ticks_at_sync = self.monotonic.ticks();
        self.snapshot.monotonic_frequency = self.monotonic.frequency();
        self.snapshot.last_known_trusted_epoch_ms = trusted_epoch_ms;
        self.suspected_tampering = false;
        self.negative_delta_flagged = false;
    }

    fn flag(&mut self, reason: TamperReason) {
        self.suspected_tampering = true;
        self.snapshot.tamper_count = self.snapshot.tamper_count.saturating_add(1);
        warn!(
            tamper_count = self.snapshot.tamper_count,
            "Clock tampering suspected: {reason}"
        );
        self.reasons.push(reason);
    }
}
