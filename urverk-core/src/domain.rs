//! ## urverk-core::domain
//! **Independent notions of "now"**
//!
//! - `Real`: trusted wall-clock milliseconds (delegates to [`TrustedClock`])
//! - `App`: unscaled elapsed time, keeps running while gameplay is paused
//! - `Gameplay`: scaled elapsed time; the tick source passes zero while paused
//!
//! App and Gameplay only move forward through explicit `advance` calls.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::clock::TrustedClock;

/// Selects a domain clock and its timer queue.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum DomainKind {
    Real,
    #[default]
    App,
    Gameplay,
}

impl DomainKind {
    /// Order in which a frame ticks the domains.
    pub const TICK_ORDER: [DomainKind; 3] =
        [DomainKind::App, DomainKind::Real, DomainKind::Gameplay];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Real => "real",
            Self::App => "app",
            Self::Gameplay => "gameplay",
        }
    }
}

impl fmt::Display for DomainKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DomainKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "real" => Ok(Self::Real),
            "app" => Ok(Self::App),
            "gameplay" => Ok(Self::Gameplay),
            other => Err(format!("unknown time domain '{other}'")),
        }
    }
}

/// A monotonic per-domain clock in milliseconds.
pub trait TimeDomain {
    fn kind(&self) -> DomainKind;
    fn now_ms(&mut self) -> i64;
}

/// Elapsed time for one update cycle, as delivered by the tick source.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct FrameDelta {
    /// Wall duration of the cycle. Drives the App domain.
    pub unscaled_secs: f64,
    /// Pause- and timescale-adjusted duration. Drives the Gameplay domain.
    pub scaled_secs: f64,
}

impl FrameDelta {
    pub fn new(unscaled_secs: f64, scaled_secs: f64) -> Self {
        Self {
            unscaled_secs,
            scaled_secs,
        }
    }

    /// Unpaused cycle at timescale 1.
    pub fn uniform(secs: f64) -> Self {
        Self::new(secs, secs)
    }
}

/// Real domain backed by the trusted clock.
#[derive(Debug)]
pub struct RealDomain {
    clock: TrustedClock,
}

impl RealDomain {
    pub fn new(clock: TrustedClock) -> Self {
        Self { clock }
    }

    pub fn clock(&self) -> &TrustedClock {
        &self.clock
    }

    pub fn clock_mut(&mut self) -> &mut TrustedClock {
        &mut self.clock
    }
}

impl TimeDomain for RealDomain {
    fn kind(&self) -> DomainKind {
        DomainKind::Real
    }

    fn now_ms(&mut self) -> i64 {
        self.clock.now_ms()
    }
}

/// App or Gameplay domain: accumulates whatever elapsed time it is given.
#[derive(Debug, Clone)]
pub struct AccumulatingDomain {
    kind: DomainKind,
    now_ms: i64,
    /// Sub-millisecond remainder carried into the next advance.
    carry_ms: f64,
}

impl AccumulatingDomain {
    pub fn new(kind: DomainKind) -> Self {
        Self {
            kind,
            now_ms: 0,
            carry_ms: 0.0,
        }
    }

    /// Adds `elapsed_secs`. Non-positive and non-finite values are ignored.
    pub fn advance(&mut self, elapsed_secs: f64) {
        if !(elapsed_secs > 0.0) || !elapsed_secs.is_finite() {
            return;
        }
        let total = elapsed_secs * 1_000.0 + self.carry_ms;
        let whole = total.floor();
        self.carry_ms = total - whole;
        self.now_ms = self.now_ms.saturating_add(whole as i64);
    }

    /// Adds whole milliseconds. Non-positive values are ignored.
    pub fn advance_ms(&mut self, elapsed_ms: i64) {
        if elapsed_ms > 0 {
            self.now_ms = self.now_ms.saturating_add(elapsed_ms);
        }
    }

    /// Reinstates a persisted position. Only moves forward.
    pub fn restore(&mut self, now_ms: i64) {
        if now_ms > self.now_ms {
            self.now_ms = now_ms;
            self.carry_ms = 0.0;
        }
    }

    #[inline]
    pub fn current_ms(&self) -> i64 {
        self.now_ms
    }
}

impl TimeDomain for AccumulatingDomain {
    fn kind(&self) -> DomainKind {
        self.kind
    }

    fn now_ms(&mut self) -> i64 {
        self.now_ms
    }
}

/// The three domain clocks a scheduler reads.
#[derive(Debug)]
pub struct Domains {
    pub real: RealDomain,
    pub app: AccumulatingDomain,
    pub gameplay: AccumulatingDomain,
}

impl Domains {
    pub fn new(clock: TrustedClock) -> Self {
        Self {
            real: RealDomain::new(clock),
            app: AccumulatingDomain::new(DomainKind::App),
            gameplay: AccumulatingDomain::new(DomainKind::Gameplay),
        }
    }

    pub fn now_ms(&mut self, kind: DomainKind) -> i64 {
        match kind {
            DomainKind::Real => self.real.now_ms(),
            DomainKind::App => self.app.now_ms(),
            DomainKind::Gameplay => self.gameplay.now_ms(),
        }
    }

    /// Advances App by the unscaled and Gameplay by the scaled duration.
    pub fn advance(&mut self, delta: FrameDelta) {
        self.app.advance(delta.unscaled_secs);
        self.gameplay.advance(delta.scaled_secs);
    }

    /// Reinstates persisted App and Gameplay positions.
    pub fn set_accumulated(&mut self, app_ms: i64, gameplay_ms: i64) {
        self.app.restore(app_ms);
        self.gameplay.restore(gameplay_ms);
    }

    pub fn clock(&self) -> &TrustedClock {
        self.real.clock()
    }

    pub fn clock_mut(&mut self) -> &mut TrustedClock {
        self.real.clock_mut()
    }
}
