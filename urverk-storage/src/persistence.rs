//! Scheduler state persistence.
//!
//! `save` writes every live entry (scheduled or paused) plus the accumulated
//! domain clocks, and asks the trusted clock to persist its own snapshot.
//! `load` never fails: an absent or unreadable record means "no prior state".
//! After restoring, each domain is ticked once so that anything that became
//! due while the process was gone fires immediately.

use tracing::{debug, info, warn};
use urverk_core::domain::DomainKind;
use urverk_core::storage::SharedStore;
use urverk_core::timer::{TickReport, TimerEntry, TimerScheduler, DEFAULT_MAX_EXEC_PER_TICK};

use crate::error::PersistenceError;
use crate::record::{DomainClocksRecord, TimerRecord, TimerStateRecord};

/// Storage key of the timer-state record.
pub const TIMERS_KEY: &str = "timing.timers.state.v1";

/// Post-load catch-up order.
const CATCH_UP_ORDER: [DomainKind; 3] = [DomainKind::Real, DomainKind::App, DomainKind::Gameplay];

/// What a [`TimerPersistence::load`] call did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoadOutcome {
    /// Entries reinstated in the scheduler.
    pub restored: usize,
    /// Records rejected as duplicate or malformed.
    pub skipped: usize,
    /// Result of the catch-up pass.
    pub catch_up: TickReport,
}

impl LoadOutcome {
    /// Entries fired during the catch-up pass.
    pub fn executed(&self) -> usize {
        self.catch_up.executed
    }
}

pub struct TimerPersistence {
    store: SharedStore,
    key: String,
    max_exec_per_tick: usize,
}

impl TimerPersistence {
    pub fn new(store: SharedStore) -> Self {
        Self::with_key(store, TIMERS_KEY)
    }

    pub fn with_key(store: SharedStore, key: impl Into<String>) -> Self {
        Self {
            store,
            key: key.into(),
            max_exec_per_tick: DEFAULT_MAX_EXEC_PER_TICK,
        }
    }

    /// Budget for the post-load catch-up tick.
    pub fn with_max_exec_per_tick(mut self, max_exec_per_tick: usize) -> Self {
        self.max_exec_per_tick = max_exec_per_tick;
        self
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    /// Serializes the scheduler state and writes it through the store.
    pub fn save(&self, scheduler: &TimerScheduler) -> Result<(), PersistenceError> {
        let mut timers: Vec<TimerRecord> = scheduler.entries().map(TimerRecord::from).collect();
        timers.sort_by_key(|t| t.id);

        let domains = scheduler.domains();
        let record = TimerStateRecord {
            timers,
            domains: Some(DomainClocksRecord {
                app_ms: domains.app.current_ms(),
                gameplay_ms: domains.gameplay.current_ms(),
            }),
            next_id: Some(scheduler.next_id()),
        };

        let blob = serde_json::to_string(&record)?;
        self.store.save(&self.key, &blob)?;
        domains.clock().persist();

        debug!(
            key = %self.key,
            timers = record.timers.len(),
            "Saved timer state"
        );
        Ok(())
    }

    /// Reads the persisted record into `scheduler` and runs the catch-up pass.
    pub fn load(&self, scheduler: &mut TimerScheduler) -> LoadOutcome {
        let mut outcome = LoadOutcome::default();
        let Some(record) = self.read_state() else {
            return outcome;
        };

        if let Some(domains) = record.domains {
            scheduler
                .domains_mut()
                .set_accumulated(domains.app_ms, domains.gameplay_ms);
        }
        if let Some(next_id) = record.next_id {
            scheduler.reserve_ids_below(next_id);
        }

        for timer in record.timers {
            let id = timer.id;
            match scheduler.restore_entry(TimerEntry::from(timer)) {
                Ok(_) => outcome.restored += 1,
                Err(e) => {
                    outcome.skipped += 1;
                    warn!(id, "Skipping persisted timer: {e}");
                }
            }
        }

        for domain in CATCH_UP_ORDER {
            outcome
                .catch_up
                .merge(scheduler.tick(domain, self.max_exec_per_tick));
        }

        info!(
            restored = outcome.restored,
            skipped = outcome.skipped,
            executed = outcome.executed(),
            "Loaded timer state"
        );
        outcome
    }

    /// The persisted record as stored, without touching a scheduler.
    pub fn read_state(&self) -> Option<TimerStateRecord> {
        let blob = match self.store.try_load(&self.key) {
            Ok(Some(blob)) => blob,
            Ok(None) => {
                debug!(key = %self.key, "No persisted timer state");
                return None;
            }
            Err(e) => {
                warn!(key = %self.key, "Failed to read timer state: {e}");
                return None;
            }
        };
        match serde_json::from_str(&blob) {
            Ok(record) => Some(record),
            Err(e) => {
                warn!(key = %self.key, "Persisted timer state is malformed, starting empty: {e}");
                None
            }
        }
    }
}
