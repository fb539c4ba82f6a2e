use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::domain::DomainKind;

/// Scheduler-wide timer id. Assigned monotonically from 1, never reused.
pub type TimerId = u64;

/// Opaque reference to a scheduled timer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TimerHandle(TimerId);

impl TimerHandle {
    /// Handle that never addresses a timer.
    pub const INVALID: TimerHandle = TimerHandle(0);

    pub fn from_id(id: TimerId) -> Self {
        Self(id)
    }

    #[inline]
    pub fn id(self) -> TimerId {
        self.0
    }

    #[inline]
    pub fn is_valid(self) -> bool {
        self.0 != 0
    }
}

impl fmt::Display for TimerHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "timer#{}", self.0)
    }
}

/// Live state of an entry. Canceled entries are removed from the scheduler
/// outright, so there is no variant for them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerState {
    /// Present in its domain's heap; `due_ms` is authoritative.
    Scheduled,
    /// Out of the heap with the countdown frozen.
    Paused { remaining_ms: i64 },
}

/// Optional group and tag metadata for bulk operations.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TimerLabels {
    pub group: Option<String>,
    pub tags: BTreeSet<String>,
}

impl TimerLabels {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn group(mut self, group: impl Into<String>) -> Self {
        self.group = Some(group.into());
        self
    }

    pub fn tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.insert(tag.into());
        self
    }

    pub fn tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags.extend(tags.into_iter().map(Into::into));
        self
    }
}

/// One scheduled unit of work.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimerEntry {
    pub id: TimerId,
    pub domain: DomainKind,
    /// Absolute due time in the entry's domain. Meaningful while scheduled.
    pub due_ms: i64,
    /// `0` for one-shot, the period for repeating timers.
    pub interval_ms: i64,
    pub state: TimerState,
    /// Key resolved through the callback registry at fire time.
    pub callback_id: String,
    pub group: Option<String>,
    pub tags: BTreeSet<String>,
}

impl TimerEntry {
    #[inline]
    pub fn handle(&self) -> TimerHandle {
        TimerHandle(self.id)
    }

    #[inline]
    pub fn is_repeating(&self) -> bool {
        self.interval_ms > 0
    }

    #[inline]
    pub fn is_paused(&self) -> bool {
        matches!(self.state, TimerState::Paused { .. })
    }

    /// Frozen remaining time while paused, `0` otherwise.
    pub fn remaining_when_paused(&self) -> i64 {
        match self.state {
            TimerState::Paused { remaining_ms } => remaining_ms,
            TimerState::Scheduled => 0,
        }
    }

    /// Group and tags that take part in bulk indices. Empty names are skipped.
    pub(crate) fn indexed_group(&self) -> Option<&str> {
        self.group.as_deref().filter(|g| !g.is_empty())
    }

    pub(crate) fn indexed_tags(&self) -> impl Iterator<Item = &str> {
        self.tags.iter().map(String::as_str).filter(|t| !t.is_empty())
    }
}
