//! Persisted timer-state record.
//!
//! JSON with camelCase field names. `domains` and `nextId` are optional on
//! read so records written without them still load.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use urverk_core::domain::DomainKind;
use urverk_core::timer::{TimerEntry, TimerId, TimerState};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimerRecord {
    pub id: TimerId,
    pub domain: DomainKind,
    pub due_ms: i64,
    pub interval_ms: i64,
    pub paused: bool,
    pub remaining_ms_when_paused: i64,
    pub callback_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,
}

impl From<&TimerEntry> for TimerRecord {
    fn from(entry: &TimerEntry) -> Self {
        Self {
            id: entry.id,
            domain: entry.domain,
            due_ms: entry.due_ms,
            interval_ms: entry.interval_ms,
            paused: entry.is_paused(),
            remaining_ms_when_paused: entry.remaining_when_paused(),
            callback_id: entry.callback_id.clone(),
            group: entry.group.clone(),
            tags: (!entry.tags.is_empty()).then(|| entry.tags.iter().cloned().collect()),
        }
    }
}

impl From<TimerRecord> for TimerEntry {
    fn from(record: TimerRecord) -> Self {
        let state = if record.paused {
            TimerState::Paused {
                remaining_ms: record.remaining_ms_when_paused.max(0),
            }
        } else {
            TimerState::Scheduled
        };
        Self {
            id: record.id,
            domain: record.domain,
            due_ms: record.due_ms,
            interval_ms: record.interval_ms,
            state,
            callback_id: record.callback_id,
            group: record.group,
            tags: record.tags.unwrap_or_default().into_iter().collect::<BTreeSet<_>>(),
        }
    }
}

/// Accumulated App and Gameplay time at save.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DomainClocksRecord {
    pub app_ms: i64,
    pub gameplay_ms: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimerStateRecord {
    #[serde(default)]
    pub timers: Vec<TimerRecord>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub domains: Option<DomainClocksRecord>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_id: Option<TimerId>,
}
