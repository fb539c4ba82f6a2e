//! Scenario model.
//!
//! A scenario is a seed plus an ordered list of steps. Timers are named by a
//! `label` that later steps use to pause, resume or cancel them; the label
//! doubles as the callback id unless `callback` is given.
//!
//! ```yaml
//! seed: 7
//! steps:
//!   - schedule_after: { label: once, domain: app, delay_ms: 3000, group: Tests }
//!   - schedule_every: { label: beat, domain: gameplay, interval_ms: 1000 }
//!   - frames: { count: 60 }
//!   - pause_ticks
//!   - suspend: { ms: 5000 }
//!   - cancel_group: Tests
//!   - restart
//!   - reboot: { downtime_ms: 60000 }
//! ```

use std::collections::BTreeSet;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use urverk_core::domain::DomainKind;

use crate::device::DEFAULT_START_EPOCH_MS;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scenario {
    #[serde(default = "default_seed")]
    pub seed: u64,
    /// Initial device wall clock.
    #[serde(default = "default_start_epoch_ms")]
    pub start_epoch_ms: i64,
    /// Callback ids to register. When absent every callback a schedule step
    /// names is registered.
    #[serde(default)]
    pub callbacks: Option<Vec<String>>,
    pub steps: Vec<Step>,
}

fn default_seed() -> u64 {
    42
}

fn default_start_epoch_ms() -> i64 {
    DEFAULT_START_EPOCH_MS
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Step {
    ScheduleAfter(ScheduleSpec),
    ScheduleEvery(ScheduleSpec),
    /// Real-domain timer at trusted now + `offset_ms`.
    ScheduleAt(ScheduleSpec),
    /// Run `count` frames; `frame_ms` overrides the seeded frame clock.
    Frames {
        count: u32,
        #[serde(default)]
        frame_ms: Option<u64>,
    },
    /// Time passes with no frames (process suspended).
    Suspend { ms: i64 },
    PauseTicks,
    ResumeTicks,
    TimeScale(f64),
    Pause(String),
    Resume(String),
    Cancel(String),
    PauseGroup(String),
    ResumeGroup(String),
    CancelGroup(String),
    PauseTag(String),
    ResumeTag(String),
    CancelTag(String),
    /// Trusted sync at device time + `offset_ms`.
    Sync {
        #[serde(default)]
        offset_ms: i64,
    },
    /// Move the device wall clock without real time passing.
    TamperWall { offset_ms: i64 },
    AppResume,
    /// Save, drop the runtime and bootstrap a fresh one from storage.
    Restart,
    /// Save, power the device off for `downtime_ms` (monotonic counter
    /// resets) and bootstrap a fresh runtime.
    Reboot {
        #[serde(default)]
        downtime_ms: i64,
    },
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScheduleSpec {
    pub label: String,
    #[serde(default)]
    pub domain: DomainKind,
    #[serde(default)]
    pub delay_ms: i64,
    #[serde(default)]
    pub interval_ms: i64,
    #[serde(default)]
    pub offset_ms: i64,
    #[serde(default)]
    pub callback: Option<String>,
    #[serde(default)]
    pub group: Option<String>,
    #[serde(default)]
    pub tags: BTreeSet<String>,
}

impl ScheduleSpec {
    pub fn callback_id(&self) -> &str {
        self.callback.as_deref().unwrap_or(&self.label)
    }
}

impl Scenario {
    /// Callback ids to register before running.
    pub fn callback_ids(&self) -> BTreeSet<String> {
        if let Some(ids) = &self.callbacks {
            return ids.iter().cloned().collect();
        }
        self.steps
            .iter()
            .filter_map(|step| match step {
                Step::ScheduleAfter(spec) | Step::ScheduleEvery(spec) | Step::ScheduleAt(spec) => {
                    Some(spec.callback_id().to_string())
                }
                _ => None,
            })
            .collect()
    }

    pub fn from_yaml(yaml: &str) -> Result<Self, ScenarioError> {
        Ok(serde_yaml::from_str(yaml)?)
    }
}

#[derive(Error, Debug)]
pub enum ScenarioError {
    #[error("Scenario file not found: {0}")]
    FileNotFound(String),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Scenario parse error: {0}")]
    Serde(#[from] serde_yaml::Error),
}

/// Loads a scenario from a YAML file.
pub fn load_scenario<P: AsRef<Path>>(path: P) -> Result<Scenario, ScenarioError> {
    let path = path.as_ref();
    if !path.exists() {
        return Err(ScenarioError::FileNotFound(format!(
            "{} does not exist",
            path.display()
        )));
    }
    let content = std::fs::read_to_string(path)?;
    Scenario::from_yaml(&content)
}
