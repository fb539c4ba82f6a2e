//! Deterministic scenario replay.
//!
//! A scenario runs against a [`VirtualDevice`] and an in-memory store, so the
//! same scenario and options always produce the same firing log. The log is
//! hashed with BLAKE3; a known hash pins the scheduler's observable behaviour.

use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt::{self, Write as _};
use std::path::{Path, PathBuf};
use std::rc::Rc;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use blake3::Hasher;
use tracing::{debug, info, instrument, warn};

use urverk_core::domain::DomainKind;
use urverk_core::storage::MemoryStore;
use urverk_core::timer::{CallbackRegistry, TimerHandle, TimerId, TimerLabels, TimerScheduler};
use urverk_simulator::{
    FrameClock, Scenario, ScenarioError, ScheduleSpec, Step, TickSource, VirtualDevice,
};
use urverk_telemetry::MetricsRecorder;

use crate::error::EngineError;
use crate::runtime::TimingRuntime;
use crate::settings::RuntimeSettings;

/// One callback invocation observed during a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FiringRecord {
    pub label: String,
    pub domain: DomainKind,
    /// Domain time at which the callback ran.
    pub at_ms: i64,
}

impl fmt::Display for FiringRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}|{}|{}", self.label, self.domain, self.at_ms)
    }
}

#[derive(Debug, Clone)]
pub struct ScenarioOptions {
    pub settings: RuntimeSettings,
    /// Frame duration when a `frames` step gives none.
    pub frame_ms: u64,
    pub jitter_ms: u64,
    pub metrics: Option<MetricsRecorder>,
}

impl Default for ScenarioOptions {
    fn default() -> Self {
        Self {
            settings: RuntimeSettings::default(),
            frame_ms: 16,
            jitter_ms: 0,
            metrics: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ScenarioOutcome {
    pub fired: Vec<FiringRecord>,
    /// Hex BLAKE3 digest of the firing log.
    pub hash: String,
    pub frames: u64,
    pub tamper_count: u32,
    pub live_timers: usize,
    /// Firings whose callback id was not registered.
    pub unresolved: usize,
}

impl ScenarioOutcome {
    pub fn fired_count(&self, label: &str) -> usize {
        self.fired.iter().filter(|r| r.label == label).count()
    }

    /// Fails with [`EngineError::HashMismatch`] unless the run hashed to
    /// `expected`.
    pub fn validate_hash(&self, expected: &str) -> Result<(), EngineError> {
        if self.hash.eq_ignore_ascii_case(expected) {
            Ok(())
        } else {
            Err(EngineError::HashMismatch {
                expected: expected.to_string(),
                actual: self.hash.clone(),
            })
        }
    }
}

/// Hex BLAKE3 digest over `label|domain|at_ms` lines.
pub fn firing_log_hash(records: &[FiringRecord]) -> String {
    let mut hasher = Hasher::new();
    for record in records {
        hasher.update(record.to_string().as_bytes());
        hasher.update(b"\n");
    }
    hex::encode(hasher.finalize().as_bytes())
}

type FiringLog = Rc<RefCell<Vec<FiringRecord>>>;
type LabelIndex = Rc<RefCell<HashMap<TimerId, String>>>;

struct ScenarioRun<'a> {
    scenario: &'a Scenario,
    options: &'a ScenarioOptions,
    device: VirtualDevice,
    store: Arc<MemoryStore>,
    tick: TickSource,
    frame_clock: FrameClock,
    handles: HashMap<String, TimerHandle>,
    labels: LabelIndex,
    log: FiringLog,
    frames: u64,
    unresolved: usize,
}

impl<'a> ScenarioRun<'a> {
    fn new(scenario: &'a Scenario, options: &'a ScenarioOptions) -> Self {
        Self {
            scenario,
            options,
            device: VirtualDevice::new(scenario.start_epoch_ms),
            store: MemoryStore::shared(),
            tick: TickSource::new(),
            frame_clock: FrameClock::new(scenario.seed, options.frame_ms, options.jitter_ms),
            handles: HashMap::new(),
            labels: Rc::new(RefCell::new(HashMap::new())),
            log: Rc::new(RefCell::new(Vec::new())),
            frames: 0,
            unresolved: 0,
        }
    }

    /// Fresh registry recording into the shared log. Rebuilt on every
    /// bootstrap, as a restarted process would.
    fn callbacks(&self) -> CallbackRegistry {
        let mut registry = CallbackRegistry::new();
        for id in self.scenario.callback_ids() {
            let log = self.log.clone();
            let labels = self.labels.clone();
            registry.register(id, move |scheduler: &mut TimerScheduler, handle: TimerHandle| {
                let Some(domain) = scheduler.entry(handle).map(|e| e.domain) else {
                    return;
                };
                let at_ms = scheduler.now_ms(domain);
                let label = labels
                    .borrow()
                    .get(&handle.id())
                    .cloned()
                    .unwrap_or_else(|| handle.to_string());
                log.borrow_mut().push(FiringRecord {
                    label,
                    domain,
                    at_ms,
                });
            });
        }
        registry
    }

    fn bootstrap(&mut self) -> TimingRuntime {
        let runtime = TimingRuntime::bootstrap(
            &self.options.settings,
            self.device.monotonic(),
            self.device.wall(),
            self.store.clone(),
            self.callbacks(),
        );
        self.unresolved += runtime.last_load().catch_up.unresolved;
        match &self.options.metrics {
            Some(metrics) => runtime.with_metrics(metrics.clone()),
            None => runtime,
        }
    }

    fn run(mut self) -> Result<ScenarioOutcome, EngineError> {
        let mut runtime = self.bootstrap();

        let scenario = self.scenario;
        for step in &scenario.steps {
            debug!(?step, "Scenario step");
            runtime = self.apply(runtime, step)?;
        }

        let fired = self.log.borrow().clone();
        let outcome = ScenarioOutcome {
            hash: firing_log_hash(&fired),
            fired,
            frames: self.frames,
            tamper_count: runtime.clock().tamper_count(),
            live_timers: runtime.scheduler().len(),
            unresolved: self.unresolved,
        };
        runtime.shutdown()?;
        Ok(outcome)
    }

    fn apply(&mut self, mut runtime: TimingRuntime, step: &Step) -> Result<TimingRuntime, EngineError> {
        match step {
            Step::ScheduleAfter(spec) => {
                let handle = runtime.scheduler_mut().schedule_after(
                    spec.domain,
                    spec.delay_ms,
                    spec.callback_id(),
                    labels_of(spec),
                );
                self.remember(spec, handle);
            }
            Step::ScheduleEvery(spec) => {
                let handle = runtime.scheduler_mut().schedule_every(
                    spec.domain,
                    spec.interval_ms,
                    spec.callback_id(),
                    labels_of(spec),
                )?;
                self.remember(spec, handle);
            }
            Step::ScheduleAt(spec) => {
                let epoch_ms = runtime.now_ms(DomainKind::Real).saturating_add(spec.offset_ms);
                let handle = runtime.scheduler_mut().schedule_at_absolute(
                    epoch_ms,
                    spec.callback_id(),
                    labels_of(spec),
                );
                self.remember(spec, handle);
            }
            Step::Frames { count, frame_ms } => {
                for _ in 0..*count {
                    let ms = match frame_ms {
                        Some(ms) => *ms as i64,
                        None => self.frame_clock.next_ms(),
                    };
                    self.device.elapse_ms(ms);
                    let report = runtime.frame(self.tick.frame(ms as f64 / 1_000.0));
                    self.unresolved += report.unresolved;
                    self.frames += 1;
                }
            }
            Step::Suspend { ms } => {
                runtime.on_pause()?;
                self.device.suspend(*ms);
            }
            Step::PauseTicks => self.tick.set_paused(true),
            Step::ResumeTicks => self.tick.set_paused(false),
            Step::TimeScale(scale) => self.tick.set_time_scale(*scale),
            Step::Pause(label) => {
                let handle = self.handle(label)?;
                runtime.scheduler_mut().pause(handle);
            }
            Step::Resume(label) => {
                let handle = self.handle(label)?;
                runtime.scheduler_mut().resume(handle);
            }
            Step::Cancel(label) => {
                let handle = self.handle(label)?;
                runtime.scheduler_mut().cancel(handle);
            }
            Step::PauseGroup(group) => {
                runtime.scheduler_mut().pause_group(group);
            }
            Step::ResumeGroup(group) => {
                runtime.scheduler_mut().resume_group(group);
            }
            Step::CancelGroup(group) => {
                runtime.scheduler_mut().cancel_group(group);
            }
            Step::PauseTag(tag) => {
                runtime.scheduler_mut().pause_tag(tag);
            }
            Step::ResumeTag(tag) => {
                runtime.scheduler_mut().resume_tag(tag);
            }
            Step::CancelTag(tag) => {
                runtime.scheduler_mut().cancel_tag(tag);
            }
            Step::Sync { offset_ms } => {
                let trusted = self.device.wall_now_ms().saturating_add(*offset_ms);
                runtime.sync_trusted(trusted);
            }
            Step::TamperWall { offset_ms } => self.device.shift_wall(*offset_ms),
            Step::AppResume => runtime.on_resume(),
            Step::Restart => {
                runtime.shutdown()?;
                runtime = self.bootstrap();
            }
            Step::Reboot { downtime_ms } => {
                runtime.on_pause()?;
                runtime.shutdown()?;
                self.device.reboot(*downtime_ms);
                runtime = self.bootstrap();
            }
        }
        Ok(runtime)
    }

    fn remember(&mut self, spec: &ScheduleSpec, handle: TimerHandle) {
        self.handles.insert(spec.label.clone(), handle);
        self.labels.borrow_mut().insert(handle.id(), spec.label.clone());
    }

    fn handle(&self, label: &str) -> Result<TimerHandle, EngineError> {
        self.handles
            .get(label)
            .copied()
            .ok_or_else(|| EngineError::UnknownLabel(label.to_string()))
    }
}

fn labels_of(spec: &ScheduleSpec) -> TimerLabels {
    TimerLabels {
        group: spec.group.clone(),
        tags: spec.tags.clone(),
    }
}

/// Replays `scenario` against virtual clocks and an in-memory store.
#[instrument(level = "info", name = "run_scenario", skip_all, fields(seed = scenario.seed))]
pub fn run_scenario(
    scenario: &Scenario,
    options: &ScenarioOptions,
) -> Result<ScenarioOutcome, EngineError> {
    let outcome = ScenarioRun::new(scenario, options).run()?;
    info!(
        fired = outcome.fired.len(),
        frames = outcome.frames,
        hash = %outcome.hash,
        "Scenario complete"
    );
    Ok(outcome)
}

/// Writes `scenario` as YAML so a run can be replayed later.
pub fn save_scenario(path: impl AsRef<Path>, scenario: &Scenario) -> Result<(), EngineError> {
    let yaml = serde_yaml::to_string(scenario).map_err(ScenarioError::from)?;
    std::fs::write(path, yaml)?;
    Ok(())
}

/// Dumps a failed validation into `bug_report_<unix secs>.txt` under `dir`.
pub fn write_bug_report(
    dir: impl AsRef<Path>,
    scenario: &Scenario,
    outcome: &ScenarioOutcome,
    expected: &str,
) -> Result<PathBuf, EngineError> {
    let secs = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default();
    let path = dir.as_ref().join(format!("bug_report_{secs}.txt"));

    let mut report = String::new();
    let _ = writeln!(report, "seed: {}", scenario.seed);
    let _ = writeln!(report, "expected hash: {expected}");
    let _ = writeln!(report, "actual hash:   {}", outcome.hash);
    let _ = writeln!(report, "frames: {}", outcome.frames);
    let _ = writeln!(report, "firings:");
    for record in &outcome.fired {
        let _ = writeln!(report, "  {record}");
    }
    report.push_str("scenario:\n");
    report.push_str(&serde_yaml::to_string(scenario).map_err(ScenarioError::from)?);

    std::fs::write(&path, report)?;
    warn!(path = %path.display(), "Bug report written");
    Ok(path)
}

/// The stock demo: an App one-shot after 3 s, a Gameplay timer every 1 s and a
/// Real timer at trusted now + 10 s, all in group `Tests`, then `frames`
/// frames.
pub fn demo_scenario(seed: u64, frames: u32) -> Scenario {
    let spec = |label: &str, domain: DomainKind, tags: &[&str]| ScheduleSpec {
        label: label.to_string(),
        domain,
        group: Some("Tests".to_string()),
        tags: tags.iter().map(|t| t.to_string()).collect(),
        ..ScheduleSpec::default()
    };
    Scenario {
        seed,
        start_epoch_ms: urverk_simulator::device::DEFAULT_START_EPOCH_MS,
        callbacks: None,
        steps: vec![
            Step::ScheduleAfter(ScheduleSpec {
                delay_ms: 3_000,
                ..spec("app-once", DomainKind::App, &["App"])
            }),
            Step::ScheduleEvery(ScheduleSpec {
                interval_ms: 1_000,
                ..spec("gameplay-every", DomainKind::Gameplay, &["Gameplay", "UI"])
            }),
            Step::ScheduleAt(ScheduleSpec {
                offset_ms: 10_000,
                ..spec("real-at", DomainKind::Real, &["RealTime"])
            }),
            Step::Frames {
                count: frames,
                frame_ms: None,
            },
        ],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frames(count: u32, ms: u64) -> Step {
        Step::Frames {
            count,
            frame_ms: Some(ms),
        }
    }

    #[test]
    fn test_demo_runs_deterministically() {
        let options = ScenarioOptions::default();
        let a = run_scenario(&demo_scenario(42, 700), &options).unwrap();
        let b = run_scenario(&demo_scenario(42, 700), &options).unwrap();
        assert_eq!(a.hash, b.hash);
        assert_eq!(a.hash.len(), 64);
        // 700 frames of 16 ms = 11.2 s.
        assert_eq!(a.fired_count("app-once"), 1);
        assert_eq!(a.fired_count("gameplay-every"), 11);
        assert_eq!(a.fired_count("real-at"), 1);
        assert_eq!(a.live_timers, 1);
        assert!(a.validate_hash(&b.hash.to_uppercase()).is_ok());
    }

    #[test]
    fn test_hash_mismatch_is_reported() {
        let outcome = run_scenario(&demo_scenario(1, 10), &ScenarioOptions::default()).unwrap();
        assert!(matches!(
            outcome.validate_hash("00"),
            Err(EngineError::HashMismatch { .. })
        ));
    }

    #[test]
    fn test_saved_scenario_replays_identically() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("demo.yaml");
        let scenario = demo_scenario(9, 200);
        save_scenario(&path, &scenario).unwrap();

        let loaded = urverk_simulator::load_scenario(&path).unwrap();
        assert_eq!(loaded, scenario);
        let options = ScenarioOptions::default();
        assert_eq!(
            run_scenario(&loaded, &options).unwrap().hash,
            run_scenario(&scenario, &options).unwrap().hash
        );
    }

    #[test]
    fn test_bug_report_lists_firings() {
        let dir = tempfile::tempdir().unwrap();
        let scenario = demo_scenario(3, 200);
        let outcome = run_scenario(&scenario, &ScenarioOptions::default()).unwrap();
        let path = write_bug_report(dir.path(), &scenario, &outcome, "beef").unwrap();
        let report = std::fs::read_to_string(path).unwrap();
        assert!(report.contains("expected hash: beef"));
        assert!(report.contains("app-once|app|"));
    }

    #[test]
    fn test_unknown_label_is_an_error() {
        let scenario = Scenario {
            seed: 1,
            start_epoch_ms: 0,
            callbacks: None,
            steps: vec![Step::Cancel("ghost".into())],
        };
        assert!(matches!(
            run_scenario(&scenario, &ScenarioOptions::default()),
            Err(EngineError::UnknownLabel(label)) if label == "ghost"
        ));
    }

    #[test]
    fn test_pause_ticks_freezes_gameplay_only() {
        let scenario = Scenario {
            seed: 1,
            start_epoch_ms: 0,
            callbacks: None,
            steps: vec![
                Step::ScheduleEvery(ScheduleSpec {
                    label: "g".into(),
                    domain: DomainKind::Gameplay,
                    interval_ms: 100,
                    ..ScheduleSpec::default()
                }),
                Step::ScheduleEvery(ScheduleSpec {
                    label: "a".into(),
                    domain: DomainKind::App,
                    interval_ms: 100,
                    ..ScheduleSpec::default()
                }),
                Step::PauseTicks,
                frames(10, 100),
                Step::ResumeTicks,
                Step::TimeScale(0.5),
                frames(10, 100),
            ],
        };
        let outcome = run_scenario(&scenario, &ScenarioOptions::default()).unwrap();
        assert_eq!(outcome.fired_count("a"), 20);
        assert_eq!(outcome.fired_count("g"), 5);
    }

    #[test]
    fn test_unregistered_callback_is_counted() {
        let scenario = Scenario {
            seed: 1,
            start_epoch_ms: 0,
            callbacks: Some(vec![]),
            steps: vec![
                Step::ScheduleAfter(ScheduleSpec {
                    label: "orphan".into(),
                    delay_ms: 10,
                    ..ScheduleSpec::default()
                }),
                frames(1, 16),
            ],
        };
        let outcome = run_scenario(&scenario, &ScenarioOptions::default()).unwrap();
        assert!(outcome.fired.is_empty());
        assert_eq!(outcome.unresolved, 1);
        assert_eq!(outcome.live_timers, 0);
    }
}
