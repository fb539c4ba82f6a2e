// urverk-engine/src/runtime.rs

/*!
# Timing Runtime

Owns the trusted clock, the three domains, the scheduler and the persistence
adapter, and drives them once per frame. Frontends (the CLI live loop, the
scenario runner, tests) construct one runtime and feed it frame deltas and
lifecycle events.

Per frame: App advances by the unscaled delta and is ticked, then Real is
ticked, then Gameplay advances by the scaled delta and is ticked.
*/

use tracing::{debug, info, instrument};

use urverk_core::clock::{MonotonicSource, TamperReason, TrustedClock, WallClock};
use urverk_core::domain::{DomainKind, Domains, FrameDelta};
use urverk_core::storage::SharedStore;
use urverk_core::timer::{CallbackRegistry, TickReport, TimerScheduler};
use urverk_storage::{LoadOutcome, TimerPersistence};
use urverk_telemetry::{EventLogger, MetricsRecorder};

use crate::error::EngineError;
use crate::settings::RuntimeSettings;

pub struct TimingRuntime {
    scheduler: TimerScheduler,
    persistence: TimerPersistence,
    max_exec_per_tick: usize,
    metrics: Option<MetricsRecorder>,
    last_load: LoadOutcome,
    tamper_reasons: Vec<TamperReason>,
}

impl TimingRuntime {
    /// Opens the trusted clock, restores persisted timers and runs the
    /// catch-up pass. `callbacks` must already hold every id persisted timers
    /// may name, or catch-up firings count as unresolved.
    #[instrument(level = "info", name = "bootstrap", skip_all)]
    pub fn bootstrap(
        settings: &RuntimeSettings,
        monotonic: impl MonotonicSource + 'static,
        wall: impl WallClock + 'static,
        store: SharedStore,
        callbacks: CallbackRegistry,
    ) -> Self {
        let clock = TrustedClock::open(settings.clock.clone(), monotonic, wall, store.clone());
        let scheduler = TimerScheduler::with_callbacks(Domains::new(clock), callbacks);
        let persistence = TimerPersistence::with_key(store, settings.timers_key.clone())
            .with_max_exec_per_tick(settings.max_exec_per_tick);

        let mut runtime = Self {
            scheduler,
            persistence,
            max_exec_per_tick: settings.max_exec_per_tick,
            metrics: None,
            last_load: LoadOutcome::default(),
            tamper_reasons: Vec::new(),
        };
        runtime.last_load = runtime.persistence.load(&mut runtime.scheduler);
        runtime.collect_tamper_signals();
        info!(
            restored = runtime.last_load.restored,
            caught_up = runtime.last_load.executed(),
            bootstrapped_clock = runtime.clock().is_bootstrapped(),
            "Timing runtime ready"
        );
        runtime
    }

    /// Attaches a recorder; counters are updated from every frame.
    pub fn with_metrics(mut self, metrics: MetricsRecorder) -> Self {
        metrics.record_frame(
            self.last_load.executed(),
            self.last_load.catch_up.unresolved,
            self.last_load.catch_up.deferred,
        );
        self.metrics = Some(metrics);
        self.update_gauges();
        self
    }

    /// Runs one update cycle.
    pub fn frame(&mut self, delta: FrameDelta) -> TickReport {
        let max = self.max_exec_per_tick;
        let mut report = TickReport::default();

        self.scheduler.domains_mut().app.advance(delta.unscaled_secs);
        report.merge(self.scheduler.tick(DomainKind::App, max));
        report.merge(self.scheduler.tick(DomainKind::Real, max));

        self.scheduler.domains_mut().gameplay.advance(delta.scaled_secs);
        report.merge(self.scheduler.tick(DomainKind::Gameplay, max));

        self.collect_tamper_signals();
        if let Some(metrics) = &self.metrics {
            metrics.record_frame(report.executed, report.unresolved, report.deferred);
        }
        self.update_gauges();
        report
    }

    /// The host is going to background: persist everything.
    pub fn on_pause(&mut self) -> Result<(), EngineError> {
        debug!("Application paused");
        self.save()
    }

    /// The host regained the foreground.
    pub fn on_resume(&mut self) {
        debug!("Application resumed");
        self.scheduler.domains_mut().clock_mut().on_resume();
        self.collect_tamper_signals();
        self.update_gauges();
    }

    /// Re-baselines the trusted clock on an authoritative epoch.
    #[instrument(level = "info", name = "sync_trusted", skip(self))]
    pub fn sync_trusted(&mut self, trusted_epoch_ms: i64) {
        let clock = self.scheduler.domains_mut().clock_mut();
        clock.sync(trusted_epoch_ms);
        let skew = clock
            .snapshot()
            .device_epoch_ms_at_sync
            .saturating_sub(trusted_epoch_ms);
        if let Some(metrics) = &self.metrics {
            metrics.set_trusted_skew(skew);
        }
        self.collect_tamper_signals();
        self.update_gauges();
    }

    #[instrument(level = "debug", name = "save", skip_all)]
    pub fn save(&self) -> Result<(), EngineError> {
        self.persistence.save(&self.scheduler)?;
        Ok(())
    }

    /// Final save before the runtime is dropped.
    pub fn shutdown(self) -> Result<(), EngineError> {
        self.save()?;
        info!(live_timers = self.scheduler.len(), "Timing runtime shut down");
        Ok(())
    }

    pub fn now_ms(&mut self, domain: DomainKind) -> i64 {
        self.scheduler.now_ms(domain)
    }

    pub fn scheduler(&self) -> &TimerScheduler {
        &self.scheduler
    }

    pub fn scheduler_mut(&mut self) -> &mut TimerScheduler {
        &mut self.scheduler
    }

    pub fn clock(&self) -> &TrustedClock {
        self.scheduler.domains().clock()
    }

    pub fn last_load(&self) -> LoadOutcome {
        self.last_load
    }

    /// Every tamper signal raised since bootstrap, oldest first.
    pub fn tamper_reasons(&self) -> &[TamperReason] {
        &self.tamper_reasons
    }

    pub fn metrics(&self) -> Option<&MetricsRecorder> {
        self.metrics.as_ref()
    }

    fn collect_tamper_signals(&mut self) {
        let reasons = self.scheduler.domains_mut().clock_mut().take_tamper_reasons();
        if reasons.is_empty() {
            return;
        }
        let count = self.clock().tamper_count();
        for reason in &reasons {
            EventLogger::log_tamper_signal(&reason.to_string(), count);
        }
        self.tamper_reasons.extend(reasons);
    }

    fn update_gauges(&self) {
        if let Some(metrics) = &self.metrics {
            metrics.set_clock_state(self.clock().tamper_count(), self.scheduler.len());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use std::rc::Rc;
    use std::sync::Arc;
    use tracing_test::traced_test;
    use urverk_core::clock::{VirtualMonotonic, VirtualWallClock};
    use urverk_core::storage::MemoryStore;
    use urverk_core::timer::TimerLabels;

    const T0: i64 = 1_700_000_000_000;

    struct Rig {
        mono: VirtualMonotonic,
        wall: VirtualWallClock,
        store: Arc<MemoryStore>,
        fired: Rc<Cell<u32>>,
    }

    impl Rig {
        fn new() -> Self {
            Self {
                mono: VirtualMonotonic::millis(),
                wall: VirtualWallClock::new(T0),
                store: MemoryStore::shared(),
                fired: Rc::new(Cell::new(0)),
            }
        }

        fn runtime(&self) -> TimingRuntime {
            let mut callbacks = CallbackRegistry::new();
            let fired = self.fired.clone();
            callbacks.register_fn("cb", move || fired.set(fired.get() + 1));
            TimingRuntime::bootstrap(
                &RuntimeSettings::default(),
                self.mono.clone(),
                self.wall.clone(),
                self.store.clone(),
                callbacks,
            )
        }
    }

    #[test]
    fn test_frame_drives_app_and_gameplay() {
        let rig = Rig::new();
        let mut runtime = rig.runtime();
        let scheduler = runtime.scheduler_mut();
        scheduler.schedule_after(DomainKind::App, 1_000, "cb", TimerLabels::none());
        scheduler.schedule_after(DomainKind::Gameplay, 1_000, "cb", TimerLabels::none());

        // Gameplay paused: only App moves.
        let report = runtime.frame(FrameDelta::new(1.0, 0.0));
        assert_eq!(report.executed, 1);
        assert_eq!(runtime.now_ms(DomainKind::Gameplay), 0);

        runtime.frame(FrameDelta::new(1.0, 1.0));
        assert_eq!(rig.fired.get(), 2);
    }

    #[test]
    fn test_real_timer_fires_from_frame() {
        let rig = Rig::new();
        let mut runtime = rig.runtime();
        runtime
            .scheduler_mut()
            .schedule_at_absolute(T0 + 500, "cb", TimerLabels::none());
        rig.mono.advance_ms(500);
        runtime.frame(FrameDelta::uniform(0.0));
        assert_eq!(rig.fired.get(), 1);
    }

    #[traced_test]
    #[test]
    fn test_pause_persists_and_restart_catches_up() {
        let rig = Rig::new();
        {
            let mut runtime = rig.runtime();
            runtime
                .scheduler_mut()
                .schedule_every(DomainKind::Real, 1_000, "cb", TimerLabels::none())
                .unwrap();
            runtime.on_pause().unwrap();
        }
        rig.mono.advance_ms(5_400);
        rig.wall.advance_ms(5_400);

        let runtime = rig.runtime();
        assert_eq!(runtime.last_load().restored, 1);
        assert_eq!(runtime.last_load().executed(), 1);
        assert_eq!(rig.fired.get(), 1);
        assert!(logs_contain("Timing runtime ready"));
    }

    #[test]
    fn test_sync_skew_is_collected() {
        let rig = Rig::new();
        let mut runtime = rig.runtime().with_metrics(MetricsRecorder::new().unwrap());
        runtime.sync_trusted(T0 + 11 * 60_000);
        assert!(matches!(
            runtime.tamper_reasons(),
            [TamperReason::SyncSkew { .. }]
        ));
        let metrics = runtime.metrics().unwrap();
        assert_eq!(metrics.tamper_signals.get(), 1);
        assert_eq!(metrics.trusted_skew_ms.get(), -660_000.0);
    }

    #[test]
    fn test_resume_after_wall_jump_flags() {
        let rig = Rig::new();
        let mut runtime = rig.runtime();
        rig.wall.advance_ms(6 * 60_000);
        runtime.on_resume();
        assert_eq!(runtime.clock().tamper_count(), 1);
    }

    #[test]
    fn test_metrics_follow_frames() {
        let rig = Rig::new();
        let mut runtime = rig.runtime().with_metrics(MetricsRecorder::new().unwrap());
        runtime
            .scheduler_mut()
            .schedule_after(DomainKind::App, 10, "missing", TimerLabels::none());
        runtime
            .scheduler_mut()
            .schedule_after(DomainKind::App, 10_000, "cb", TimerLabels::none());
        runtime.frame(FrameDelta::uniform(0.5));

        let metrics = runtime.metrics().unwrap();
        assert_eq!(metrics.timers_fired.get(), 1);
        assert_eq!(metrics.unresolved_callbacks.get(), 1);
        assert_eq!(metrics.timers_live.get(), 1);
    }
}
