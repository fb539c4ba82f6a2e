//! ## urverk-telemetry::metrics
//! **Prometheus counters for timer execution and clock health**

use prometheus::{Gauge, Histogram, HistogramOpts, IntCounter, IntGauge, Registry};

#[derive(Debug, Clone)]
pub struct MetricsRecorder {
    pub registry: Registry,
    pub timers_fired: IntCounter,
    pub timers_deferred: IntCounter,
    pub unresolved_callbacks: IntCounter,
    pub tamper_signals: IntGauge,
    pub timers_live: IntGauge,
    pub fired_per_frame: Histogram,
    pub trusted_skew_ms: Gauge,
}

impl MetricsRecorder {
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let timers_fired = IntCounter::new("urverk_timers_fired_total", "Timers executed")?;
        let timers_deferred = IntCounter::new(
            "urverk_timers_deferred_total",
            "Ticks that hit the execution budget with due timers left",
        )?;
        let unresolved_callbacks = IntCounter::new(
            "urverk_unresolved_callbacks_total",
            "Fired timers whose callback id was not registered",
        )?;
        let tamper_signals = IntGauge::new(
            "urverk_tamper_signals",
            "Tamper signals recorded by the trusted clock",
        )?;
        let timers_live = IntGauge::new("urverk_timers_live", "Scheduled and paused timers")?;
        let fired_per_frame = Histogram::with_opts(
            HistogramOpts::new("urverk_fired_per_frame", "Timers executed per frame")
                .buckets(vec![0.0, 1.0, 5.0, 10.0, 50.0, 150.0]),
        )?;
        let trusted_skew_ms = Gauge::new(
            "urverk_trusted_skew_ms",
            "Device minus trusted epoch at the last sync",
        )?;

        registry.register(Box::new(timers_fired.clone()))?;
        registry.register(Box::new(timers_deferred.clone()))?;
        registry.register(Box::new(unresolved_callbacks.clone()))?;
        registry.register(Box::new(tamper_signals.clone()))?;
        registry.register(Box::new(timers_live.clone()))?;
        registry.register(Box::new(fired_per_frame.clone()))?;
        registry.register(Box::new(trusted_skew_ms.clone()))?;

        Ok(Self {
            registry,
            timers_fired,
            timers_deferred,
            unresolved_callbacks,
            tamper_signals,
            timers_live,
            fired_per_frame,
            trusted_skew_ms,
        })
    }

    pub fn gather_metrics(&self) -> Result<String, prometheus::Error> {
        use prometheus::Encoder;
        let encoder = prometheus::TextEncoder::new();
        let mut buffer = Vec::<u8>::new();
        encoder.encode(&self.registry.gather(), &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }

    /// Folds one frame's tick results into the counters.
    pub fn record_frame(&self, executed: usize, unresolved: usize, deferred: bool) {
        self.timers_fired.inc_by(executed as u64);
        self.unresolved_callbacks.inc_by(unresolved as u64);
        if deferred {
            self.timers_deferred.inc();
        }
        self.fired_per_frame.observe(executed as f64);
    }

    pub fn set_clock_state(&self, tamper_count: u32, live_timers: usize) {
        self.tamper_signals.set(i64::from(tamper_count));
        self.timers_live.set(live_timers as i64);
    }

    pub fn set_trusted_skew(&self, skew_ms: i64) {
        self.trusted_skew_ms.set(skew_ms as f64);
    }
}
