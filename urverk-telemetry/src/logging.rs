//! ## urverk-telemetry::logging
//! **Structured logging via `tracing`**
//!
//! `RUST_LOG` takes precedence over the configured level.

use tracing::{info_span, warn};
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Clone)]
pub struct EventLogger;

impl EventLogger {
    /// Installs the global subscriber. Returns `false` if one was already set.
    pub fn init(level: &str) -> bool {
        fmt()
            .with_env_filter(
                EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level)),
            )
            .with_thread_names(true)
            .with_span_events(FmtSpan::NONE)
            .try_init()
            .is_ok()
    }

    /// Emits one tamper signal inside a `tamper_signal` span.
    #[inline]
    pub fn log_tamper_signal(reason: &str, tamper_count: u32) {
        let span = info_span!("tamper_signal", tamper_count);
        let _guard = span.enter();
        warn!(reason, "Trusted clock reported a tamper signal");
    }
}
