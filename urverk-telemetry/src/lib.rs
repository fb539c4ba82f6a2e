//! # urverk telemetry
//!
//! Logging initialisation and Prometheus metrics for scheduler and clock
//! activity.

pub mod logging;
pub mod metrics;

pub use logging::EventLogger;
pub use metrics::MetricsRecorder;
