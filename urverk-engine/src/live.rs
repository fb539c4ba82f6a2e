// urverk-engine/src/live.rs

/*!
# Live Frame Loop

Drives a [`TimingRuntime`] from the host's real clock at a fixed frame rate
until the requested duration elapses or Ctrl-C arrives, then saves.

Callbacks are not `Send`, so the loop runs on the calling task; nothing here
is spawned.
*/

use std::time::Duration;

use tokio::time::{self, Instant, MissedTickBehavior};
use tracing::{info, instrument, warn};

use urverk_simulator::TickSource;

use crate::error::EngineError;
use crate::runtime::TimingRuntime;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LiveSummary {
    pub frames: u64,
    pub executed: usize,
    pub unresolved: usize,
    /// True when the loop ended on Ctrl-C rather than on its deadline.
    pub interrupted: bool,
}

/// Runs frames at `fps` for `duration` (forever when `None`).
#[instrument(level = "info", name = "run_live", skip(runtime, tick))]
pub async fn run_live(
    runtime: &mut TimingRuntime,
    tick: &TickSource,
    duration: Option<Duration>,
    fps: u32,
) -> Result<LiveSummary, EngineError> {
    let period = Duration::from_secs_f64(1.0 / f64::from(fps.max(1)));
    let mut interval = time::interval(period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

    let started = Instant::now();
    let deadline = duration.map(|d| started + d);
    let mut last = started;
    let mut summary = LiveSummary::default();

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    info!(?period, "Live loop started");
    loop {
        tokio::select! {
            result = &mut ctrl_c => {
                if let Err(e) = result {
                    warn!("Failed to listen for Ctrl-C: {}", e);
                }
                summary.interrupted = true;
                break;
            }
            now = interval.tick() => {
                let dt = now.saturating_duration_since(last);
                last = now;
                let report = runtime.frame(tick.frame(dt.as_secs_f64()));
                summary.frames += 1;
                summary.executed += report.executed;
                summary.unresolved += report.unresolved;
                if deadline.is_some_and(|d| now >= d) {
                    break;
                }
            }
        }
    }

    runtime.save()?;
    info!(
        frames = summary.frames,
        executed = summary.executed,
        interrupted = summary.interrupted,
        "Live loop stopped"
    );
    Ok(summary)
}
