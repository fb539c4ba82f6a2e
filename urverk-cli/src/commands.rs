use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;
use chrono::{DateTime, SecondsFormat};
use clap::{Args, Parser, Subcommand};
use tracing::{error, info};

use urverk_config::UrverkConfig;
use urverk_core::clock::{MonotonicSource, SystemMonotonic, SystemWallClock, TrustedClock};
use urverk_core::domain::DomainKind;
use urverk_core::format;
use urverk_core::timer::{CallbackRegistry, TimerHandle, TimerLabels, TimerScheduler};
use urverk_engine::{
    demo_scenario, open_store, run_live, run_scenario, save_scenario, write_bug_report,
    RuntimeSettings, ScenarioOptions, TimingRuntime,
};
use urverk_simulator::{load_scenario, TickSource};
use urverk_storage::{TimerPersistence, TimerRecord};
use urverk_telemetry::{EventLogger, MetricsRecorder};

const HEARTBEAT: &str = "heartbeat";

#[derive(Parser)]
#[command(version, about)]
pub struct Cli {
    /// Configuration file; defaults to config/urverk.yaml plus the
    /// URVERK_ENV overlay
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Drive the runtime from the host clocks at a fixed frame rate
    Run(RunArgs),
    /// Replay a scenario (or the stock demo) against virtual clocks
    Simulate(SimulateArgs),
    /// Run the demo over consecutive seeds and check each replays identically
    Sweep(SweepArgs),
    /// Print the persisted trusted clock and timers
    Inspect,
    /// Re-baseline the trusted clock on an authoritative epoch
    Sync(SyncArgs),
}

#[derive(Args, Debug, Clone)]
pub struct RunArgs {
    /// Stop after this many seconds; runs until Ctrl-C when omitted
    #[arg(long)]
    pub seconds: Option<u64>,
    #[arg(long, default_value_t = 60)]
    pub fps: u32,
    /// Interval of the App-domain heartbeat timer
    #[arg(long, default_value_t = 1_000)]
    pub heartbeat_ms: i64,
}

#[derive(Args, Debug, Clone)]
pub struct SimulateArgs {
    /// Scenario file to replay; the stock demo runs when omitted
    #[arg(short, long)]
    pub scenario: Option<PathBuf>,
    /// Frames the demo runs for
    #[arg(long, default_value_t = 1_000)]
    pub frames: u32,
    /// Overrides the scenario or configured seed
    #[arg(long)]
    pub seed: Option<u64>,
    #[arg(long)]
    pub jitter_ms: Option<u64>,
    #[arg(long)]
    pub validate_hash: Option<String>,
    /// Write the scenario that ran to this file
    #[arg(long)]
    pub save: Option<PathBuf>,
    /// Print every firing
    #[arg(short, long)]
    pub verbose: bool,
}

#[derive(Args, Debug, Clone)]
pub struct SweepArgs {
    #[arg(long, default_value_t = 1)]
    pub seed: u64,
    #[arg(long, default_value_t = 100)]
    pub iterations: u64,
    #[arg(long, default_value_t = 1_000)]
    pub frames: u32,
}

#[derive(Args, Debug, Clone)]
pub struct SyncArgs {
    /// Authoritative Unix epoch milliseconds
    #[arg(long)]
    pub epoch_ms: i64,
}

pub async fn run_command(cli: Cli) -> anyhow::Result<()> {
    let config = match &cli.config {
        Some(path) => UrverkConfig::load_from_path(path),
        None => UrverkConfig::load(),
    }
    .context("Failed to load configuration")?;
    EventLogger::init(&config.telemetry.log_level);

    let metrics = if config.telemetry.metrics_enabled {
        Some(MetricsRecorder::new().context("Failed to register metrics")?)
    } else {
        None
    };

    match cli.command {
        Commands::Run(args) => run_mode(args, &config, metrics).await,
        Commands::Simulate(args) => simulate_mode(args, &config, metrics),
        Commands::Sweep(args) => sweep_mode(args, &config),
        Commands::Inspect => inspect(&config),
        Commands::Sync(args) => sync(args, &config),
    }
}

async fn run_mode(
    args: RunArgs,
    config: &UrverkConfig,
    metrics: Option<MetricsRecorder>,
) -> anyhow::Result<()> {
    let settings = RuntimeSettings::from(config);
    let store = open_store(&config.storage)?;

    let mut callbacks = CallbackRegistry::new();
    callbacks.register(HEARTBEAT, |scheduler: &mut TimerScheduler, handle: TimerHandle| {
        let app_ms = scheduler.now_ms(DomainKind::App);
        info!(%handle, app_ms, "Heartbeat");
    });

    let mut runtime = TimingRuntime::bootstrap(
        &settings,
        SystemMonotonic,
        SystemWallClock,
        store,
        callbacks,
    );
    if let Some(metrics) = metrics.clone() {
        runtime = runtime.with_metrics(metrics);
    }
    if runtime.scheduler().group_members(HEARTBEAT).is_empty() {
        runtime.scheduler_mut().schedule_every(
            DomainKind::App,
            args.heartbeat_ms,
            HEARTBEAT,
            TimerLabels::none().group(HEARTBEAT),
        )?;
    }

    let summary = run_live(
        &mut runtime,
        &TickSource::new(),
        args.seconds.map(Duration::from_secs),
        args.fps,
    )
    .await?;
    runtime.shutdown()?;

    println!(
        "{} frames, {} timers fired, {} unresolved",
        summary.frames, summary.executed, summary.unresolved
    );
    if let Some(metrics) = metrics {
        print!("{}", metrics.gather_metrics()?);
    }
    Ok(())
}

fn simulate_mode(
    args: SimulateArgs,
    config: &UrverkConfig,
    metrics: Option<MetricsRecorder>,
) -> anyhow::Result<()> {
    let mut scenario = match &args.scenario {
        Some(path) => {
            info!("Replaying scenario from file: {}", path.display());
            load_scenario(path)?
        }
        None => demo_scenario(config.simulator.seed, args.frames),
    };
    if let Some(seed) = args.seed {
        scenario.seed = seed;
    }

    let options = ScenarioOptions {
        settings: RuntimeSettings::from(config),
        frame_ms: config.simulator.frame_ms,
        jitter_ms: args.jitter_ms.unwrap_or(config.simulator.jitter_ms),
        metrics,
    };
    let outcome = run_scenario(&scenario, &options)?;

    if let Some(path) = &args.save {
        save_scenario(path, &scenario)?;
        info!("Scenario written to {}", path.display());
    }
    if args.verbose {
        for record in &outcome.fired {
            println!("{record}");
        }
    }
    println!(
        "{} firings over {} frames, {} live timers, tamper count {}",
        outcome.fired.len(),
        outcome.frames,
        outcome.live_timers,
        outcome.tamper_count
    );
    println!("State hash: {}", outcome.hash);

    if let Some(expected) = &args.validate_hash {
        if let Err(e) = outcome.validate_hash(expected) {
            let report = write_bug_report(".", &scenario, &outcome, expected)?;
            error!("{e}, report at {}", report.display());
            return Err(e.into());
        }
        println!("Hash validated");
    }
    Ok(())
}

fn sweep_mode(args: SweepArgs, config: &UrverkConfig) -> anyhow::Result<()> {
    let options = ScenarioOptions {
        settings: RuntimeSettings::from(config),
        frame_ms: config.simulator.frame_ms,
        jitter_ms: config.simulator.jitter_ms.max(1),
        metrics: None,
    };
    for seed in args.seed..args.seed.saturating_add(args.iterations) {
        let scenario = demo_scenario(seed, args.frames);
        let first = run_scenario(&scenario, &options)?;
        let second = run_scenario(&scenario, &options)?;
        if let Err(e) = second.validate_hash(&first.hash) {
            let report = write_bug_report(".", &scenario, &second, &first.hash)?;
            error!(seed, "Replay diverged, report at {}", report.display());
            return Err(e.into());
        }
    }
    println!("{} seeds replayed identically", args.iterations);
    Ok(())
}

fn inspect(config: &UrverkConfig) -> anyhow::Result<()> {
    let settings = RuntimeSettings::from(config);
    let store = open_store(&config.storage)?;

    let trusted_now = match TrustedClock::read_snapshot(&store, &settings.clock.snapshot_key) {
        Some(snapshot) => {
            let now = snapshot
                .trusted_epoch_ms_at_sync
                .saturating_add(snapshot.elapsed_ms(SystemMonotonic.ticks()));
            println!("Trusted now:     {}", epoch_to_rfc3339(now));
            println!(
                "Last synced:     {}",
                epoch_to_rfc3339(snapshot.trusted_epoch_ms_at_sync)
            );
            println!("Tamper count:    {}", snapshot.tamper_count);
            Some(now)
        }
        None => {
            println!("No trusted clock baseline");
            None
        }
    };

    let persistence = TimerPersistence::with_key(store, settings.timers_key);
    let Some(state) = persistence.read_state() else {
        println!("No persisted timers");
        return Ok(());
    };
    let (app_ms, gameplay_ms) = state
        .domains
        .map(|d| (d.app_ms, d.gameplay_ms))
        .unwrap_or_default();
    println!(
        "App time:        {}",
        format::hh_mm_ss(format::ceil_secs(app_ms))
    );
    println!(
        "Gameplay time:   {}",
        format::hh_mm_ss(format::ceil_secs(gameplay_ms))
    );
    println!("Timers:          {}", state.timers.len());

    for timer in &state.timers {
        let now = match timer.domain {
            DomainKind::Real => trusted_now,
            DomainKind::App => Some(app_ms),
            DomainKind::Gameplay => Some(gameplay_ms),
        };
        println!("  {}", describe(timer, now));
    }
    Ok(())
}

fn describe(timer: &TimerRecord, now_ms: Option<i64>) -> String {
    let remaining = if timer.paused {
        format!(
            "paused, {} left",
            format::compact(format::ceil_secs(timer.remaining_ms_when_paused))
        )
    } else {
        match now_ms {
            Some(now) => format!(
                "due in {}",
                format::compact(format::ceil_secs(timer.due_ms.saturating_sub(now).max(0)))
            ),
            None => format!("due at {}", timer.due_ms),
        }
    };
    let every = if timer.interval_ms > 0 {
        format!(" every {}", format::compact(format::ceil_secs(timer.interval_ms)))
    } else {
        String::new()
    };
    let group = timer
        .group
        .as_deref()
        .map(|g| format!(" group={g}"))
        .unwrap_or_default();
    format!(
        "#{} {} '{}' {}{}{}",
        timer.id, timer.domain, timer.callback_id, remaining, every, group
    )
}

fn sync(args: SyncArgs, config: &UrverkConfig) -> anyhow::Result<()> {
    let settings = RuntimeSettings::from(config);
    let store = open_store(&config.storage)?;
    let mut clock = TrustedClock::open(settings.clock, SystemMonotonic, SystemWallClock, store);

    clock.sync(args.epoch_ms);
    for reason in clock.take_tamper_reasons() {
        EventLogger::log_tamper_signal(&reason.to_string(), clock.tamper_count());
    }
    println!(
        "Trusted clock synced to {} (tamper count {})",
        epoch_to_rfc3339(args.epoch_ms),
        clock.tamper_count()
    );
    Ok(())
}

fn epoch_to_rfc3339(epoch_ms: i64) -> String {
    DateTime::from_timestamp_millis(epoch_ms)
        .map(|t| t.to_rfc3339_opts(SecondsFormat::Millis, true))
        .unwrap_or_else(|| format!("{epoch_ms} ms"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    fn timer(paused: bool) -> TimerRecord {
        TimerRecord {
            id: 3,
            domain: DomainKind::App,
            due_ms: 65_500,
            interval_ms: 0,
            paused,
            remaining_ms_when_paused: 90_000,
            callback_id: "boost".into(),
            group: Some("Shop".into()),
            tags: None,
        }
    }

    #[test]
    fn test_cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_simulate_flags() {
        let cli = Cli::parse_from([
            "urverk",
            "simulate",
            "--frames",
            "20",
            "--seed",
            "7",
            "--validate-hash",
            "ab",
        ]);
        let Commands::Simulate(args) = cli.command else {
            panic!("expected simulate");
        };
        assert_eq!(args.frames, 20);
        assert_eq!(args.seed, Some(7));
        assert_eq!(args.validate_hash.as_deref(), Some("ab"));
    }

    #[test]
    fn test_describe_rounds_remaining_up() {
        assert_eq!(
            describe(&timer(false), Some(1_000)),
            "#3 app 'boost' due in 1m 5s group=Shop"
        );
        assert_eq!(
            describe(&timer(true), Some(1_000)),
            "#3 app 'boost' paused, 1m 30s left group=Shop"
        );
    }

    #[test]
    fn test_epoch_formatting() {
        assert_eq!(
            epoch_to_rfc3339(1_700_000_000_000),
            "2023-11-14T22:13:20.000Z"
        );
    }
}
