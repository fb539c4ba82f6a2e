//! ## urverk-cli
//! **Operational interface for the timing runtime**
//! Runs the live frame loop against the host clocks, replays deterministic
//! scenarios and inspects or re-syncs persisted state.
//!
//! ### Expectations:
//! - Configuration from `config/` plus `URVERK_*` overrides
//! - Structured logs at the configured level (`RUST_LOG` wins)

use clap::Parser;

mod commands;

use commands::Cli;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    commands::run_command(cli).await
}
