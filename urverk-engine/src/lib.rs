//! ## urverk-engine
//! **Timing runtime and its drivers**
//!
//! [`TimingRuntime`] wires the trusted clock, domains, scheduler and
//! persistence together. Frontends drive it through the live loop
//! ([`run_live`]) or the deterministic scenario runner ([`run_scenario`]).

pub mod error;
pub mod live;
pub mod runtime;
pub mod scenario;
pub mod settings;

pub use error::EngineError;
pub use live::{run_live, LiveSummary};
pub use runtime::TimingRuntime;
pub use scenario::{
    demo_scenario, firing_log_hash, run_scenario, save_scenario, write_bug_report, FiringRecord,
    ScenarioOptions, ScenarioOutcome,
};
pub use settings::{open_store, RuntimeSettings};

pub mod prelude {
    pub use crate::error::EngineError;
    pub use crate::live::{run_live, LiveSummary};
    pub use crate::runtime::TimingRuntime;
    pub use crate::scenario::{run_scenario, ScenarioOptions, ScenarioOutcome};
    pub use crate::settings::{open_store, RuntimeSettings};
}
