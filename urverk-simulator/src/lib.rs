// urverk-simulator/src/lib.rs

/*!
# urverk Simulator

Deterministic drivers for the timing runtime: a pause- and timescale-aware
tick source, seeded frame-time jitter, controllable device clocks, and the
YAML scenario model replayed by the engine.

## Key Components:
- **Tick Source:** turns an unscaled frame duration into App/Gameplay deltas.
- **Frame Clock:** seeded `frame_ms ± jitter_ms` generator.
- **Virtual Device:** monotonic counter and wall clock under explicit control
  (suspension, reboot, manual clock changes).
- **Scenario:** ordered steps loaded from YAML.
*/

pub mod device;
pub mod frame_clock;
pub mod scenario;
pub mod tick;

pub use device::VirtualDevice;
pub use frame_clock::FrameClock;
pub use scenario::{load_scenario, Scenario, ScenarioError, ScheduleSpec, Step};
pub use tick::TickSource;
