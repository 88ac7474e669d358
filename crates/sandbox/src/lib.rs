//! The Sandbox Host Bridge (C3, §4.2): mediates between the host process
//! and a `boa_engine`-backed sandbox. Injects `atp.*`/`api.*` host
//! functions, enforces resource limits, and converts a pausing call into a
//! recognizable `Paused` outcome instead of a hard failure.

pub mod bridge;
pub mod limits;
pub mod prelude;
pub mod signal;

pub use bridge::{Bridge, BridgeOutcome};
pub use limits::{AllocationCounter, LlmCallCounter};
pub use prelude::build_prelude;
pub use signal::{PauseState, PAUSE_SENTINEL};
