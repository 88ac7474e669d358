//! The execution engine: the Callback Sequencer (C4) and the Execution
//! Orchestrator (C9) that drives a transformed script through the sandbox
//! bridge (`atp-sandbox`) to completion, pause, or failure.

pub mod batch_sites;
pub mod orchestrator;
pub mod sequencer;
pub mod state_manager;

pub use orchestrator::{CallbackResult, Orchestrator, ResumeInput, RunContext};
pub use sequencer::{ProvenanceLookup, ReplayEntry, Sequencer, SequencerHandle};
pub use state_manager::StateManager;
