//! The pause-signal mechanism (§4.2, §4.4).
//!
//! `boa_engine` runs a script synchronously to completion; there's no
//! native way to suspend a script mid-evaluation and hand control back to
//! async Rust. Instead, every injected `atp.*`/`api.*` host function
//! consults the Sequencer before doing anything else. When the Sequencer
//! says "record this call and pause", the host function stashes the
//! pending callback here and returns [`PAUSE_SENTINEL`] as an ordinary
//! value, never as a thrown error — the generated leaf wrapper
//! (`prelude::leaf_fn`) recognizes that value and responds by awaiting a
//! promise that never settles, so the suspension can never be intercepted
//! by a user `try`/`catch`. `Bridge::run` drains the job queue (which can
//! never progress past a permanently-pending await) and then checks this
//! cell; if it's populated, the outcome is `Paused` rather than whatever
//! the top-level promise's state happens to be — the sandbox is torn down
//! either way, matching how the orchestrator already handles a paused
//! execution.

use std::cell::RefCell;
use std::rc::Rc;

use atp_domain::model::CallbackRecord;

#[derive(Clone, Default)]
pub struct PauseState(Rc<RefCell<Option<CallbackRecord>>>);

impl PauseState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn signal(&self, pending: CallbackRecord) {
        *self.0.borrow_mut() = Some(pending);
    }

    pub fn take(&self) -> Option<CallbackRecord> {
        self.0.borrow_mut().take()
    }

    pub fn is_set(&self) -> bool {
        self.0.borrow().is_some()
    }
}

/// The value every pause-triggering host call returns in place of its
/// usual JSON result. Returned, never thrown, so it reaches the calling JS
/// as plain data rather than an exception — see `prelude::leaf_fn`.
pub const PAUSE_SENTINEL: &str = "__atp_pause__";

#[cfg(test)]
mod tests {
    use super::*;
    use atp_domain::model::CallbackKind;

    fn sample() -> CallbackRecord {
        CallbackRecord {
            sequence_number: 0,
            sub_id: None,
            kind: CallbackKind::Llm,
            operation: "atp.llm.call".into(),
            payload: serde_json::json!({}),
            result: None,
            statement_id: 0,
            timestamp: chrono::Utc::now(),
        }
    }

    #[test]
    fn signal_then_take_round_trips() {
        let state = PauseState::new();
        assert!(!state.is_set());
        state.signal(sample());
        assert!(state.is_set());
        let taken = state.take();
        assert!(taken.is_some());
        assert!(!state.is_set());
    }

    #[test]
    fn take_without_signal_is_none() {
        let state = PauseState::new();
        assert!(state.take().is_none());
    }
}
