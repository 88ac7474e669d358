//! The Callback Sequencer (C4, §4.4): assigns monotonic sequence numbers to
//! every pause-candidate call and satisfies them from the replay map or by
//! pausing. This is the implementation the bridge calls through
//! [`atp_domain::model::HostCallHandler`].

use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::rc::Rc;

use atp_domain::model::{
    BatchSubCall, CallbackKind, CallbackRecord, HostCallHandler, HostCallOutcome, StatementSnapshot,
};
use atp_domain::error::Error;
use atp_provenance::{PolicyContext, PolicyDecision, PolicyEngine, ProvenanceMetadata};
use atp_serializer::canonical_digest;

use crate::state_manager::StateManager;

/// One already-settled call, available to satisfy a replayed site without
/// re-pausing. Carries the operation it settled so `resolve` can confirm
/// the re-run actually reached the same call site before consuming it
/// (§4.9 step 3: a mismatch here is `replay_divergence`, not a value to
/// return).
#[derive(Debug, Clone)]
pub enum ReplayEntry {
    Value { operation: String, value: serde_json::Value },
    /// A `tool_error` result: thrown into user code as a catchable
    /// exception rather than returned (§7).
    ToolError { operation: String, message: String },
}

impl ReplayEntry {
    fn operation(&self) -> &str {
        match self {
            ReplayEntry::Value { operation, .. } => operation,
            ReplayEntry::ToolError { operation, .. } => operation,
        }
    }
}

struct OpenBatch {
    statement_id: u32,
    start_seq: u32,
    sub_calls: Vec<BatchSubCall>,
}

/// The execution's taint registry: every value the orchestrator has ever
/// tagged with [`ProvenanceMetadata`] (a verified hint token from `execute`,
/// or a client-tool/LLM result produced earlier in this run), keyed by the
/// `canonical_digest` of the tagged value itself rather than by where it
/// came from. A call's argument provenance can only be known once the
/// actual payload is in hand — a static map keyed by operation name can't
/// express "this particular field happens to carry yesterday's LLM output"
/// — so the Sequencer instead digests each leaf of the live payload and
/// looks it up here at `evaluate_policy` time (§4.6).
pub type ProvenanceLookup = HashMap<String, ProvenanceMetadata>;

/// Walks the leaves of a call's JSON payload, computing each one's
/// canonical digest and checking it against the taint registry. Object
/// keys (dotted for nested paths) become the provenance "path" a [`Policy`]
/// sees; array elements are indexed the same way.
fn collect_argument_provenance(
    payload: &serde_json::Value,
    registry: &ProvenanceLookup,
) -> Vec<(String, ProvenanceMetadata)> {
    fn walk(
        path: String,
        value: &serde_json::Value,
        registry: &ProvenanceLookup,
        out: &mut Vec<(String, ProvenanceMetadata)>,
    ) {
        if let Some(meta) = registry.get(&canonical_digest(value)) {
            out.push((path.clone(), meta.clone()));
        }
        match value {
            serde_json::Value::Object(map) => {
                for (k, v) in map {
                    let child = if path.is_empty() { k.clone() } else { format!("{path}.{k}") };
                    walk(child, v, registry, out);
                }
            }
            serde_json::Value::Array(items) => {
                for (i, v) in items.iter().enumerate() {
                    let child = format!("{path}[{i}]");
                    walk(child, v, registry, out);
                }
            }
            _ => {}
        }
    }

    let mut out = Vec::new();
    walk(String::new(), payload, registry, &mut out);
    out
}

/// Implements [`HostCallHandler`] (the seam `atp-sandbox`'s bridge drives).
/// One instance per execution attempt (fresh run, or a resume's re-run).
pub struct Sequencer {
    next_seq: u32,
    replay: HashMap<u32, ReplayEntry>,
    batch_statement_ids: HashSet<u32>,
    open_batch: Option<OpenBatch>,
    resolved: Vec<CallbackRecord>,
    policy_engine: PolicyEngine,
    destructive_operations: Vec<String>,
    recipient_keys: Vec<String>,
    provenance: ProvenanceLookup,
    /// How many sequence numbers were already settled and persisted to
    /// `callback_history` *before* this run started. A replay re-walks every
    /// one of those sequence numbers from scratch (a fresh `boa_engine::Context`
    /// always replays from statement 0), so `resolve`'s replay-hit branch must
    /// not re-emit a `CallbackRecord` for `seq < settled_before` — the
    /// orchestrator already has that record in `callback_history` and simply
    /// appends whatever `into_resolved` returns.
    settled_before: u32,
    /// Set the moment a `block` policy decision (or a denied approval) fires;
    /// checked by the orchestrator after the bridge run regardless of
    /// whether user code's own `try`/`catch` swallowed the thrown message,
    /// since a security decision must not be locally recoverable (§7).
    fatal: Option<Error>,
    /// The State Manager (C5, §4.5): captures a snapshot at every settled
    /// call site and serves `atp.cache.get`/`atp.cache.set` in-process.
    state: StateManager,
}

impl Sequencer {
    /// Fresh execution: no replay entries, `next_seq` starts at zero.
    pub fn fresh(
        policy_engine: PolicyEngine,
        destructive_operations: Vec<String>,
        recipient_keys: Vec<String>,
        batch_statement_ids: Vec<u32>,
        provenance: ProvenanceLookup,
    ) -> Self {
        Self {
            next_seq: 0,
            replay: HashMap::new(),
            batch_statement_ids: batch_statement_ids.into_iter().collect(),
            open_batch: None,
            resolved: Vec::new(),
            policy_engine,
            destructive_operations,
            recipient_keys,
            provenance,
            settled_before: 0,
            fatal: None,
            state: StateManager::fresh(),
        }
    }

    /// Resume: seed the replay map from the execution's settled history plus
    /// whatever result(s) this resume just supplied for the pending slot(s),
    /// and reseed the State Manager from the execution's persisted
    /// `statement_snapshots`. `settled_before` is the number of sequence
    /// numbers already present in `callback_history` prior to this resume —
    /// everything in `[0, settled_before)` the replay re-walks is already
    /// persisted and must not be re-emitted into `resolved`.
    pub fn replay(
        policy_engine: PolicyEngine,
        destructive_operations: Vec<String>,
        recipient_keys: Vec<String>,
        batch_statement_ids: Vec<u32>,
        provenance: ProvenanceLookup,
        replay: HashMap<u32, ReplayEntry>,
        settled_before: u32,
        existing_snapshots: Vec<StatementSnapshot>,
    ) -> Self {
        Self {
            next_seq: 0,
            replay,
            batch_statement_ids: batch_statement_ids.into_iter().collect(),
            open_batch: None,
            resolved: Vec::new(),
            policy_engine,
            destructive_operations,
            recipient_keys,
            provenance,
            settled_before,
            fatal: None,
            state: StateManager::from_existing(existing_snapshots),
        }
    }

    /// Calls newly settled during this run, in sequence order — appended to
    /// the execution's `callback_history` by the orchestrator on success.
    pub fn into_resolved(self) -> Vec<CallbackRecord> {
        self.resolved
    }

    pub fn take_fatal(&mut self) -> Option<Error> {
        self.fatal.take()
    }

    /// The State Manager's captured snapshots, persisted into the next
    /// `ExecutionRecord.statement_snapshots` on every pause.
    pub fn take_snapshots(&mut self) -> Vec<StatementSnapshot> {
        std::mem::replace(&mut self.state, StateManager::fresh()).into_snapshots()
    }

    /// An unclosed batch accumulated during a fresh run that completed
    /// without the sandbox itself ever pausing (every sub-call resolved to
    /// a provisional placeholder so the synchronous `.map()` could finish
    /// iterating) — the orchestrator must override a `Completed` bridge
    /// outcome to `Paused` using this.
    pub fn take_open_batch(&mut self) -> Option<(u32, Vec<BatchSubCall>)> {
        self.open_batch.take().map(|b| (b.statement_id, b.sub_calls))
    }

    fn next_sequence(&mut self) -> u32 {
        let seq = self.next_seq;
        self.next_seq += 1;
        seq
    }

    fn evaluate_policy(&self, operation: &str, payload: &serde_json::Value) -> PolicyDecision {
        let argument_provenance = collect_argument_provenance(payload, &self.provenance);
        let ctx = PolicyContext {
            operation,
            destructive_operations: &self.destructive_operations,
            recipient_keys: &self.recipient_keys,
            arguments: payload,
            argument_provenance: &argument_provenance,
        };
        self.policy_engine.decide(&ctx).1
    }
}

impl HostCallHandler for Sequencer {
    fn handle_call(
        &mut self,
        kind: CallbackKind,
        operation: &str,
        statement_id: u32,
        payload: serde_json::Value,
    ) -> HostCallOutcome {
        // `atp.cache.get`/`atp.cache.set` are served entirely by the State
        // Manager (C5, §4.5) — a named memoization slot, not a pause
        // candidate, so they never consume a sequence number and never
        // round-trip to the agent.
        if matches!(kind, CallbackKind::Cache) {
            return self.handle_cache(operation, statement_id, payload);
        }

        // Policy evaluation only applies at client-tool call sites (§4.6
        // describes the guarded surface as tool-call sites); the builtin
        // `atp.*` namespace carries no recipient-shaped arguments for the
        // default policy set to act on.
        if matches!(kind, CallbackKind::ClientTool) {
            match self.evaluate_policy(operation, &payload) {
                PolicyDecision::Allow | PolicyDecision::Log { .. } => {}
                PolicyDecision::Block { reason } => {
                    self.fatal = Some(Error::SecurityViolation {
                        policy: "policy".into(),
                        message: reason,
                    });
                    return HostCallOutcome::Throw("security_violation".into());
                }
                PolicyDecision::Approve { reason } => {
                    return self.gate_with_approval(kind, operation, statement_id, payload, reason);
                }
            }
        }

        self.resolve(kind, operation, statement_id, payload)
    }

    fn handle_batch(
        &mut self,
        statement_id: u32,
        sub_calls: Vec<(CallbackKind, String, serde_json::Value)>,
    ) -> HostCallOutcome {
        let start_seq = self.next_seq;
        self.next_seq += sub_calls.len() as u32;
        HostCallOutcome::PauseBatch {
            sequence_number: start_seq,
            statement_id,
            sub_calls: sub_calls
                .into_iter()
                .enumerate()
                .map(|(i, (kind, operation, payload))| BatchSubCall {
                    sub_id: i as u32,
                    kind,
                    operation,
                    payload,
                })
                .collect(),
        }
    }
}

impl Sequencer {
    /// The approval gate (§4.6's `approve` decision) is itself a
    /// pause-candidate: it consumes its own sequence number, and only once
    /// it resolves to `approved: true` does the original call get its turn.
    fn gate_with_approval(
        &mut self,
        kind: CallbackKind,
        operation: &str,
        statement_id: u32,
        payload: serde_json::Value,
        reason: String,
    ) -> HostCallOutcome {
        let gate_payload = serde_json::json!({
            "operation": operation,
            "reason": reason,
            "arguments": payload,
        });
        match self.resolve(CallbackKind::Approval, "atp.approval.request", statement_id, gate_payload) {
            HostCallOutcome::Resolved(value) => {
                let approved = value.get("approved").and_then(|v| v.as_bool()).unwrap_or(false);
                if approved {
                    self.resolve(kind, operation, statement_id, payload)
                } else {
                    self.fatal = Some(Error::ApprovalDenied);
                    HostCallOutcome::Throw("approval_denied".into())
                }
            }
            // The gate itself paused, or replayed an error, or started a
            // batch — none of those make sense for a synthesized approval
            // call, so surface whatever happened unchanged.
            other => other,
        }
    }

    /// The core replay-or-pause decision shared by ordinary calls and the
    /// approval gate.
    fn resolve(
        &mut self,
        kind: CallbackKind,
        operation: &str,
        statement_id: u32,
        payload: serde_json::Value,
    ) -> HostCallOutcome {
        if let Some(batch) = &mut self.open_batch {
            if batch.statement_id == statement_id {
                let sub_id = batch.sub_calls.len() as u32;
                batch.sub_calls.push(BatchSubCall {
                    sub_id,
                    kind,
                    operation: operation.to_string(),
                    payload,
                });
                self.next_seq += 1;
                return HostCallOutcome::Resolved(serde_json::Value::Null);
            }
        }

        let seq = self.next_sequence();

        if let Some(entry) = self.replay.get(&seq) {
            if entry.operation() != operation {
                self.fatal = Some(Error::ReplayDivergence(format!(
                    "resume diverged at sequence {seq}: expected operation \"{}\", got \"{operation}\"",
                    entry.operation()
                )));
                return HostCallOutcome::Throw("replay_divergence".into());
            }
            return match entry.clone() {
                ReplayEntry::Value { value: v, .. } => {
                    // A replay hit for `seq < settled_before` is a call site
                    // that was already settled and persisted before this
                    // run — the re-run walks through it again on its way to
                    // the next unresolved sequence, but it must not be
                    // re-emitted into `resolved`, or the orchestrator would
                    // append a duplicate record on top of the one already
                    // in `callback_history`.
                    if seq >= self.settled_before {
                        self.resolved.push(CallbackRecord {
                            sequence_number: seq,
                            sub_id: None,
                            kind,
                            operation: operation.to_string(),
                            payload: serde_json::Value::Null,
                            result: Some(v.clone()),
                            statement_id,
                            timestamp: chrono::Utc::now(),
                        });
                    }
                    self.state.record_call_result(statement_id, &v);
                    HostCallOutcome::Resolved(v)
                }
                ReplayEntry::ToolError { message, .. } => HostCallOutcome::Throw(message),
            };
        }

        if self.batch_statement_ids.contains(&statement_id) {
            self.open_batch = Some(OpenBatch {
                statement_id,
                start_seq: seq,
                sub_calls: vec![BatchSubCall {
                    sub_id: 0,
                    kind,
                    operation: operation.to_string(),
                    payload,
                }],
            });
            return HostCallOutcome::Resolved(serde_json::Value::Null);
        }

        HostCallOutcome::Pause(CallbackRecord {
            sequence_number: seq,
            sub_id: None,
            kind,
            operation: operation.to_string(),
            payload,
            result: None,
            statement_id,
            timestamp: chrono::Utc::now(),
        })
    }

    /// Serves `atp.cache.get`/`atp.cache.set` out of the State Manager: a
    /// named memoization slot, resolved in-process on every run (fresh or
    /// replay) rather than going through the pause/replay protocol above —
    /// a cache call never consumes a sequence number.
    fn handle_cache(
        &mut self,
        operation: &str,
        statement_id: u32,
        payload: serde_json::Value,
    ) -> HostCallOutcome {
        match operation {
            "atp.cache.get" => {
                let key = payload.get("key").and_then(|v| v.as_str()).unwrap_or_default();
                HostCallOutcome::Resolved(self.state.cache_get(key).unwrap_or(serde_json::Value::Null))
            }
            "atp.cache.set" => {
                let key = payload.get("key").and_then(|v| v.as_str()).unwrap_or_default().to_string();
                let value = payload.get("value").cloned().unwrap_or(serde_json::Value::Null);
                self.state.cache_set(statement_id, key, &value);
                HostCallOutcome::Resolved(serde_json::Value::Null)
            }
            _ => HostCallOutcome::Resolved(serde_json::Value::Null),
        }
    }
}

/// Shares one [`Sequencer`] between the orchestrator and the [`Bridge`](atp_sandbox::Bridge)
/// it hands a boxed [`HostCallHandler`] to. The bridge's `Context` is
/// `!Send`, so the whole run (bridge construction, evaluation, and this
/// handle) stays on one dedicated OS thread; the orchestrator reclaims the
/// `Sequencer`'s final state via [`SequencerHandle::into_inner`] once the
/// bridge — and the clone of this `Rc` it held — has been dropped.
#[derive(Clone)]
pub struct SequencerHandle(Rc<RefCell<Sequencer>>);

impl SequencerHandle {
    pub fn new(sequencer: Sequencer) -> Self {
        Self(Rc::new(RefCell::new(sequencer)))
    }

    /// Panics if a clone of this handle is still alive; callers must drop
    /// (or let go out of scope) the `Box<dyn HostCallHandler>` given to the
    /// bridge before calling this.
    pub fn into_inner(self) -> Sequencer {
        Rc::try_unwrap(self.0)
            .unwrap_or_else(|_| panic!("sequencer handle still shared with a live bridge"))
            .into_inner()
    }
}

impl HostCallHandler for SequencerHandle {
    fn handle_call(
        &mut self,
        kind: CallbackKind,
        operation: &str,
        statement_id: u32,
        payload: serde_json::Value,
    ) -> HostCallOutcome {
        self.0.borrow_mut().handle_call(kind, operation, statement_id, payload)
    }

    fn handle_batch(
        &mut self,
        statement_id: u32,
        sub_calls: Vec<(CallbackKind, String, serde_json::Value)>,
    ) -> HostCallOutcome {
        self.0.borrow_mut().handle_batch(statement_id, sub_calls)
    }
}
