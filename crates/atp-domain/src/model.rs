//! The core data model shared by every crate in the workspace (§3).

use std::collections::BTreeMap;

use atp_serializer::SerializedValue;
use serde::{Deserialize, Serialize};

/// Sensitivity classification a policy can key off of.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Sensitivity {
    Public,
    Internal,
    Sensitive,
}

/// A single operation exposed to user code under the `api.{namespace}.{name}`
/// tree. Descriptors are returned verbatim by `/definitions` so a caller can
/// discover what's callable before calling `/init`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientTool {
    pub namespace: String,
    pub name: String,
    pub input_schema: serde_json::Value,
    pub metadata: ClientToolMetadata,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientToolMetadata {
    pub operation_type: String,
    #[serde(default)]
    pub sensitivity: Sensitivity,
    #[serde(default)]
    pub requires_approval: bool,
}

impl Default for Sensitivity {
    fn default() -> Self {
        Sensitivity::Internal
    }
}

impl ClientTool {
    /// The fully-qualified name used as the call-site key (`namespace.name`).
    pub fn qualified_name(&self) -> String {
        format!("{}.{}", self.namespace, self.name)
    }
}

/// The kind of pause-candidate call a `CallbackRecord` represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CallbackKind {
    Llm,
    Approval,
    Embedding,
    Progress,
    Log,
    Cache,
    ClientTool,
}

/// One entry in an execution's callback history: a single pause-candidate
/// call site, its arguments, and (once resumed) its result.
///
/// `sub_id` distinguishes parallel sub-calls inside a single batched pause
/// (§4.1's Batch Optimizer); it is `None` for ordinary, unbatched calls.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallbackRecord {
    pub sequence_number: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sub_id: Option<u32>,
    pub kind: CallbackKind,
    pub operation: String,
    pub payload: serde_json::Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<serde_json::Value>,
    pub statement_id: u32,
    pub timestamp: chrono::DateTime<chrono::Utc>,
}

impl CallbackRecord {
    pub fn is_resolved(&self) -> bool {
        self.result.is_some()
    }
}

/// A snapshot of local state taken at a statement boundary, used by the
/// State Manager (C5) to short-circuit replay and by the serializer to
/// reconstruct the execution's scope on resume.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatementSnapshot {
    pub statement_id: u32,
    pub variables: BTreeMap<String, SerializedValue>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<SerializedValue>,
    pub timestamp: chrono::DateTime<chrono::Utc>,
}

/// The full durable record of one execution (§3). Persisted by C7 keyed
/// `exec:{tenant_id}:{execution_id}`; rehydrated whole on resume.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionRecord {
    pub execution_id: String,
    pub tenant_id: String,
    pub transformed_code: String,
    pub config: serde_json::Value,
    pub callback_history: Vec<CallbackRecord>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pending_callback: Option<CallbackRecord>,
    pub statement_snapshots: Vec<StatementSnapshot>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub paused_at: Option<chrono::DateTime<chrono::Utc>>,
    pub context: serde_json::Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provenance_snapshot: Option<serde_json::Value>,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub updated_at: chrono::DateTime<chrono::Utc>,
}

impl ExecutionRecord {
    pub fn is_paused(&self) -> bool {
        self.pending_callback.is_some()
    }

    /// The sequence number the next resume must target, if any call is
    /// pending.
    pub fn expected_resume_sequence(&self) -> Option<u32> {
        self.pending_callback.as_ref().map(|c| c.sequence_number)
    }
}

/// One sub-call inside a batched pause (§4.4's parallel combinator path).
/// Carried both directions: the Sequencer emits these as the payload of a
/// batched `CallbackRecord`, and a resume supplies results keyed the same
/// way.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchSubCall {
    pub sub_id: u32,
    pub kind: CallbackKind,
    pub operation: String,
    pub payload: serde_json::Value,
}

/// What the bridge should do with a single pause-candidate call, decided
/// by whatever implements [`HostCallHandler`] (the Sequencer, C4).
#[derive(Debug, Clone)]
pub enum HostCallOutcome {
    /// A replay value (or an immediately-available result) is available;
    /// user code continues without suspending.
    Resolved(serde_json::Value),
    /// The replayed result was a tagged error; throw it into user code as
    /// a catchable exception.
    Throw(String),
    /// No replay value exists: record this as the pending callback and
    /// tear down the sandbox.
    Pause(CallbackRecord),
    /// Same as `Pause`, but for a batch site: every sub-call in the batch
    /// is bundled into one pending record.
    PauseBatch {
        sequence_number: u32,
        statement_id: u32,
        sub_calls: Vec<BatchSubCall>,
    },
}

/// The seam between the sandbox bridge (C3) and the callback sequencer
/// (C4), kept in `atp-domain` so neither crate depends on the other: the
/// bridge calls this trait on every `atp.*`/`api.*` invocation, and
/// `atp-engine`'s Sequencer is the implementation the orchestrator wires
/// in.
pub trait HostCallHandler {
    fn handle_call(
        &mut self,
        kind: CallbackKind,
        operation: &str,
        statement_id: u32,
        payload: serde_json::Value,
    ) -> HostCallOutcome;

    /// Variant for a detected batch site (§4.3 item 4 / §4.4): the bridge
    /// has already determined every sub-call's kind/operation/payload up
    /// front (they're independent, so no interleaved replay lookups are
    /// needed before issuing the batch).
    fn handle_batch(
        &mut self,
        statement_id: u32,
        sub_calls: Vec<(CallbackKind, String, serde_json::Value)>,
    ) -> HostCallOutcome;
}

/// Aggregate resource usage for one `execute`/`resume` call.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct Stats {
    pub duration_ms: u64,
    pub memory_used_bytes: u64,
    pub llm_calls: u32,
    pub approval_calls: u32,
}

/// One signed hint issued alongside a completed result (§4.6's
/// cross-boundary carrier), at the JSON path inside `value` the tagged
/// primitive sits at.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProvenanceTokenEntry {
    pub path: String,
    pub token: String,
}

/// The outcome of `execute()` or `resume()` (§4.9).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ExecutionResult {
    Completed {
        execution_id: String,
        value: serde_json::Value,
        stats: Stats,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        provenance_tokens: Vec<ProvenanceTokenEntry>,
    },
    Paused {
        execution_id: String,
        pending_callback: CallbackRecord,
    },
    Failed {
        error: crate::error::ErrorKind,
        message: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn qualified_name_joins_namespace_and_name() {
        let tool = ClientTool {
            namespace: "crm".into(),
            name: "lookup_contact".into(),
            input_schema: serde_json::json!({}),
            metadata: ClientToolMetadata {
                operation_type: "read".into(),
                sensitivity: Sensitivity::Internal,
                requires_approval: false,
            },
        };
        assert_eq!(tool.qualified_name(), "crm.lookup_contact");
    }

    #[test]
    fn execution_record_is_paused_reflects_pending_callback() {
        let now = chrono::Utc::now();
        let mut record = ExecutionRecord {
            execution_id: "e1".into(),
            tenant_id: "t1".into(),
            transformed_code: String::new(),
            config: serde_json::json!({}),
            callback_history: vec![],
            pending_callback: None,
            statement_snapshots: vec![],
            paused_at: None,
            context: serde_json::json!({}),
            provenance_snapshot: None,
            created_at: now,
            updated_at: now,
        };
        assert!(!record.is_paused());
        record.pending_callback = Some(CallbackRecord {
            sequence_number: 3,
            sub_id: None,
            kind: CallbackKind::Llm,
            operation: "atp.llm.call".into(),
            payload: serde_json::json!({}),
            result: None,
            statement_id: 7,
            timestamp: now,
        });
        assert!(record.is_paused());
        assert_eq!(record.expected_resume_sequence(), Some(3));
    }

    #[test]
    fn callback_record_is_resolved_once_result_set() {
        let now = chrono::Utc::now();
        let mut cb = CallbackRecord {
            sequence_number: 0,
            sub_id: None,
            kind: CallbackKind::Approval,
            operation: "atp.approval.request".into(),
            payload: serde_json::json!({}),
            result: None,
            statement_id: 1,
            timestamp: now,
        };
        assert!(!cb.is_resolved());
        cb.result = Some(serde_json::json!(true));
        assert!(cb.is_resolved());
    }
}
