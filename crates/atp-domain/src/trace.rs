use serde::Serialize;

/// Structured trace events emitted across the workspace.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event")]
pub enum TraceEvent {
    ExecutionStarted {
        execution_id: String,
        tenant_id: String,
        code_bytes: usize,
    },
    ExecutionPaused {
        execution_id: String,
        sequence_number: u32,
        operation: String,
        batch_size: Option<u32>,
    },
    ExecutionResumed {
        execution_id: String,
        sequence_number: u32,
        replayed_statements: usize,
    },
    ExecutionCompleted {
        execution_id: String,
        duration_ms: u64,
        llm_calls: u32,
    },
    ExecutionFailed {
        execution_id: String,
        error_kind: String,
        message: String,
    },
    PolicyDecision {
        execution_id: String,
        policy: String,
        operation: String,
        decision: String,
    },
    ProvenanceTokenIssued {
        execution_id: String,
        origin: String,
        reader_count: usize,
    },
    SessionTokenIssued {
        tenant_id: String,
        expires_at: String,
    },
    SessionTokenRejected {
        reason: String,
    },
    StoreGcSweep {
        expired_count: usize,
        duration_ms: u64,
    },
}

impl TraceEvent {
    pub fn emit(&self) {
        let json = serde_json::to_string(self).unwrap_or_default();
        tracing::info!(trace_event = %json, "atp_event");
    }
}
