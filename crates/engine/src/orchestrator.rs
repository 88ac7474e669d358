//! The Execution Orchestrator (C9, §4.9): the coordinator that wires every
//! other component together behind two public operations, `execute` and
//! `resume`. Neither touches HTTP or session auth — `atp-gateway` handles
//! the request boundary and only ever calls into this module with an
//! already-authenticated `tenant_id`.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use atp_domain::config::{Config, ProvenanceMode};
use atp_domain::error::{Error, Result};
use atp_domain::model::{
    CallbackKind, CallbackRecord, ClientTool, ExecutionRecord, HostCallHandler, ProvenanceTokenEntry,
    Sensitivity, Stats, StatementSnapshot,
};
use atp_domain::trace::TraceEvent;
use atp_provenance::{
    AuditSensitiveAccess, BlockLlmRecipients, MetadataCache, Origin, PolicyEngine,
    PreventDataExfiltration, ProvenanceMetadata, ProvenanceToken, ReaderSet, RequireUserOrigin,
    TokenPayload,
};
use atp_sandbox::{Bridge, BridgeOutcome};
use atp_serializer::canonical_digest;
use atp_store::ExecutionStore;
use atp_transform::PauseSite;

use crate::batch_sites::detect_batch_statement_ids;
use crate::sequencer::{ProvenanceLookup, ReplayEntry, Sequencer, SequencerHandle};

/// A single settled callback result, as supplied by a `resume` caller.
#[derive(Debug, Clone)]
pub enum CallbackResult {
    Value(serde_json::Value),
    /// The agent reports its tool/LLM/approval call itself failed; this
    /// becomes a catchable `tool_error` inside user code (§7).
    Error(String),
}

/// The body of a `resume` call: either one result for the pending single
/// callback, or a set of `{sub_id, result}` pairs for a pending batch.
#[derive(Debug, Clone)]
pub enum ResumeInput {
    Single(CallbackResult),
    Batch(Vec<(u32, CallbackResult)>),
}

/// Everything the orchestrator needs from the caller's session to drive one
/// run: which client tools are callable, and any provenance hints the
/// client is echoing back from a previous response.
#[derive(Debug, Clone, Default)]
pub struct RunContext {
    pub tools: Vec<ClientTool>,
    pub provenance_hints: Vec<String>,
}

fn build_policy_engine(enabled: &[String]) -> PolicyEngine {
    let mut policies: Vec<Box<dyn atp_provenance::Policy>> = Vec::new();
    for name in enabled {
        match name.as_str() {
            "prevent_data_exfiltration" => policies.push(Box::new(PreventDataExfiltration)),
            "require_user_origin" => policies.push(Box::new(RequireUserOrigin)),
            "block_llm_recipients" => policies.push(Box::new(BlockLlmRecipients)),
            "audit_sensitive_access" => policies.push(Box::new(AuditSensitiveAccess)),
            // An unknown name is a config-validation warning (§6), not a
            // fatal error here; it simply contributes no policy.
            _ => {}
        }
    }
    PolicyEngine::new(policies)
}

/// The origin a resolved callback result is tagged with, used to rebuild
/// the provenance registry fresh on every run from the execution's own
/// history (§4.6: origin tagging crosses the host/sandbox boundary as a
/// tool-call return).
fn origin_for(kind: CallbackKind, operation: &str) -> Option<Origin> {
    match kind {
        CallbackKind::Llm | CallbackKind::Embedding => {
            Some(Origin::Llm { model: operation.to_string() })
        }
        CallbackKind::ClientTool => Some(Origin::ClientTool { qualified_name: operation.to_string() }),
        CallbackKind::Approval | CallbackKind::Progress | CallbackKind::Log | CallbackKind::Cache => None,
    }
}

fn readers_for_tool(tools: &[ClientTool], qualified_name: &str) -> ReaderSet {
    match tools.iter().find(|t| t.qualified_name() == qualified_name) {
        Some(tool) if tool.metadata.sensitivity == Sensitivity::Sensitive => {
            ReaderSet::only([format!("tool:{qualified_name}")])
        }
        _ => ReaderSet::unrestricted(),
    }
}

/// Rebuild the taint registry a fresh run needs from the execution's own
/// settled history: every tool/LLM/embedding result becomes a digest-keyed
/// entry, also cached under its own id so a later hint token can reference
/// it by `metadata_ref`.
fn provenance_from_history(
    history: &[CallbackRecord],
    tools: &[ClientTool],
    cache: &MetadataCache,
    tenant_id: &str,
) -> ProvenanceLookup {
    let mut registry = HashMap::new();
    for record in history {
        let Some(result) = &record.result else { continue };
        let Some(origin) = origin_for(record.kind, &record.operation) else { continue };
        let readers = match &origin {
            Origin::ClientTool { qualified_name } => readers_for_tool(tools, qualified_name),
            _ => ReaderSet::unrestricted(),
        };
        let digest = canonical_digest(result);
        let meta = ProvenanceMetadata {
            id: format!("cb-{}", record.sequence_number),
            origin,
            readers,
            digest: None,
            dependencies: vec![],
        };
        cache.put(tenant_id, &meta.id, meta.clone());
        registry.insert(digest, meta);
    }
    registry
}

/// Walks the leaves of a completed result, matching each one's canonical
/// digest against the taint registry so token issuance knows which paths
/// are worth signing. Mirrors `sequencer::collect_argument_provenance`,
/// which is private to that module and walks call payloads rather than
/// response values.
fn walk_tagged_leaves(
    value: &serde_json::Value,
    registry: &ProvenanceLookup,
) -> Vec<(String, String, ProvenanceMetadata)> {
    fn walk(
        path: String,
        value: &serde_json::Value,
        registry: &ProvenanceLookup,
        out: &mut Vec<(String, String, ProvenanceMetadata)>,
    ) {
        let digest = canonical_digest(value);
        if let Some(meta) = registry.get(&digest) {
            out.push((path.clone(), digest, meta.clone()));
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
    walk(String::new(), value, registry, &mut out);
    out
}

/// The fields a run needs to cross the dedicated sandbox thread and come
/// back out — every one of them is `Send`, unlike the `Bridge`/`boa_engine`
/// internals that produced them.
struct RunResult {
    outcome: BridgeOutcome,
    resolved: Vec<CallbackRecord>,
    fatal: Option<Error>,
    open_batch: Option<(u32, Vec<CallbackRecord>)>,
    llm_calls_used: u32,
    memory_used: u64,
    statement_snapshots: Vec<StatementSnapshot>,
}

fn batch_sub_calls_to_records(
    statement_id: u32,
    subs: Vec<atp_domain::model::BatchSubCall>,
) -> Vec<CallbackRecord> {
    subs.into_iter()
        .map(|s| CallbackRecord {
            sequence_number: s.sub_id,
            sub_id: Some(s.sub_id),
            kind: s.kind,
            operation: s.operation,
            payload: s.payload,
            result: None,
            statement_id,
            timestamp: chrono::Utc::now(),
        })
        .collect()
}

/// Runs one transformed script to completion (or to its next pause) on a
/// dedicated OS thread, since `boa_engine::Context` holds GC pointers that
/// are not `Send` and therefore cannot cross a `tokio::task::spawn_blocking`
/// boundary directly (the usual home for blocking work, per §4.2's general
/// guidance). The thread result is handed back through a channel so the
/// async orchestrator can still bound the wait with `tokio::time::timeout`.
async fn run_sandboxed(
    sandbox_config: atp_domain::config::SandboxConfig,
    tools: Vec<ClientTool>,
    sequencer: Sequencer,
    code: String,
    pause_sites: Vec<PauseSite>,
) -> Result<RunResult> {
    let (tx, rx) = std::sync::mpsc::channel();
    let timeout_ms = sandbox_config.timeout_ms;

    std::thread::spawn(move || {
        let handle = SequencerHandle::new(sequencer);
        let handler: Box<dyn HostCallHandler> = Box::new(handle.clone());
        let result = Bridge::new(&sandbox_config, &tools, handler, &pause_sites).map(|mut bridge| {
            let outcome = bridge.run(&code);
            let llm_calls_used = bridge.llm_calls_used();
            let memory_used = bridge.memory_used();
            drop(bridge);
            let mut sequencer = handle.into_inner();
            let fatal = sequencer.take_fatal();
            let open_batch = sequencer
                .take_open_batch()
                .map(|(statement_id, subs)| (statement_id, batch_sub_calls_to_records(statement_id, subs)));
            let statement_snapshots = sequencer.take_snapshots();
            let resolved = sequencer.into_resolved();
            RunResult { outcome, resolved, fatal, open_batch, llm_calls_used, memory_used, statement_snapshots }
        });
        let _ = tx.send(result);
    });

    let join = tokio::task::spawn_blocking(move || rx.recv());
    tokio::time::timeout(Duration::from_millis(timeout_ms), join)
        .await
        .map_err(|_| Error::Timeout)?
        .map_err(|e| Error::Other(format!("sandbox thread panicked: {e}")))?
        .map_err(|e| Error::Other(format!("sandbox thread hung up: {e}")))?
}

/// The coordinator wired up by `atp-gateway` at startup; one instance is
/// shared across every tenant and request.
pub struct Orchestrator {
    store: Arc<dyn ExecutionStore>,
    provenance_cache: Arc<MetadataCache>,
    config: Config,
    provenance_secret: Vec<u8>,
}

impl Orchestrator {
    pub fn new(
        store: Arc<dyn ExecutionStore>,
        provenance_cache: Arc<MetadataCache>,
        config: Config,
        provenance_secret: Vec<u8>,
    ) -> Self {
        Self { store, provenance_cache, config, provenance_secret }
    }

    /// The backing store, exposed so the gateway can drive its own
    /// background maintenance loop (periodic `gc_sweep`, §4.7).
    pub fn store(&self) -> &Arc<dyn ExecutionStore> {
        &self.store
    }

    /// §4.9 `execute`.
    pub async fn execute(
        &self,
        tenant_id: &str,
        code: String,
        ctx: RunContext,
    ) -> Result<atp_domain::model::ExecutionResult> {
        if code.len() > self.config.server.max_code_bytes {
            return Err(Error::ValidationFailed(format!(
                "code exceeds max_code_bytes ({} > {})",
                code.len(),
                self.config.server.max_code_bytes
            )));
        }

        // Wrap once, at fresh-execute time: the wrapped form (not the
        // caller's literal text) is what gets analyzed, evaluated, and
        // persisted as `transformed_code`, so a later resume replays
        // exactly the same text this run did (§4.9 step 2).
        let wrapped = atp_transform::wrap_user_code(&code);
        let transformed = atp_transform::transform(&wrapped)?;
        let batch_statement_ids =
            detect_batch_statement_ids(&transformed.script, &transformed.interner);
        let provenance = self.verify_hints(tenant_id, &ctx.provenance_hints)?;

        let execution_id = uuid::Uuid::new_v4().to_string();
        TraceEvent::ExecutionStarted {
            execution_id: execution_id.clone(),
            tenant_id: tenant_id.to_string(),
            code_bytes: code.len(),
        }
        .emit();

        let sequencer = Sequencer::fresh(
            build_policy_engine(&self.config.policy.enabled),
            self.config.policy.destructive_operations.clone(),
            self.config.provenance.recipient_keys.clone(),
            batch_statement_ids,
            provenance,
        );

        let started = Instant::now();
        let run = run_sandboxed(
            self.config.sandbox.clone(),
            ctx.tools.clone(),
            sequencer,
            wrapped.clone(),
            transformed.pause_sites,
        )
        .await?;
        let duration_ms = started.elapsed().as_millis() as u64;

        self.finalize(tenant_id, &execution_id, wrapped, Vec::new(), &ctx.tools, run, duration_ms)
            .await
    }

    /// §4.9 `resume`.
    pub async fn resume(
        &self,
        tenant_id: &str,
        execution_id: &str,
        ctx: RunContext,
        input: ResumeInput,
    ) -> Result<atp_domain::model::ExecutionResult> {
        let Some(record) = self.store.get(tenant_id, execution_id).await? else {
            // Tenant-scoped `get` can't distinguish "wrong tenant" from
            // "doesn't exist"; the owner lookup resolves that distinction
            // so a cross-tenant resume reports `forbidden`, not `not_found`
            // (§4.8).
            if let Some(owner) = self.store.owner_tenant(execution_id).await? {
                if owner != tenant_id {
                    return Err(Error::Forbidden);
                }
            }
            return Err(Error::NotFound);
        };
        let Some(pending) = record.pending_callback.clone() else {
            return Err(Error::ValidationFailed("execution is not paused".into()));
        };

        let replay = self.build_replay_map(&record, &pending, input)?;

        let transformed = atp_transform::transform(&record.transformed_code)?;
        let batch_statement_ids =
            detect_batch_statement_ids(&transformed.script, &transformed.interner);

        let provenance =
            provenance_from_history(&record.callback_history, &ctx.tools, &self.provenance_cache, tenant_id);

        TraceEvent::ExecutionResumed {
            execution_id: execution_id.to_string(),
            sequence_number: pending.sequence_number,
            replayed_statements: record.callback_history.len(),
        }
        .emit();

        let settled_before = record.callback_history.len() as u32;
        let sequencer = Sequencer::replay(
            build_policy_engine(&self.config.policy.enabled),
            self.config.policy.destructive_operations.clone(),
            self.config.provenance.recipient_keys.clone(),
            batch_statement_ids,
            provenance,
            replay,
            settled_before,
            record.statement_snapshots.clone(),
        );

        let started = Instant::now();
        let run = run_sandboxed(
            self.config.sandbox.clone(),
            ctx.tools.clone(),
            sequencer,
            record.transformed_code.clone(),
            transformed.pause_sites,
        )
        .await?;
        let duration_ms = started.elapsed().as_millis() as u64;

        self.finalize(
            tenant_id,
            execution_id,
            record.transformed_code.clone(),
            record.callback_history.clone(),
            &ctx.tools,
            run,
            duration_ms,
        )
        .await
    }

    /// Verify every hint token the client echoed back, resolving each to
    /// its cached metadata and registering it under the hint's own
    /// `value_digest` (§4.6's cross-boundary carrier).
    fn verify_hints(&self, tenant_id: &str, hints: &[String]) -> Result<ProvenanceLookup> {
        let mut registry = HashMap::new();
        if self.config.provenance.mode == ProvenanceMode::None {
            return Ok(registry);
        }
        for hint in hints {
            let payload = ProvenanceToken::verify(&self.provenance_secret, tenant_id, hint)?;
            if let Some(meta) = self.provenance_cache.get(tenant_id, &payload.metadata_ref) {
                registry.insert(payload.value_digest.clone(), meta);
            }
        }
        Ok(registry)
    }

    /// Translate the resume body into the Sequencer's replay map: the
    /// record's own settled history (verbatim) plus the newly supplied
    /// result(s) for the pending slot(s) — single or batched.
    fn build_replay_map(
        &self,
        record: &ExecutionRecord,
        pending: &CallbackRecord,
        input: ResumeInput,
    ) -> Result<HashMap<u32, ReplayEntry>> {
        let mut replay = HashMap::new();
        for cb in &record.callback_history {
            if let Some(result) = &cb.result {
                replay.insert(
                    cb.sequence_number,
                    ReplayEntry::Value { operation: cb.operation.clone(), value: result.clone() },
                );
            }
        }

        match (pending.operation.as_str(), input) {
            ("__batch__", ResumeInput::Batch(results)) => {
                let sub_calls: Vec<atp_domain::model::BatchSubCall> =
                    serde_json::from_value(pending.payload.clone())
                        .map_err(|e| Error::ValidationFailed(format!("corrupt batch record: {e}")))?;
                if results.len() != sub_calls.len() {
                    return Err(Error::StaleResume(format!(
                        "batch expected {} sub-results, got {}",
                        sub_calls.len(),
                        results.len()
                    )));
                }
                let by_sub_id: HashMap<u32, CallbackResult> = results.into_iter().collect();
                for (i, sub) in sub_calls.iter().enumerate() {
                    let seq = pending.sequence_number + i as u32;
                    let Some(result) = by_sub_id.get(&sub.sub_id) else {
                        return Err(Error::StaleResume(format!(
                            "missing result for sub_id {}",
                            sub.sub_id
                        )));
                    };
                    replay.insert(seq, to_replay_entry(&sub.operation, result.clone()));
                }
                Ok(replay)
            }
            ("__batch__", ResumeInput::Single(_)) => Err(Error::StaleResume(
                "pending callback is a batch; expected {results:[...]}".into(),
            )),
            (_, ResumeInput::Batch(_)) => Err(Error::StaleResume(
                "pending callback is not a batch; expected {result:...}".into(),
            )),
            (_, ResumeInput::Single(result)) => {
                replay.insert(pending.sequence_number, to_replay_entry(&pending.operation, result));
                Ok(replay)
            }
        }
    }

    /// Shared tail of `execute`/`resume`: interpret the bridge's outcome,
    /// persist or delete the execution record, and shape the public
    /// `ExecutionResult`.
    async fn finalize(
        &self,
        tenant_id: &str,
        execution_id: &str,
        transformed_code: String,
        mut history: Vec<CallbackRecord>,
        tools: &[ClientTool],
        run: RunResult,
        duration_ms: u64,
    ) -> Result<atp_domain::model::ExecutionResult> {
        history.extend(run.resolved);
        let statement_snapshots = run.statement_snapshots;

        if let Some(fatal) = run.fatal {
            self.store.delete(tenant_id, execution_id).await?;
            TraceEvent::ExecutionFailed {
                execution_id: execution_id.to_string(),
                error_kind: format!("{:?}", fatal.kind()),
                message: fatal.to_string(),
            }
            .emit();
            return Ok(atp_domain::model::ExecutionResult::Failed {
                error: fatal.kind(),
                message: fatal.to_string(),
            });
        }

        // A fresh run that completed synchronously without the sandbox
        // itself ever pausing may still have an unclosed batch (every
        // sub-call resolved to a placeholder so the synchronous `.map()`
        // could finish iterating) — that overrides completion, since the
        // batch is the real pause the client must resume.
        let outcome = match run.open_batch {
            Some((statement_id, sub_calls)) => {
                let sequence_number = sub_calls.first().map(|c| c.sequence_number).unwrap_or(0);
                let kind = sub_calls.first().map(|c| c.kind).unwrap_or(CallbackKind::ClientTool);
                let payload = serde_json::to_value(
                    sub_calls
                        .iter()
                        .map(|c| atp_domain::model::BatchSubCall {
                            sub_id: c.sub_id.unwrap_or_default(),
                            kind: c.kind,
                            operation: c.operation.clone(),
                            payload: c.payload.clone(),
                        })
                        .collect::<Vec<_>>(),
                )
                .unwrap_or(serde_json::Value::Null);
                BridgeOutcome::Paused(CallbackRecord {
                    sequence_number,
                    sub_id: None,
                    kind,
                    operation: "__batch__".into(),
                    payload,
                    result: None,
                    statement_id,
                    timestamp: chrono::Utc::now(),
                })
            }
            None => run.outcome,
        };

        match outcome {
            BridgeOutcome::Paused(pending) => {
                let now = chrono::Utc::now();
                let record = ExecutionRecord {
                    execution_id: execution_id.to_string(),
                    tenant_id: tenant_id.to_string(),
                    transformed_code,
                    config: serde_json::json!({}),
                    callback_history: history,
                    pending_callback: Some(pending.clone()),
                    statement_snapshots,
                    paused_at: Some(now),
                    context: serde_json::json!({}),
                    provenance_snapshot: None,
                    created_at: now,
                    updated_at: now,
                };
                self.store.put(record).await?;
                TraceEvent::ExecutionPaused {
                    execution_id: execution_id.to_string(),
                    sequence_number: pending.sequence_number,
                    operation: pending.operation.clone(),
                    batch_size: if pending.operation == "__batch__" {
                        pending.payload.as_array().map(|a| a.len() as u32)
                    } else {
                        None
                    },
                }
                .emit();
                Ok(atp_domain::model::ExecutionResult::Paused {
                    execution_id: execution_id.to_string(),
                    pending_callback: pending,
                })
            }
            BridgeOutcome::Completed(value) => {
                self.store.delete(tenant_id, execution_id).await?;
                let llm_calls = history.iter().filter(|c| c.kind == CallbackKind::Llm).count() as u32;
                let approval_calls =
                    history.iter().filter(|c| c.kind == CallbackKind::Approval).count() as u32;
                TraceEvent::ExecutionCompleted {
                    execution_id: execution_id.to_string(),
                    duration_ms,
                    llm_calls,
                }
                .emit();

                let registry =
                    provenance_from_history(&history, tools, &self.provenance_cache, tenant_id);
                let provenance_tokens =
                    self.issue_tokens(tenant_id, execution_id, &value, &registry);

                Ok(atp_domain::model::ExecutionResult::Completed {
                    execution_id: execution_id.to_string(),
                    value,
                    stats: Stats {
                        duration_ms,
                        memory_used_bytes: run.memory_used,
                        llm_calls,
                        approval_calls,
                    },
                    provenance_tokens,
                })
            }
            BridgeOutcome::Failed(err) => {
                self.store.delete(tenant_id, execution_id).await?;
                TraceEvent::ExecutionFailed {
                    execution_id: execution_id.to_string(),
                    error_kind: format!("{:?}", err.kind()),
                    message: err.to_string(),
                }
                .emit();
                Ok(atp_domain::model::ExecutionResult::Failed {
                    error: err.kind(),
                    message: err.to_string(),
                })
            }
        }
    }

    /// Walk every leaf of the completed result and issue a `ProvenanceToken`
    /// for each one the execution's own taint registry recognizes, bounded
    /// by `max_tokens_per_response` (§4.6).
    fn issue_tokens(
        &self,
        tenant_id: &str,
        execution_id: &str,
        value: &serde_json::Value,
        registry: &ProvenanceLookup,
    ) -> Vec<ProvenanceTokenEntry> {
        if self.config.provenance.mode == ProvenanceMode::None {
            return Vec::new();
        }
        let ttl = chrono::Duration::seconds(self.config.store.execution_ttl_secs as i64);
        let mut out = Vec::new();
        for (path, digest, meta) in walk_tagged_leaves(value, registry) {
            if out.len() >= self.config.provenance.max_tokens_per_response {
                break;
            }
            let payload = TokenPayload::new(tenant_id, execution_id, digest, meta.id.clone(), ttl);
            if let Ok(token) = ProvenanceToken::sign(&self.provenance_secret, &payload) {
                TraceEvent::ProvenanceTokenIssued {
                    execution_id: execution_id.to_string(),
                    origin: format!("{:?}", meta.origin),
                    reader_count: 0,
                }
                .emit();
                out.push(ProvenanceTokenEntry { path, token: token.as_str().to_string() });
            }
        }
        out
    }
}

fn to_replay_entry(operation: &str, result: CallbackResult) -> ReplayEntry {
    match result {
        CallbackResult::Value(v) => ReplayEntry::Value { operation: operation.to_string(), value: v },
        CallbackResult::Error(msg) => ReplayEntry::ToolError { operation: operation.to_string(), message: msg },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn build_policy_engine_skips_unknown_names() {
        let engine = build_policy_engine(&["prevent_data_exfiltration".into(), "bogus".into()]);
        let ctx = atp_provenance::PolicyContext {
            operation: "send_email",
            destructive_operations: &[],
            recipient_keys: &[],
            arguments: &serde_json::json!({}),
            argument_provenance: &[],
        };
        assert_eq!(engine.evaluate(&ctx).len(), 1);
    }

    #[test]
    fn walk_tagged_leaves_finds_nested_match() {
        let mut registry = HashMap::new();
        let tagged = serde_json::json!("secret");
        registry.insert(
            canonical_digest(&tagged),
            ProvenanceMetadata {
                id: "m1".into(),
                origin: Origin::User,
                readers: ReaderSet::unrestricted(),
                digest: None,
                dependencies: vec![],
            },
        );
        let value = serde_json::json!({"outer": {"inner": "secret"}});
        let found = walk_tagged_leaves(&value, &registry);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].0, "outer.inner");
    }

    #[test]
    fn to_replay_entry_maps_error_variant_to_tool_error() {
        match to_replay_entry("api.x.f", CallbackResult::Error("boom".into())) {
            ReplayEntry::ToolError { message, .. } => assert_eq!(message, "boom"),
            _ => panic!("expected a ToolError entry"),
        }
    }
}
