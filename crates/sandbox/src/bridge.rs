//! The Sandbox Host Bridge (C3): owns one `boa_engine::Context` per
//! execution, injects the `atp.*`/`api.*` surface, and mediates every
//! pause-candidate call through a [`HostCallHandler`].

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::Rc;

use atp_domain::config::SandboxConfig;
use atp_domain::error::{Error, Result};
use atp_domain::model::{CallbackKind, CallbackRecord, HostCallHandler, HostCallOutcome};
use atp_transform::PauseSite;
use boa_engine::builtins::promise::PromiseState;
use boa_engine::object::FunctionObjectBuilder;
use boa_engine::property::Attribute;
use boa_engine::{Context, JsError, JsNativeError, JsResult, JsString, JsValue, NativeFunction, Source};
use serde::Deserialize;

use crate::limits::{AllocationCounter, LlmCallCounter};
use crate::prelude::build_prelude;
use crate::signal::{PauseState, PAUSE_SENTINEL};

#[derive(Deserialize)]
struct HostCallPayload {
    kind: String,
    operation: String,
    #[serde(default)]
    args: serde_json::Value,
}

fn parse_kind(raw: &str) -> CallbackKind {
    match raw {
        "llm" => CallbackKind::Llm,
        "approval" => CallbackKind::Approval,
        "embedding" => CallbackKind::Embedding,
        "progress" => CallbackKind::Progress,
        "log" => CallbackKind::Log,
        "cache" => CallbackKind::Cache,
        _ => CallbackKind::ClientTool,
    }
}

/// Resolves a dynamic call back to the static `PauseSite` table the
/// transformer computed, grouped by qualified name. A site seen more times
/// at runtime than it appears statically (loop/array-method bodies) keeps
/// reporting its last known `statement_id` — the table has one entry per
/// AST location, not per invocation.
struct SiteCursor {
    by_name: HashMap<String, Vec<PauseSite>>,
    cursor: HashMap<String, usize>,
}

impl SiteCursor {
    fn new(sites: &[PauseSite]) -> Self {
        let mut by_name: HashMap<String, Vec<PauseSite>> = HashMap::new();
        for site in sites {
            by_name.entry(site.qualified_name.clone()).or_default().push(site.clone());
        }
        Self {
            by_name,
            cursor: HashMap::new(),
        }
    }

    fn next_statement_id(&mut self, qualified_name: &str) -> u32 {
        let Some(sites) = self.by_name.get(qualified_name) else {
            return u32::MAX;
        };
        if sites.is_empty() {
            return u32::MAX;
        }
        let idx = *self.cursor.get(qualified_name).unwrap_or(&0);
        let site = sites.get(idx).unwrap_or_else(|| sites.last().unwrap());
        if idx + 1 < sites.len() {
            self.cursor.insert(qualified_name.to_string(), idx + 1);
        }
        site.statement_id
    }
}

struct Shared {
    handler: Box<dyn HostCallHandler>,
    pause: PauseState,
    alloc: AllocationCounter,
    llm_calls: LlmCallCounter,
    sites: SiteCursor,
}

/// The outcome of running a transformed script to completion inside one
/// sandbox invocation.
pub enum BridgeOutcome {
    Completed(serde_json::Value),
    Paused(CallbackRecord),
    Failed(Error),
}

/// One execution's sandbox: a freshly constructed `boa_engine::Context`
/// with limits applied and the host surface injected (§4.2). Dropped at
/// the end of every invocation, fresh or replay — never pooled.
pub struct Bridge {
    context: Context,
    shared: Rc<RefCell<Shared>>,
}

impl Bridge {
    pub fn new(
        config: &SandboxConfig,
        tools: &[atp_domain::model::ClientTool],
        handler: Box<dyn HostCallHandler>,
        pause_sites: &[PauseSite],
    ) -> Result<Self> {
        let mut context = Context::default();
        crate::limits::apply_runtime_limits(&mut context, config);

        let shared = Rc::new(RefCell::new(Shared {
            handler,
            pause: PauseState::new(),
            alloc: AllocationCounter::new(config.max_heap_bytes),
            llm_calls: LlmCallCounter::new(config.max_llm_calls),
            sites: SiteCursor::new(pause_sites),
        }));

        register_host_call(&mut context, shared.clone())?;

        let prelude = build_prelude(tools);
        context
            .eval(Source::from_bytes(prelude.as_bytes()))
            .map_err(|e| Error::Other(format!("failed to install sandbox prelude: {e}")))?;
        context.run_jobs();

        Ok(Self { context, shared })
    }

    /// Evaluate the execution's source text to completion (or until a
    /// pause genuinely suspends it). User code is always the
    /// async-IIFE-wrapped form `atp-transform::wrap_user_code` produces (so
    /// top-level `await`/`return` parse), which means calling it only ever
    /// returns a `Promise` synchronously — `await`, even on an
    /// already-settled value, needs at least one microtask turn to unwrap
    /// (ECMA-262 `Await`), so [`Context::run_jobs`] must drain the queue
    /// before the promise's settled state (read via `js_value_to_json`)
    /// reflects the script's real outcome.
    ///
    /// A pausing host call never throws: the generated `atp.*`/`api.*`
    /// wrapper (`prelude::leaf_fn`) recognizes the sentinel value
    /// `__atp_host_call` returns for it and responds by `await`ing a
    /// `Promise` that is never resolved or rejected, which suspends that
    /// leaf call — and transitively every `await` stacked on top of it,
    /// including the top-level IIFE — exactly as real suspension would,
    /// with no exception for a user's own `try`/`catch` to intercept (§5,
    /// §7: only `tool_error` is ever locally recoverable). Draining the
    /// job queue can never settle that hung promise, so the pause check
    /// below must run unconditionally before the top-level promise's
    /// (necessarily still-pending) state is inspected.
    pub fn run(&mut self, code: &str) -> BridgeOutcome {
        let eval_result = self.context.eval(Source::from_bytes(code.as_bytes()));
        self.context.run_jobs();

        if let Some(pending) = self.shared.borrow().pause.take() {
            return BridgeOutcome::Paused(pending);
        }

        match eval_result {
            Ok(value) => match js_value_to_json(&value, &mut self.context) {
                Ok(json) => BridgeOutcome::Completed(json),
                Err(e) => BridgeOutcome::Failed(e),
            },
            Err(err) => BridgeOutcome::Failed(Error::ToolError(err.to_string())),
        }
    }

    pub fn llm_calls_used(&self) -> u32 {
        self.shared.borrow().llm_calls.used()
    }

    pub fn memory_used(&self) -> u64 {
        self.shared.borrow().alloc.used()
    }
}

fn register_host_call(context: &mut Context, shared: Rc<RefCell<Shared>>) -> Result<()> {
    let callable = NativeFunction::from_closure(move |_this, args, _ctx| {
        host_call_impl(&shared, args)
    });
    let function = FunctionObjectBuilder::new(context.realm(), callable)
        .name(JsString::from("__atp_host_call"))
        .length(1)
        .build();

    context
        .register_global_property(JsString::from("__atp_host_call"), function, Attribute::all())
        .map_err(|e| Error::Other(format!("failed to register host bridge: {e}")))?;
    Ok(())
}

fn host_call_impl(shared: &Rc<RefCell<Shared>>, args: &[JsValue]) -> JsResult<JsValue> {
    let raw = args
        .first()
        .and_then(JsValue::as_string)
        .ok_or_else(|| JsNativeError::typ().with_message("__atp_host_call expects a JSON string"))?
        .to_std_string_escaped();

    shared
        .borrow_mut()
        .alloc
        .record(raw.len() as u64)
        .map_err(to_js_error)?;

    let payload: HostCallPayload = serde_json::from_str(&raw)
        .map_err(|e| JsNativeError::typ().with_message(format!("malformed host call payload: {e}")))?;

    let kind = parse_kind(&payload.kind);
    if matches!(kind, CallbackKind::Llm) {
        shared.borrow_mut().llm_calls.record().map_err(to_js_error)?;
    }

    let statement_id = shared.borrow_mut().sites.next_statement_id(&payload.operation);

    let outcome = {
        let mut guard = shared.borrow_mut();
        guard
            .handler
            .handle_call(kind, &payload.operation, statement_id, payload.args)
    };

    match outcome {
        HostCallOutcome::Resolved(value) => {
            let json = serde_json::to_string(&value).unwrap_or_else(|_| "null".into());
            Ok(JsValue::from(JsString::from(json)))
        }
        HostCallOutcome::Throw(message) => {
            Err(JsNativeError::error().with_message(message).into())
        }
        HostCallOutcome::Pause(record) => {
            shared.borrow().pause.signal(record);
            // Returned as a normal value, never thrown — see
            // `prelude::leaf_fn` and `Bridge::run`'s doc comment for why a
            // pause must not surface as a catchable JS exception.
            Ok(JsValue::from(JsString::from(PAUSE_SENTINEL)))
        }
        HostCallOutcome::PauseBatch {
            sequence_number,
            statement_id,
            sub_calls,
        } => {
            let record = CallbackRecord {
                sequence_number,
                sub_id: None,
                kind: sub_calls.first().map(|c| c.kind).unwrap_or(CallbackKind::ClientTool),
                operation: "__batch__".into(),
                payload: serde_json::to_value(&sub_calls).unwrap_or(serde_json::Value::Null),
                result: None,
                statement_id,
                timestamp: chrono::Utc::now(),
            };
            shared.borrow().pause.signal(record);
            Ok(JsValue::from(JsString::from(PAUSE_SENTINEL)))
        }
    }
}

fn to_js_error(e: Error) -> JsError {
    JsNativeError::error().with_message(e.to_string()).into()
}

/// Deep-copy a `JsValue` into `serde_json::Value` (§4.2's "return its
/// top-level value by deep copy"). Any value that has no JSON
/// representation (a function, a symbol) degrades to `null` rather than
/// failing the whole execution — mirroring the serializer's own
/// `nonserializable` fallback. Goes through the engine's own
/// `JSON.stringify` rather than `atp_serializer::encode_json`, so a
/// circular object degrades the same way instead of encoding as
/// `SerializedValue::Circular` (see the `atp-serializer` scope note in
/// DESIGN.md).
fn js_value_to_json(value: &JsValue, context: &mut Context) -> Result<serde_json::Value> {
    if let Some(obj) = value.as_object() {
        if obj.is_promise() {
            match obj.as_promise().map(|p| p.state()) {
                Some(PromiseState::Fulfilled(v)) => return js_value_to_json(&v, context),
                // An uncaught throw inside the wrapping async IIFE. A
                // pause never reaches here rejected — it hangs the promise
                // instead (see the `Pending` arm below) — and user code's
                // own `try`/`catch` would already have turned a recovered
                // `tool_error` into a resolved value, so a rejection here
                // is a genuine uncaught error (§7).
                Some(PromiseState::Rejected(reason)) => {
                    return Err(Error::ToolError(format!("{reason}")))
                }
                // Draining the job queue in `Bridge::run`/`Bridge::new`
                // settles every promise with no further pause signalled,
                // so a still-pending top-level promise here means the
                // script awaited something the job queue never resolved.
                Some(PromiseState::Pending) | None => {
                    return Err(Error::Other(
                        "script's top-level promise never settled".into(),
                    ))
                }
            }
        }
    }

    let json_str = context
        .global_object()
        .get(JsString::from("JSON"), context)
        .ok()
        .and_then(|json_ns| json_ns.as_object().cloned())
        .and_then(|json_ns| {
            json_ns
                .get(JsString::from("stringify"), context)
                .ok()
                .and_then(|f| f.as_callable().map(|c| (json_ns.clone(), c.clone())))
        })
        .and_then(|(json_ns, stringify)| {
            stringify
                .call(&JsValue::from(json_ns), &[value.clone()], context)
                .ok()
        })
        .and_then(|v| v.as_string().map(|s| s.to_std_string_escaped()));

    match json_str {
        Some(s) => serde_json::from_str(&s).map_err(Error::from),
        None => Ok(serde_json::Value::Null),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use atp_domain::model::ClientTool;

    struct EchoHandler;

    impl HostCallHandler for EchoHandler {
        fn handle_call(
            &mut self,
            _kind: CallbackKind,
            _operation: &str,
            _statement_id: u32,
            payload: serde_json::Value,
        ) -> HostCallOutcome {
            HostCallOutcome::Resolved(payload)
        }

        fn handle_batch(
            &mut self,
            statement_id: u32,
            sub_calls: Vec<(CallbackKind, String, serde_json::Value)>,
        ) -> HostCallOutcome {
            HostCallOutcome::PauseBatch {
                sequence_number: 0,
                statement_id,
                sub_calls: sub_calls
                    .into_iter()
                    .enumerate()
                    .map(|(i, (kind, operation, payload))| atp_domain::model::BatchSubCall {
                        sub_id: i as u32,
                        kind,
                        operation,
                        payload,
                    })
                    .collect(),
            }
        }
    }

    struct PausingHandler;

    impl HostCallHandler for PausingHandler {
        fn handle_call(
            &mut self,
            kind: CallbackKind,
            operation: &str,
            statement_id: u32,
            payload: serde_json::Value,
        ) -> HostCallOutcome {
            HostCallOutcome::Pause(CallbackRecord {
                sequence_number: 0,
                sub_id: None,
                kind,
                operation: operation.to_string(),
                payload,
                result: None,
                statement_id,
                timestamp: chrono::Utc::now(),
            })
        }

        fn handle_batch(
            &mut self,
            _statement_id: u32,
            _sub_calls: Vec<(CallbackKind, String, serde_json::Value)>,
        ) -> HostCallOutcome {
            unreachable!("not exercised in this test")
        }
    }

    fn config() -> SandboxConfig {
        SandboxConfig {
            timeout_ms: 5_000,
            max_heap_bytes: 16 * 1024 * 1024,
            max_llm_calls: 10,
            max_loop_iterations: 10_000,
        }
    }

    #[test]
    fn resolved_call_lets_script_complete() {
        let sites = vec![PauseSite {
            sequence_hint: 0,
            qualified_name: "atp.llm.call".into(),
            statement_id: 7,
        }];
        let mut bridge = Bridge::new(&config(), &[], Box::new(EchoHandler), &sites).unwrap();
        match bridge.run("atp.llm.call({prompt: 'hi'});") {
            BridgeOutcome::Completed(_) => {}
            _ => panic!("expected completion, got a different outcome"),
        }
    }

    #[test]
    fn pausing_call_surfaces_pending_callback() {
        let sites = vec![PauseSite {
            sequence_hint: 0,
            qualified_name: "atp.llm.call".into(),
            statement_id: 3,
        }];
        let mut bridge = Bridge::new(&config(), &[], Box::new(PausingHandler), &sites).unwrap();
        match bridge.run("atp.llm.call({prompt: 'hi'});") {
            BridgeOutcome::Paused(record) => {
                assert_eq!(record.operation, "atp.llm.call");
                assert_eq!(record.statement_id, 3);
            }
            _ => panic!("expected a pause"),
        }
    }
}
