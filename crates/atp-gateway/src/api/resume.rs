//! `POST /resume/{exec_id}` — supply a settled callback result and
//! continue a paused execution (§4.4, §4.9, §6).

use axum::extract::{Path, State};
use axum::response::Response;
use axum::Extension;
use axum::Json;
use serde::Deserialize;

use atp_engine::{CallbackResult, ResumeInput, RunContext};

use crate::api::auth::AuthedTenant;
use crate::api::wire;
use crate::state::AppState;

/// A single settled result: `{result: <value>}` on success, or
/// `{error: "<message>"}` if the agent's own tool/LLM/approval call
/// itself failed (surfaced to user code as a catchable `tool_error`, §7).
#[derive(Debug, Deserialize)]
struct WireResult {
    #[serde(default)]
    result: Option<serde_json::Value>,
    #[serde(default)]
    error: Option<String>,
}

impl WireResult {
    fn into_callback_result(self) -> CallbackResult {
        match self.error {
            Some(msg) => CallbackResult::Error(msg),
            None => CallbackResult::Value(self.result.unwrap_or(serde_json::Value::Null)),
        }
    }
}

#[derive(Debug, Deserialize)]
struct WireSubResult {
    sub_id: u32,
    #[serde(flatten)]
    inner: WireResult,
}

/// The two shapes `§6` allows: one result for a pending single callback,
/// or a `{sub_id, result}` list for a pending batch.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ResumeBody {
    Batch { results: Vec<WireSubResult> },
    Single(WireResult),
}

pub async fn resume(
    State(state): State<AppState>,
    Extension(AuthedTenant(tenant_id)): Extension<AuthedTenant>,
    Path(execution_id): Path<String>,
    Json(body): Json<ResumeBody>,
) -> Response {
    let tools = state.sessions.get_by_tenant(&tenant_id).map(|s| s.registered_tools).unwrap_or_default();
    let ctx = RunContext { tools, provenance_hints: Vec::new() };

    let input = match body {
        ResumeBody::Single(r) => ResumeInput::Single(r.into_callback_result()),
        ResumeBody::Batch { results } => {
            ResumeInput::Batch(results.into_iter().map(|r| (r.sub_id, r.inner.into_callback_result())).collect())
        }
    };

    match state.orchestrator.resume(&tenant_id, &execution_id, ctx, input).await {
        Ok(result) => wire::render(result),
        Err(e) => crate::error::to_response(&e),
    }
}

