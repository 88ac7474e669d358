//! `POST /execute` — run a program to completion or its first pause (§4.9, §6).

use axum::extract::State;
use axum::response::Response;
use axum::Extension;
use serde::Deserialize;

use atp_domain::error::Error;
use atp_engine::RunContext;

use crate::api::auth::AuthedTenant;
use crate::api::wire;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct ExecuteRequest {
    pub code: String,
    /// Reserved for future per-execution overrides; the sandbox's limits
    /// are server-side configuration (§4.2), not client-supplied, so this
    /// is accepted and ignored rather than rejected as unknown.
    #[serde(default)]
    #[allow(dead_code)]
    pub config: Option<serde_json::Value>,
    #[serde(default)]
    pub provenance_hints: Vec<String>,
}

pub async fn execute(
    State(state): State<AppState>,
    Extension(AuthedTenant(tenant_id)): Extension<AuthedTenant>,
    body: axum::body::Bytes,
) -> Response {
    if body.len() > state.config.server.max_code_bytes {
        return crate::error::to_response_with_status(
            axum::http::StatusCode::PAYLOAD_TOO_LARGE,
            &Error::ValidationFailed(format!(
                "request body exceeds max_code_bytes ({} > {})",
                body.len(),
                state.config.server.max_code_bytes
            )),
        );
    }

    let req: ExecuteRequest = match serde_json::from_slice(&body) {
        Ok(r) => r,
        Err(e) => {
            return crate::error::to_response(&Error::ValidationFailed(format!("invalid request body: {e}")))
        }
    };

    let tools = state.sessions.get_by_tenant(&tenant_id).map(|s| s.registered_tools).unwrap_or_default();
    let ctx = RunContext { tools, provenance_hints: req.provenance_hints };

    match state.orchestrator.execute(&tenant_id, req.code, ctx).await {
        Ok(result) => wire::render(result),
        Err(e) => crate::error::to_response(&e),
    }
}
