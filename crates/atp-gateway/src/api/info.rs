//! `GET /info` — advertised version and limits (§6). Public, no auth.

use axum::extract::State;
use axum::Json;

use crate::state::AppState;

pub async fn info(State(state): State<AppState>) -> Json<serde_json::Value> {
    let config = &state.config;
    Json(serde_json::json!({
        "version": env!("CARGO_PKG_VERSION"),
        "limits": {
            "max_code_bytes": config.server.max_code_bytes,
            "sandbox_timeout_ms": config.sandbox.timeout_ms,
            "max_heap_bytes": config.sandbox.max_heap_bytes,
            "max_llm_calls": config.sandbox.max_llm_calls,
            "max_loop_iterations": config.sandbox.max_loop_iterations,
            "token_ttl_secs": config.sessions.token_ttl_secs,
            "execution_ttl_secs": config.store.execution_ttl_secs,
            "max_pause_duration_secs": config.store.max_pause_duration_secs,
            "max_provenance_tokens_per_response": config.provenance.max_tokens_per_response,
        },
        "provenance_mode": config.provenance.mode,
    }))
}
