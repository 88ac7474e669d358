//! Shapes an [`ExecutionResult`] into the exact wire body §6 specifies —
//! `execute`/`resume` share this rendering since both ultimately return
//! the same tagged union. The sliding-window session-token headers are
//! attached uniformly by `api::auth::require_session`, not here.

use axum::response::{IntoResponse, Response};
use axum::Json;

use atp_domain::model::ExecutionResult;

pub fn render(result: ExecutionResult) -> Response {
    let body = match result {
        ExecutionResult::Completed { execution_id, value, stats, provenance_tokens, .. } => {
            serde_json::json!({
                "status": "completed",
                "execution_id": execution_id,
                "result": value,
                "stats": {
                    "duration": stats.duration_ms,
                    "memory_used": stats.memory_used_bytes,
                    "llm_calls": stats.llm_calls,
                    "approval_calls": stats.approval_calls,
                },
                "provenance_tokens": provenance_tokens,
            })
        }
        ExecutionResult::Paused { execution_id, pending_callback, .. } => {
            let mut body = serde_json::json!({
                "status": "paused",
                "execution_id": execution_id,
            });
            if pending_callback.operation == "__batch__" {
                body["batch"] = pending_callback.payload;
            } else {
                body["callback"] = serde_json::json!({
                    "kind": pending_callback.kind,
                    "operation": pending_callback.operation,
                    "payload": pending_callback.payload,
                });
            }
            body
        }
        ExecutionResult::Failed { error, message, .. } => serde_json::json!({
            "status": crate::error::status_label(error),
            "error": {
                "kind": error,
                "message": message,
                // No `ErrorKind` in the taxonomy is retryable (§7) — the
                // flag is carried for wire-shape symmetry with the error
                // path `atp-gateway/src/error.rs` renders directly.
                "retryable": false,
            },
        }),
    };

    (axum::http::StatusCode::OK, Json(body)).into_response()
}
