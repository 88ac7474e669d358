//! Centralizes the one place an engine error becomes an HTTP response
//! (§7): status code, wire `error.kind`, and the `status` label used by
//! `Failed` bodies (`"failed"`, or the specific kind name for the runtime
//! limits that have their own top-level label per §6).

use atp_domain::error::{Error, ErrorKind};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;

fn http_status(kind: ErrorKind) -> StatusCode {
    match kind {
        ErrorKind::ParseError | ErrorKind::ValidationFailed => StatusCode::BAD_REQUEST,
        ErrorKind::Unauthenticated => StatusCode::UNAUTHORIZED,
        ErrorKind::Forbidden => StatusCode::FORBIDDEN,
        ErrorKind::NotFound | ErrorKind::Expired => StatusCode::NOT_FOUND,
        ErrorKind::SecurityViolation
        | ErrorKind::Timeout
        | ErrorKind::MemoryExceeded
        | ErrorKind::LlmCallsExceeded
        | ErrorKind::ReplayDivergence
        | ErrorKind::StaleResume
        | ErrorKind::ApprovalDenied
        | ErrorKind::ToolError
        | ErrorKind::Internal => StatusCode::OK,
    }
}

/// The `"status"` label for a `Failed` response body (§6): most kinds just
/// say `"failed"`, but the runtime-limit kinds surface as their own label
/// so a client can branch on `status` without parsing `error.kind`.
pub(crate) fn status_label(kind: ErrorKind) -> &'static str {
    match kind {
        ErrorKind::Timeout => "timeout",
        ErrorKind::MemoryExceeded => "memory_exceeded",
        ErrorKind::LlmCallsExceeded => "llm_calls_exceeded",
        ErrorKind::SecurityViolation => "security_violation",
        _ => "failed",
    }
}

/// Renders any engine error that never made it into an `ExecutionResult`
/// (request validation, auth, store lookups) as its HTTP response. Errors
/// that occur *during* a run are instead folded into a 200 `Failed` body
/// by the orchestrator itself — this function only handles the errors
/// `execute`/`resume` propagate with `?` before or around that point.
pub fn to_response(err: &Error) -> Response {
    to_response_with_status(http_status(err.kind()), err)
}

/// Same rendering as [`to_response`], but with an explicit status — used
/// where the HTTP status a body maps to isn't a pure function of the
/// error kind (`/execute`'s 413 body-size check runs before the request
/// is even parsed into something with a `kind`).
pub fn to_response_with_status(status: StatusCode, err: &Error) -> Response {
    let kind = err.kind();
    let body = serde_json::json!({
        "status": status_label(kind),
        "error": {
            "kind": kind,
            "message": err.to_string(),
            "retryable": err.is_retryable(),
        },
    });
    (status, Json(body)).into_response()
}
