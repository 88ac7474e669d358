use serde::Serialize;

/// The shared error taxonomy. Every crate in the workspace converts its own
/// errors into this type at its public boundary; `atp-gateway` is the only
/// place that maps a variant to an HTTP status code.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("IO: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("config: {0}")]
    Config(String),

    // ── Execution-engine error kinds (spec §7) ──────────────────────
    #[error("parse error: {0}")]
    ParseError(String),

    #[error("security violation: {policy}: {message}")]
    SecurityViolation { policy: String, message: String },

    #[error("validation failed: {0}")]
    ValidationFailed(String),

    #[error("unauthenticated")]
    Unauthenticated,

    #[error("forbidden")]
    Forbidden,

    #[error("not found")]
    NotFound,

    #[error("expired")]
    Expired,

    #[error("timeout")]
    Timeout,

    #[error("memory exceeded")]
    MemoryExceeded,

    #[error("llm call limit exceeded")]
    LlmCallsExceeded,

    #[error("replay divergence: {0}")]
    ReplayDivergence(String),

    #[error("stale resume: {0}")]
    StaleResume(String),

    #[error("approval denied")]
    ApprovalDenied,

    #[error("tool error: {0}")]
    ToolError(String),

    #[error("{0}")]
    Other(String),
}

/// The stable wire identifier for an error kind, used as `error.kind` in
/// every `Failed` response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    ParseError,
    SecurityViolation,
    ValidationFailed,
    Unauthenticated,
    Forbidden,
    NotFound,
    Expired,
    Timeout,
    MemoryExceeded,
    LlmCallsExceeded,
    ReplayDivergence,
    StaleResume,
    ApprovalDenied,
    ToolError,
    Internal,
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::ParseError(_) => ErrorKind::ParseError,
            Error::SecurityViolation { .. } => ErrorKind::SecurityViolation,
            Error::ValidationFailed(_) => ErrorKind::ValidationFailed,
            Error::Unauthenticated => ErrorKind::Unauthenticated,
            Error::Forbidden => ErrorKind::Forbidden,
            Error::NotFound => ErrorKind::NotFound,
            Error::Expired => ErrorKind::Expired,
            Error::Timeout => ErrorKind::Timeout,
            Error::MemoryExceeded => ErrorKind::MemoryExceeded,
            Error::LlmCallsExceeded => ErrorKind::LlmCallsExceeded,
            Error::ReplayDivergence(_) => ErrorKind::ReplayDivergence,
            Error::StaleResume(_) => ErrorKind::StaleResume,
            Error::ApprovalDenied => ErrorKind::ApprovalDenied,
            Error::ToolError(_) => ErrorKind::ToolError,
            Error::Io(_) | Error::Json(_) | Error::Config(_) | Error::Other(_) => {
                ErrorKind::Internal
            }
        }
    }

    /// Only `tool_error` is recovered locally into user code as a catchable
    /// throw (spec §7). Everything else terminates the execution.
    pub fn is_locally_recoverable(&self) -> bool {
        matches!(self, Error::ToolError(_))
    }

    pub fn is_retryable(&self) -> bool {
        false
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_tool_error_is_locally_recoverable() {
        assert!(Error::ToolError("boom".into()).is_locally_recoverable());
        assert!(!Error::SecurityViolation {
            policy: "p".into(),
            message: "m".into()
        }
        .is_locally_recoverable());
        assert!(!Error::Expired.is_locally_recoverable());
    }

    #[test]
    fn kind_mapping_is_distinct() {
        assert_eq!(Error::Unauthenticated.kind(), ErrorKind::Unauthenticated);
        assert_eq!(Error::Forbidden.kind(), ErrorKind::Forbidden);
        assert_eq!(Error::NotFound.kind(), ErrorKind::NotFound);
        assert_eq!(Error::Expired.kind(), ErrorKind::Expired);
    }
}
