//! Layered configuration: a `config.toml` file plus a handful of
//! security-sensitive environment-variable overrides (§6).

use std::fmt;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub sessions: SessionConfig,
    #[serde(default)]
    pub provenance: ProvenanceConfig,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub sandbox: SandboxConfig,
    #[serde(default)]
    pub policy: PolicyConfig,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Server
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "d_port")]
    pub port: u16,
    #[serde(default = "d_host")]
    pub host: String,
    #[serde(default)]
    pub cors: CorsConfig,
    #[serde(default)]
    pub rate_limit: Option<RateLimitConfig>,
    /// Max request body size in bytes for `/execute` (maps to 413 on
    /// overflow, per §6's failure table).
    #[serde(default = "d_max_code_bytes")]
    pub max_code_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: d_port(),
            host: d_host(),
            cors: CorsConfig::default(),
            rate_limit: None,
            max_code_bytes: d_max_code_bytes(),
        }
    }
}

fn d_port() -> u16 {
    8080
}
fn d_host() -> String {
    "127.0.0.1".into()
}
fn d_max_code_bytes() -> usize {
    256 * 1024
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CorsConfig {
    #[serde(default = "d_cors_origins")]
    pub allowed_origins: Vec<String>,
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            allowed_origins: d_cors_origins(),
        }
    }
}

fn d_cors_origins() -> Vec<String> {
    vec!["http://localhost:3000".into()]
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitConfig {
    pub requests_per_second: u32,
    pub burst_size: u32,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Sessions & tokens (C8)
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Env var holding the signing secret (min 32 bytes, §4.8).
    #[serde(default = "d_session_secret_env")]
    pub secret_env: String,
    #[serde(default = "d_token_ttl_secs")]
    pub token_ttl_secs: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            secret_env: d_session_secret_env(),
            token_ttl_secs: d_token_ttl_secs(),
        }
    }
}

fn d_session_secret_env() -> String {
    "SESSION_SECRET".into()
}
fn d_token_ttl_secs() -> u64 {
    3600
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Provenance & policy (C6)
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProvenanceMode {
    Proxy,
    Ast,
    None,
}

impl Default for ProvenanceMode {
    fn default() -> Self {
        ProvenanceMode::Proxy
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProvenanceConfig {
    #[serde(default)]
    pub mode: ProvenanceMode,
    #[serde(default = "d_provenance_secret_env")]
    pub secret_env: String,
    #[serde(default = "d_max_tokens")]
    pub max_tokens_per_response: usize,
    /// Parameter names treated as "recipient" slots by `prevent_data_exfiltration`.
    #[serde(default = "d_recipient_keys")]
    pub recipient_keys: Vec<String>,
}

impl Default for ProvenanceConfig {
    fn default() -> Self {
        Self {
            mode: ProvenanceMode::default(),
            secret_env: d_provenance_secret_env(),
            max_tokens_per_response: d_max_tokens(),
            recipient_keys: d_recipient_keys(),
        }
    }
}

fn d_provenance_secret_env() -> String {
    "PROVENANCE_SECRET".into()
}
fn d_max_tokens() -> usize {
    5000
}
fn d_recipient_keys() -> Vec<String> {
    vec!["to".into(), "recipient".into(), "email".into()]
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct PolicyConfig {
    /// Built-in policy names, in registration (evaluation) order.
    #[serde(default = "d_policies")]
    pub enabled: Vec<String>,
    /// Operations `require_user_origin` guards.
    #[serde(default = "d_destructive_ops")]
    pub destructive_operations: Vec<String>,
}

fn d_policies() -> Vec<String> {
    vec![
        "prevent_data_exfiltration".into(),
        "require_user_origin".into(),
        "block_llm_recipients".into(),
        "audit_sensitive_access".into(),
    ]
}
fn d_destructive_ops() -> Vec<String> {
    vec!["send_email".into(), "delete_file".into(), "transfer_funds".into()]
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Execution state store (C7)
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// `None` (or `memory://`) selects the in-memory backend;
    /// `file://<dir>` selects the shared-filesystem backend.
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default = "d_execution_ttl_secs")]
    pub execution_ttl_secs: u64,
    #[serde(default = "d_max_pause_secs")]
    pub max_pause_duration_secs: u64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            url: None,
            execution_ttl_secs: d_execution_ttl_secs(),
            max_pause_duration_secs: d_max_pause_secs(),
        }
    }
}

fn d_execution_ttl_secs() -> u64 {
    3600
}
fn d_max_pause_secs() -> u64 {
    3600
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Sandbox limits (C3)
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SandboxConfig {
    #[serde(default = "d_timeout_ms")]
    pub timeout_ms: u64,
    #[serde(default = "d_max_heap_bytes")]
    pub max_heap_bytes: u64,
    #[serde(default = "d_max_llm_calls")]
    pub max_llm_calls: u32,
    #[serde(default = "d_max_loop_iterations")]
    pub max_loop_iterations: u64,
}

impl Default for SandboxConfig {
    fn default() -> Self {
        Self {
            timeout_ms: d_timeout_ms(),
            max_heap_bytes: d_max_heap_bytes(),
            max_llm_calls: d_max_llm_calls(),
            max_loop_iterations: d_max_loop_iterations(),
        }
    }
}

fn d_timeout_ms() -> u64 {
    30_000
}
fn d_max_heap_bytes() -> u64 {
    64 * 1024 * 1024
}
fn d_max_llm_calls() -> u32 {
    25
}
fn d_max_loop_iterations() -> u64 {
    1_000_000
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Validation
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigSeverity {
    Error,
    Warning,
}

#[derive(Debug, Clone)]
pub struct ConfigIssue {
    pub severity: ConfigSeverity,
    pub field: String,
    pub message: String,
}

impl fmt::Display for ConfigIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tag = match self.severity {
            ConfigSeverity::Error => "ERROR",
            ConfigSeverity::Warning => "WARN",
        };
        write!(f, "[{tag}] {}: {}", self.field, self.message)
    }
}

impl Config {
    /// Validate the configuration, optionally against the process
    /// environment (so secret-length checks can run). Returns an empty vec
    /// when everything looks good.
    pub fn validate(&self) -> Vec<ConfigIssue> {
        let mut issues = Vec::new();

        if self.server.port == 0 {
            issues.push(ConfigIssue {
                severity: ConfigSeverity::Error,
                field: "server.port".into(),
                message: "port must be greater than 0".into(),
            });
        }
        if self.server.host.is_empty() {
            issues.push(ConfigIssue {
                severity: ConfigSeverity::Error,
                field: "server.host".into(),
                message: "host must not be empty".into(),
            });
        }

        match std::env::var(&self.sessions.secret_env) {
            Ok(v) if v.len() >= 32 => {}
            Ok(_) => issues.push(ConfigIssue {
                severity: ConfigSeverity::Error,
                field: "sessions.secret_env".into(),
                message: format!(
                    "{} must be at least 32 bytes",
                    self.sessions.secret_env
                ),
            }),
            Err(_) => issues.push(ConfigIssue {
                severity: ConfigSeverity::Error,
                field: "sessions.secret_env".into(),
                message: format!("{} is required but not set", self.sessions.secret_env),
            }),
        }

        if self.provenance.mode != ProvenanceMode::None {
            match std::env::var(&self.provenance.secret_env) {
                Ok(v) if v.len() >= 32 => {}
                Ok(_) => issues.push(ConfigIssue {
                    severity: ConfigSeverity::Error,
                    field: "provenance.secret_env".into(),
                    message: format!(
                        "{} must be at least 32 bytes",
                        self.provenance.secret_env
                    ),
                }),
                Err(_) => issues.push(ConfigIssue {
                    severity: ConfigSeverity::Error,
                    field: "provenance.secret_env".into(),
                    message: format!(
                        "{} is required when provenance tracking is enabled",
                        self.provenance.secret_env
                    ),
                }),
            }
        }

        if self.store.max_pause_duration_secs == 0 {
            issues.push(ConfigIssue {
                severity: ConfigSeverity::Error,
                field: "store.max_pause_duration_secs".into(),
                message: "must be greater than 0".into(),
            });
        }

        if self.sandbox.timeout_ms == 0 {
            issues.push(ConfigIssue {
                severity: ConfigSeverity::Error,
                field: "sandbox.timeout_ms".into(),
                message: "must be greater than 0".into(),
            });
        }

        if self.server.cors.allowed_origins.len() == 1 && self.server.cors.allowed_origins[0] == "*"
        {
            issues.push(ConfigIssue {
                severity: ConfigSeverity::Warning,
                field: "server.cors.allowed_origins".into(),
                message: "wildcard \"*\" allows all origins (not recommended for production)".into(),
            });
        }

        if let Some(rl) = &self.server.rate_limit {
            if rl.requests_per_second == 0 {
                issues.push(ConfigIssue {
                    severity: ConfigSeverity::Error,
                    field: "server.rate_limit.requests_per_second".into(),
                    message: "must be greater than 0".into(),
                });
            }
            if rl.burst_size == 0 {
                issues.push(ConfigIssue {
                    severity: ConfigSeverity::Error,
                    field: "server.rate_limit.burst_size".into(),
                    message: "must be greater than 0".into(),
                });
            }
        }

        for name in &self.policy.enabled {
            if !KNOWN_POLICIES.contains(&name.as_str()) {
                issues.push(ConfigIssue {
                    severity: ConfigSeverity::Warning,
                    field: "policy.enabled".into(),
                    message: format!("unknown policy \"{name}\" will never match and is a no-op"),
                });
            }
        }

        issues
    }
}

const KNOWN_POLICIES: &[&str] = &[
    "prevent_data_exfiltration",
    "require_user_origin",
    "block_llm_recipients",
    "audit_sensitive_access",
];
