use serde::{Deserialize, Serialize};

use crate::origin::{Origin, ProvenanceMetadata};

/// Everything a policy needs to decide on a single tool-call site.
pub struct PolicyContext<'a> {
    pub operation: &'a str,
    pub destructive_operations: &'a [String],
    pub recipient_keys: &'a [String],
    pub arguments: &'a serde_json::Value,
    /// Provenance of each argument value the engine could resolve taint
    /// for, keyed by argument path (e.g. `"to"`, `"body"`).
    pub argument_provenance: &'a [(String, ProvenanceMetadata)],
}

impl<'a> PolicyContext<'a> {
    fn is_destructive(&self) -> bool {
        self.destructive_operations.iter().any(|op| op == self.operation)
    }

    /// The literal recipient string out of the call's own arguments
    /// (`to`, `recipient`, ...) — the recipient is whoever the call itself
    /// is addressed to, not whoever a tainted argument claims to be.
    fn recipient_string(&self) -> Option<String> {
        let obj = self.arguments.as_object()?;
        self.recipient_keys
            .iter()
            .find_map(|key| obj.get(key))
            .and_then(|v| v.as_str())
            .map(str::to_string)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum PolicyDecision {
    Allow,
    Log { reason: String },
    Block { reason: String },
    Approve { reason: String },
}


/// A single named security policy, evaluated in registration order against
/// every `api.*`/`atp.*` call site (§4.6).
pub trait Policy: Send + Sync {
    fn name(&self) -> &'static str;
    fn evaluate(&self, ctx: &PolicyContext<'_>) -> PolicyDecision;
}

/// Whether `meta`'s reader set admits `recipient`, with a carve-out that
/// lets a value flow back through the same client tool it came from.
fn admits(meta: &ProvenanceMetadata, recipient: &str, operation: &str) -> bool {
    if meta.readers.allows(recipient) {
        return true;
    }
    if let Origin::ClientTool { qualified_name } = &meta.origin {
        if qualified_name == operation {
            return meta.readers.allows(&format!("tool:{qualified_name}"));
        }
    }
    false
}

/// Blocks a call whenever one of its arguments carries a restricted reader
/// set that does not admit this call's own recipient argument — the core
/// exfiltration guard (§4.6): a value scoped to `alice@example.com` must
/// not be smuggled out via a `to` parameter pointing somewhere else.
pub struct PreventDataExfiltration;

impl Policy for PreventDataExfiltration {
    fn name(&self) -> &'static str {
        "prevent_data_exfiltration"
    }

    fn evaluate(&self, ctx: &PolicyContext<'_>) -> PolicyDecision {
        let Some(recipient) = ctx.recipient_string() else {
            return PolicyDecision::Allow;
        };
        for (path, meta) in ctx.argument_provenance {
            if !admits(meta, &recipient, ctx.operation) {
                return PolicyDecision::Block {
                    reason: format!(
                        "argument \"{path}\" is restricted to a reader set that does not admit recipient \"{recipient}\""
                    ),
                };
            }
        }
        PolicyDecision::Allow
    }
}

/// Requires every destructive operation to be traceable back to a user
/// origin somewhere in its argument provenance.
pub struct RequireUserOrigin;

impl Policy for RequireUserOrigin {
    fn name(&self) -> &'static str {
        "require_user_origin"
    }

    fn evaluate(&self, ctx: &PolicyContext<'_>) -> PolicyDecision {
        if !ctx.is_destructive() || ctx.argument_provenance.is_empty() {
            return PolicyDecision::Allow;
        }
        let has_user_origin = ctx
            .argument_provenance
            .iter()
            .any(|(_, meta)| matches!(meta.origin, Origin::User));
        if has_user_origin {
            PolicyDecision::Allow
        } else {
            PolicyDecision::Approve {
                reason: format!(
                    "{} has no argument traceable to a user origin",
                    ctx.operation
                ),
            }
        }
    }
}

/// Blocks passing an LLM-derived value into a recipient-shaped argument
/// (`to`, `recipient`, `email`, ...) — prevents prompt-injected content
/// from redirecting where an operation's output goes.
pub struct BlockLlmRecipients;

impl Policy for BlockLlmRecipients {
    fn name(&self) -> &'static str {
        "block_llm_recipients"
    }

    fn evaluate(&self, ctx: &PolicyContext<'_>) -> PolicyDecision {
        for (path, meta) in ctx.argument_provenance {
            if ctx.recipient_keys.iter().any(|k| k == path) && meta.origin.is_llm() {
                return PolicyDecision::Block {
                    reason: format!(
                        "recipient argument \"{path}\" is derived from an LLM response"
                    ),
                };
            }
        }
        PolicyDecision::Allow
    }
}

/// Logs (never blocks) every call touching a sensitive argument, for
/// after-the-fact audit.
pub struct AuditSensitiveAccess;

impl Policy for AuditSensitiveAccess {
    fn name(&self) -> &'static str {
        "audit_sensitive_access"
    }

    fn evaluate(&self, ctx: &PolicyContext<'_>) -> PolicyDecision {
        if ctx.argument_provenance.is_empty() {
            PolicyDecision::Allow
        } else {
            PolicyDecision::Log {
                reason: format!("{} touched {} tracked argument(s)", ctx.operation, ctx.argument_provenance.len()),
            }
        }
    }
}

/// Evaluates an ordered list of policies, in registration order, and
/// returns the first one that doesn't `allow` (§4.6).
pub struct PolicyEngine {
    policies: Vec<Box<dyn Policy>>,
}

impl PolicyEngine {
    pub fn new(policies: Vec<Box<dyn Policy>>) -> Self {
        Self { policies }
    }

    /// The default registration order (§4.6).
    pub fn with_defaults() -> Self {
        Self::new(vec![
            Box::new(PreventDataExfiltration),
            Box::new(RequireUserOrigin),
            Box::new(BlockLlmRecipients),
            Box::new(AuditSensitiveAccess),
        ])
    }

    pub fn evaluate(&self, ctx: &PolicyContext<'_>) -> Vec<(&'static str, PolicyDecision)> {
        self.policies
            .iter()
            .map(|p| (p.name(), p.evaluate(ctx)))
            .collect()
    }

    /// The decision that governs the call: policies run in registration
    /// order, and the first non-`allow` decision is returned immediately —
    /// a `log` from an earlier-registered policy still lets the call
    /// proceed even if a later policy would have blocked it (§4.6). Only
    /// once every policy has returned `allow` does the call proceed
    /// unconditionally.
    pub fn decide(&self, ctx: &PolicyContext<'_>) -> (&'static str, PolicyDecision) {
        for policy in &self.policies {
            let decision = policy.evaluate(ctx);
            if !matches!(decision, PolicyDecision::Allow) {
                return (policy.name(), decision);
            }
        }
        ("none", PolicyDecision::Allow)
    }
}
