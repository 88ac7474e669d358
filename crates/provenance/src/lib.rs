pub mod cache;
pub mod origin;
pub mod policy;
pub mod token;

pub use cache::MetadataCache;
pub use origin::{Origin, ProvenanceMetadata, ReaderSet};
pub use policy::{
    AuditSensitiveAccess, BlockLlmRecipients, Policy, PolicyContext, PolicyDecision, PolicyEngine,
    PreventDataExfiltration, RequireUserOrigin,
};
pub use token::{ProvenanceToken, TokenPayload};
