use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Where a value came from, tracked at tool-return boundaries so policies
/// can later ask "did this reach a sink without ever touching an LLM
/// response" (§4.6).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Origin {
    User,
    Llm { model: String },
    ClientTool { qualified_name: String },
    System,
}

impl Origin {
    pub fn is_llm(&self) -> bool {
        matches!(self, Origin::Llm { .. })
    }
}

/// The set of principals permitted to read a tainted value. Empty means
/// "no restriction beyond the tenant boundary".
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReaderSet(BTreeSet<String>);

impl ReaderSet {
    pub fn unrestricted() -> Self {
        Self::default()
    }

    pub fn only(readers: impl IntoIterator<Item = String>) -> Self {
        Self(readers.into_iter().collect())
    }

    pub fn allows(&self, reader: &str) -> bool {
        self.0.is_empty() || self.0.contains(reader)
    }

    pub fn restrict_to(&mut self, reader: impl Into<String>) {
        self.0.insert(reader.into());
    }
}

/// Taint metadata carried alongside a tool-return value in proxy mode.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProvenanceMetadata {
    /// Opaque identity for this metadata record, also used as the
    /// `metadata_ref` suffix of its cache key (§3).
    pub id: String,
    pub origin: Origin,
    #[serde(default)]
    pub readers: ReaderSet,
    /// Present only in AST mode, where primitives are matched against a
    /// content-digest registry instead of carried by reference.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub digest: Option<String>,
    /// Ids of `ProvenanceMetadata` records this value was derived from
    /// (e.g. the arguments of the tool call that produced it), so a
    /// policy can trace an exfiltration path more than one hop back.
    #[serde(default)]
    pub dependencies: Vec<String>,
}
