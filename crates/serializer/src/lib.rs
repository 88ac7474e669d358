//! Deep, round-trippable encoding of sandboxed runtime values.
//!
//! [`SerializedValue`] is the wire/storage representation for every value
//! that crosses a statement boundary or gets written into a
//! `StatementSnapshot`. Encoding never fails: anything the encoder does not
//! know how to represent degrades to [`SerializedValue::Nonserializable`]
//! rather than propagating an error up through user code.

pub mod digest;
pub mod refs;

pub use digest::canonical_digest;
pub use refs::RefTable;

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Flags describing a captured function's shape.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FunctionFlags {
    #[serde(default)]
    pub is_async: bool,
    #[serde(default)]
    pub is_generator: bool,
    #[serde(default)]
    pub is_arrow: bool,
}

/// The tagged ADT every runtime value is encoded into.
///
/// `#[serde(tag = "type")]` mirrors the teacher codebase's convention for
/// wire-visible tagged unions (see `sa_domain::tool::ContentPart`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SerializedValue {
    Null,
    Undefined,
    Bool { value: bool },
    Number { value: f64 },
    /// Stringified bigint or symbol, or any ordinary string.
    String { value: String },
    Date { iso: String },
    Regexp { source: String, flags: String },
    /// Ordered sequence (array / tuple / iterable).
    Sequence { items: Vec<SerializedValue> },
    /// Keyed map, insertion order preserved. `class_name` distinguishes a
    /// plain object from a tagged class instance (`None` = plain object).
    Map {
        #[serde(skip_serializing_if = "Option::is_none")]
        class_name: Option<String>,
        entries: Vec<(String, SerializedValue)>,
    },
    /// Ordered or keyed set container (JS `Set`).
    Set { items: Vec<SerializedValue> },
    Function {
        source: String,
        #[serde(default)]
        closure: BTreeMap<String, SerializedValue>,
        #[serde(default)]
        flags: FunctionFlags,
    },
    /// A value already visited in the current encoding pass.
    Circular { ref_id: u32 },
    /// Anything the encoder could not represent. Never an error; decodes
    /// back to `Undefined`.
    Nonserializable { reason: String },
}

impl SerializedValue {
    pub fn is_nonserializable(&self) -> bool {
        matches!(self, SerializedValue::Nonserializable { .. })
    }
}

/// Encode a [`serde_json::Value`] into a [`SerializedValue`], registering
/// every container in `refs` so cycles over the *same* JSON tree are caught.
/// `serde_json::Value` itself cannot represent a cycle (it is a tree), so in
/// practice `Circular` only appears when the caller pre-registers a
/// container (e.g. the sandbox bridge registers a JS object's identity
/// before recursing into its properties).
pub fn encode_json(value: &serde_json::Value, refs: &mut RefTable) -> SerializedValue {
    use serde_json::Value as J;
    match value {
        J::Null => SerializedValue::Null,
        J::Bool(b) => SerializedValue::Bool { value: *b },
        J::Number(n) => match n.as_f64() {
            Some(f) => SerializedValue::Number { value: f },
            None => SerializedValue::Nonserializable {
                reason: "number out of f64 range".into(),
            },
        },
        J::String(s) => SerializedValue::String { value: s.clone() },
        J::Array(items) => {
            let encoded = items.iter().map(|v| encode_json(v, refs)).collect();
            SerializedValue::Sequence { items: encoded }
        }
        J::Object(map) => {
            let entries = map
                .iter()
                .map(|(k, v)| (k.clone(), encode_json(v, refs)))
                .collect();
            SerializedValue::Map {
                class_name: None,
                entries,
            }
        }
    }
}

/// Decode a [`SerializedValue`] back into a [`serde_json::Value`]. This is
/// the left-inverse of [`encode_json`] for every variant `encode_json` can
/// produce; `Circular`, `Function`, and `Nonserializable` decode to `null`
/// here because reconstructing a live closure or back-reference requires a
/// running sandbox, not a bare JSON tree — the sandbox bridge performs that
/// reconstruction itself using the same [`SerializedValue`] tree.
pub fn decode_json(value: &SerializedValue) -> serde_json::Value {
    use serde_json::Value as J;
    match value {
        SerializedValue::Null | SerializedValue::Undefined => J::Null,
        SerializedValue::Bool { value } => J::Bool(*value),
        SerializedValue::Number { value } => {
            serde_json::Number::from_f64(*value).map(J::Number).unwrap_or(J::Null)
        }
        SerializedValue::String { value } => J::String(value.clone()),
        SerializedValue::Date { iso } => J::String(iso.clone()),
        SerializedValue::Regexp { source, flags } => J::String(format!("/{source}/{flags}")),
        SerializedValue::Sequence { items } | SerializedValue::Set { items } => {
            J::Array(items.iter().map(decode_json).collect())
        }
        SerializedValue::Map { entries, .. } => {
            let mut map = serde_json::Map::with_capacity(entries.len());
            for (k, v) in entries {
                map.insert(k.clone(), decode_json(v));
            }
            J::Object(map)
        }
        SerializedValue::Function { .. }
        | SerializedValue::Circular { .. }
        | SerializedValue::Nonserializable { .. } => J::Null,
    }
}

/// Scan a function's source text for identifier tokens that should be
/// captured from the enclosing scope, per §4.1: every identifier-looking
/// token minus reserved keywords minus global built-ins. Both exclusion
/// sets are passed in by the caller (the sandbox bridge memoizes them once
/// per process) so this function stays pure and independently testable.
pub fn scan_closure_identifiers(
    source: &str,
    keywords: &std::collections::HashSet<String>,
    globals: &std::collections::HashSet<String>,
) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    let mut out = Vec::new();
    let mut current = String::new();

    let mut chars = source.chars().peekable();
    while let Some(c) = chars.next() {
        if c.is_alphanumeric() || c == '_' || c == '$' {
            current.push(c);
            continue;
        }
        if !current.is_empty() {
            push_identifier(&current, keywords, globals, &mut seen, &mut out);
            current.clear();
        }
    }
    if !current.is_empty() {
        push_identifier(&current, keywords, globals, &mut seen, &mut out);
    }
    out
}

fn push_identifier(
    token: &str,
    keywords: &std::collections::HashSet<String>,
    globals: &std::collections::HashSet<String>,
    seen: &mut std::collections::HashSet<String>,
    out: &mut Vec<String>,
) {
    if token.chars().next().map(|c| c.is_ascii_digit()).unwrap_or(true) {
        return; // numeric literal, not an identifier
    }
    if keywords.contains(token) || globals.contains(token) {
        return;
    }
    if seen.insert(token.to_string()) {
        out.push(token.to_string());
    }
}
