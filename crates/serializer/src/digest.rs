//! Stable canonical-JSON SHA-256 digest, used by the provenance engine to
//! key its primitive-taint registry by content rather than by identity.

use sha2::{Digest, Sha256};

/// Canonicalize a JSON value (object keys sorted, no whitespace) and hash
/// it with SHA-256, returning the lowercase hex digest.
///
/// Canonicalization matters: two semantically-equal values that happened to
/// serialize with keys in a different order must hash identically, since
/// the provenance engine matches incoming argument digests against
/// previously-issued hint digests (§4.6).
pub fn canonical_digest(value: &serde_json::Value) -> String {
    let mut buf = String::new();
    write_canonical(value, &mut buf);
    let mut hasher = Sha256::new();
    hasher.update(buf.as_bytes());
    hex::encode(hasher.finalize())
}

fn write_canonical(value: &serde_json::Value, out: &mut String) {
    use serde_json::Value as J;
    match value {
        J::Null => out.push_str("null"),
        J::Bool(b) => out.push_str(if *b { "true" } else { "false" }),
        J::Number(n) => out.push_str(&n.to_string()),
        J::String(s) => {
            out.push('"');
            for c in s.chars() {
                match c {
                    '"' => out.push_str("\\\""),
                    '\\' => out.push_str("\\\\"),
                    _ => out.push(c),
                }
            }
            out.push('"');
        }
        J::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_canonical(item, out);
            }
            out.push(']');
        }
        J::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            out.push('{');
            for (i, k) in keys.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_canonical(&serde_json::Value::String((*k).clone()), out);
                out.push(':');
                write_canonical(&map[*k], out);
            }
            out.push('}');
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_order_does_not_affect_digest() {
        let a = serde_json::json!({"a": 1, "b": 2});
        let b = serde_json::json!({"b": 2, "a": 1});
        assert_eq!(canonical_digest(&a), canonical_digest(&b));
    }

    #[test]
    fn different_values_hash_differently() {
        let a = serde_json::json!({"a": 1});
        let b = serde_json::json!({"a": 2});
        assert_ne!(canonical_digest(&a), canonical_digest(&b));
    }

    #[test]
    fn digest_is_stable_hex() {
        let v = serde_json::json!("alice@example.com");
        let d = canonical_digest(&v);
        assert_eq!(d.len(), 64);
        assert!(d.chars().all(|c| c.is_ascii_hexdigit()));
    }
}
