//! Cycle detection for [`crate::encode_json`] and the sandbox bridge's
//! deep-value walk.
//!
//! The table is keyed by the host value's identity (an opaque `usize`, e.g.
//! a pointer or object-table index the caller derives) rather than by
//! content, since two structurally-identical-but-distinct objects must not
//! be conflated as one cycle.

use std::collections::HashMap;

/// Tracks values already visited during one serialization pass so a second
/// visit can be recorded as `SerializedValue::Circular` instead of
/// recursing forever.
#[derive(Debug, Default)]
pub struct RefTable {
    next_id: u32,
    seen: HashMap<usize, u32>,
}

impl RefTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `identity` as visited and return its `ref_id`. If this is
    /// the identity's first visit, a new id is minted and `None` is
    /// returned (the caller should proceed to encode the value normally).
    /// On a repeat visit, `Some(ref_id)` is returned and the caller should
    /// emit `SerializedValue::Circular { ref_id }` instead of recursing.
    pub fn visit(&mut self, identity: usize) -> Option<u32> {
        if let Some(&id) = self.seen.get(&identity) {
            return Some(id);
        }
        let id = self.next_id;
        self.next_id += 1;
        self.seen.insert(identity, id);
        None
    }

    pub fn len(&self) -> usize {
        self.seen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_visit_returns_none() {
        let mut refs = RefTable::new();
        assert_eq!(refs.visit(0x1000), None);
    }

    #[test]
    fn repeat_visit_returns_same_id() {
        let mut refs = RefTable::new();
        assert_eq!(refs.visit(0x1000), None);
        assert_eq!(refs.visit(0x1000), Some(0));
        assert_eq!(refs.visit(0x1000), Some(0));
    }

    #[test]
    fn distinct_identities_get_distinct_ids() {
        let mut refs = RefTable::new();
        assert_eq!(refs.visit(0x1000), None);
        assert_eq!(refs.visit(0x2000), None);
        assert_eq!(refs.visit(0x1000), Some(0));
        assert_eq!(refs.visit(0x2000), Some(1));
    }
}
