//! The State Manager (C5, §4.5): captures a [`StatementSnapshot`] for every
//! call site the Sequencer settles, and serves `atp.cache.get`/`atp.cache.set`
//! directly out of that table instead of pausing out to the agent — the
//! memoization layer for expensive deterministic server-side calls §4.5
//! describes. Snapshots persist in [`atp_domain::model::ExecutionRecord::statement_snapshots`]
//! and reseed this same table on the next resume, since statement ids are
//! stable across runs of the same transformed code.

use std::collections::BTreeMap;

use atp_domain::model::StatementSnapshot;
use atp_serializer::{decode_json, encode_json, RefTable, SerializedValue};

/// Keeps snapshots in first-write order (the order they'll be persisted in)
/// while still allowing O(1) lookup by statement id or cache key.
pub struct StateManager {
    snapshots: Vec<StatementSnapshot>,
    by_statement: BTreeMap<u32, usize>,
    by_cache_key: BTreeMap<String, usize>,
}

impl StateManager {
    pub fn fresh() -> Self {
        Self { snapshots: Vec::new(), by_statement: BTreeMap::new(), by_cache_key: BTreeMap::new() }
    }

    /// Resume: reseed from the execution's persisted snapshots.
    pub fn from_existing(snapshots: Vec<StatementSnapshot>) -> Self {
        let mut mgr = Self::fresh();
        for snapshot in snapshots {
            mgr.index(snapshot);
        }
        mgr
    }

    fn index(&mut self, snapshot: StatementSnapshot) {
        let idx = self.snapshots.len();
        if let Some(SerializedValue::String { value }) = snapshot.variables.get("key") {
            self.by_cache_key.insert(value.clone(), idx);
        }
        self.by_statement.insert(snapshot.statement_id, idx);
        self.snapshots.push(snapshot);
    }

    /// §4.5's general per-statement capture: a snapshot of a call site's
    /// settled result, taken once per statement id. A no-op if this
    /// statement already has one — a replay re-walking the same site never
    /// needs a second capture, and a fresh run never revisits a statement id.
    pub fn record_call_result(&mut self, statement_id: u32, result: &serde_json::Value) {
        if self.by_statement.contains_key(&statement_id) {
            return;
        }
        let mut refs = RefTable::new();
        let snapshot = StatementSnapshot {
            statement_id,
            variables: BTreeMap::new(),
            result: Some(encode_json(result, &mut refs)),
            timestamp: chrono::Utc::now(),
        };
        self.index(snapshot);
    }

    /// `atp.cache.set({key, value})`: stores `value` under `key`, keyed by
    /// name rather than call site, so a later `atp.cache.get` anywhere in
    /// the script can retrieve it. A later write to the same key appends a
    /// new snapshot and repoints `by_cache_key` at it; snapshots are
    /// strictly append-only within an execution, so the earlier statement's
    /// own snapshot is never overwritten or dropped. A no-op if this
    /// statement id already has a snapshot, same as `record_call_result`.
    pub fn cache_set(&mut self, statement_id: u32, key: String, value: &serde_json::Value) {
        if self.by_statement.contains_key(&statement_id) {
            return;
        }
        let mut refs = RefTable::new();
        let mut variables = BTreeMap::new();
        variables.insert("key".to_string(), SerializedValue::String { value: key.clone() });
        let snapshot = StatementSnapshot {
            statement_id,
            variables,
            result: Some(encode_json(value, &mut refs)),
            timestamp: chrono::Utc::now(),
        };
        self.index(snapshot);
    }

    /// `atp.cache.get({key})`: `None` on a cache miss, decoded back to JSON
    /// on a hit.
    pub fn cache_get(&self, key: &str) -> Option<serde_json::Value> {
        let &idx = self.by_cache_key.get(key)?;
        self.snapshots[idx].result.as_ref().map(decode_json)
    }

    pub fn into_snapshots(self) -> Vec<StatementSnapshot> {
        self.snapshots
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cache_set_then_get_round_trips() {
        let mut mgr = StateManager::fresh();
        assert_eq!(mgr.cache_get("total"), None);
        mgr.cache_set(4, "total".to_string(), &serde_json::json!(42));
        assert_eq!(mgr.cache_get("total"), Some(serde_json::json!(42)));
    }

    #[test]
    fn cache_set_appends_rather_than_overwriting() {
        let mut mgr = StateManager::fresh();
        mgr.cache_set(4, "total".to_string(), &serde_json::json!(1));
        mgr.cache_set(9, "total".to_string(), &serde_json::json!(2));
        assert_eq!(mgr.cache_get("total"), Some(serde_json::json!(2)));
        let snapshots = mgr.into_snapshots();
        // Append-only: the first write's own snapshot is retained, and a
        // second snapshot is added for the later write that now owns the
        // cache key lookup.
        assert_eq!(snapshots.len(), 2);
        assert_eq!(snapshots[0].statement_id, 4);
        assert_eq!(snapshots[1].statement_id, 9);
    }

    #[test]
    fn cache_set_is_a_no_op_when_replaying_the_same_statement() {
        let mut mgr = StateManager::fresh();
        mgr.cache_set(4, "total".to_string(), &serde_json::json!(1));
        mgr.cache_set(4, "total".to_string(), &serde_json::json!(999));
        assert_eq!(mgr.cache_get("total"), Some(serde_json::json!(1)));
        assert_eq!(mgr.into_snapshots().len(), 1);
    }

    #[test]
    fn record_call_result_captures_once_per_statement() {
        let mut mgr = StateManager::fresh();
        mgr.record_call_result(3, &serde_json::json!("first"));
        mgr.record_call_result(3, &serde_json::json!("second"));
        let snapshots = mgr.into_snapshots();
        assert_eq!(snapshots.len(), 1);
        assert_eq!(snapshots[0].result, Some(SerializedValue::String { value: "first".into() }));
    }

    #[test]
    fn from_existing_reseeds_both_statement_and_cache_lookups() {
        let mut seed = StateManager::fresh();
        seed.record_call_result(1, &serde_json::json!("a"));
        seed.cache_set(2, "k".to_string(), &serde_json::json!("v"));
        let snapshots = seed.into_snapshots();
        assert_eq!(snapshots.len(), 2);

        let mut mgr = StateManager::from_existing(snapshots);
        assert_eq!(mgr.cache_get("k"), Some(serde_json::json!("v")));
        // Re-recording statement 1 is still a no-op against the reseeded table.
        mgr.record_call_result(1, &serde_json::json!("b"));
        assert_eq!(mgr.into_snapshots().len(), 2);
    }
}
