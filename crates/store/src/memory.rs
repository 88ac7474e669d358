use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use atp_domain::error::Result;
use atp_domain::model::ExecutionRecord;
use parking_lot::RwLock;

use crate::key::execution_key;
use crate::metrics::{Metrics, MetricsSnapshot};
use crate::ExecutionStore;

/// Single-process backend: the default, since a lone gateway instance
/// needs nothing shared (§4.7). Lost on restart, which is acceptable only
/// because the non-goals exclude cross-instance parallel execution of the
/// same run — a restart just means in-flight pauses expire.
pub struct MemoryStore {
    entries: RwLock<HashMap<String, ExecutionRecord>>,
    metrics: Metrics,
    ttl: Duration,
    max_pause_duration: Duration,
}

impl MemoryStore {
    pub fn new(ttl: Duration, max_pause_duration: Duration) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            metrics: Metrics::default(),
            ttl,
            max_pause_duration,
        }
    }

    fn is_expired(&self, record: &ExecutionRecord, now: chrono::DateTime<chrono::Utc>) -> bool {
        if let Some(paused_at) = record.paused_at {
            let max = chrono::Duration::from_std(self.max_pause_duration).unwrap_or_default();
            now - paused_at > max
        } else {
            let ttl = chrono::Duration::from_std(self.ttl).unwrap_or_default();
            now - record.updated_at > ttl
        }
    }
}

#[async_trait]
impl ExecutionStore for MemoryStore {
    async fn put(&self, record: ExecutionRecord) -> Result<()> {
        if record.is_paused() {
            self.metrics.record_pause();
        } else {
            self.metrics.record_resume();
        }
        let key = execution_key(&record.tenant_id, &record.execution_id);
        self.entries.write().insert(key, record);
        Ok(())
    }

    async fn get(&self, tenant_id: &str, execution_id: &str) -> Result<Option<ExecutionRecord>> {
        let key = execution_key(tenant_id, execution_id);
        let now = chrono::Utc::now();

        let expired = {
            let guard = self.entries.read();
            match guard.get(&key) {
                Some(record) => self.is_expired(record, now),
                None => return Ok(None),
            }
        };

        if expired {
            self.entries.write().remove(&key);
            self.metrics.record_expired();
            return Ok(None);
        }

        Ok(self.entries.read().get(&key).cloned())
    }

    async fn delete(&self, tenant_id: &str, execution_id: &str) -> Result<()> {
        let key = execution_key(tenant_id, execution_id);
        self.entries.write().remove(&key);
        Ok(())
    }

    async fn owner_tenant(&self, execution_id: &str) -> Result<Option<String>> {
        let now = chrono::Utc::now();
        Ok(self
            .entries
            .read()
            .values()
            .find(|r| r.execution_id == execution_id && !self.is_expired(r, now))
            .map(|r| r.tenant_id.clone()))
    }

    async fn gc_sweep(&self) -> Result<usize> {
        let now = chrono::Utc::now();
        let expired_keys: Vec<String> = self
            .entries
            .read()
            .iter()
            .filter(|(_, record)| self.is_expired(record, now))
            .map(|(k, _)| k.clone())
            .collect();

        let mut guard = self.entries.write();
        for key in &expired_keys {
            guard.remove(key);
        }
        drop(guard);

        for _ in &expired_keys {
            self.metrics.record_expired();
        }
        Ok(expired_keys.len())
    }

    fn metrics(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_record(execution_id: &str, paused: bool) -> ExecutionRecord {
        let now = chrono::Utc::now();
        ExecutionRecord {
            execution_id: execution_id.into(),
            tenant_id: "acme".into(),
            transformed_code: String::new(),
            config: serde_json::json!({}),
            callback_history: vec![],
            pending_callback: None,
            statement_snapshots: vec![],
            paused_at: if paused { Some(now) } else { None },
            context: serde_json::json!({}),
            provenance_snapshot: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[tokio::test]
    async fn put_then_get_round_trips() {
        let store = MemoryStore::new(Duration::from_secs(3600), Duration::from_secs(3600));
        store.put(sample_record("e1", false)).await.unwrap();
        let got = store.get("acme", "e1").await.unwrap();
        assert!(got.is_some());
        assert_eq!(got.unwrap().execution_id, "e1");
    }

    #[tokio::test]
    async fn get_missing_returns_none() {
        let store = MemoryStore::new(Duration::from_secs(3600), Duration::from_secs(3600));
        assert!(store.get("acme", "nope").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn expired_paused_record_is_gced_on_read() {
        let store = MemoryStore::new(Duration::from_secs(3600), Duration::from_millis(1));
        store.put(sample_record("e1", true)).await.unwrap();
        tokio::time::sleep(Duration::from_millis(10)).await;
        let got = store.get("acme", "e1").await.unwrap();
        assert!(got.is_none());
        assert_eq!(store.metrics().total_expired, 1);
    }

    #[tokio::test]
    async fn owner_tenant_finds_the_record_under_any_tenant() {
        let store = MemoryStore::new(Duration::from_secs(3600), Duration::from_secs(3600));
        store.put(sample_record("e1", false)).await.unwrap();
        assert_eq!(store.owner_tenant("e1").await.unwrap(), Some("acme".to_string()));
        assert!(store.owner_tenant("nope").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn delete_removes_record() {
        let store = MemoryStore::new(Duration::from_secs(3600), Duration::from_secs(3600));
        store.put(sample_record("e1", false)).await.unwrap();
        store.delete("acme", "e1").await.unwrap();
        assert!(store.get("acme", "e1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn gc_sweep_reclaims_expired_without_a_read() {
        let store = MemoryStore::new(Duration::from_secs(3600), Duration::from_millis(1));
        store.put(sample_record("e1", true)).await.unwrap();
        tokio::time::sleep(Duration::from_millis(10)).await;
        let reclaimed = store.gc_sweep().await.unwrap();
        assert_eq!(reclaimed, 1);
    }

    #[tokio::test]
    async fn metrics_count_pauses_and_resumes() {
        let store = MemoryStore::new(Duration::from_secs(3600), Duration::from_secs(3600));
        store.put(sample_record("e1", true)).await.unwrap();
        store.put(sample_record("e2", false)).await.unwrap();
        let snap = store.metrics();
        assert_eq!(snap.total_pauses, 1);
        assert_eq!(snap.total_resumes, 1);
    }
}
