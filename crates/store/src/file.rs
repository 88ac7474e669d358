use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use atp_domain::error::{Error, Result};
use atp_domain::model::ExecutionRecord;

use crate::key::{execution_key, key_to_filename};
use crate::metrics::{Metrics, MetricsSnapshot};
use crate::ExecutionStore;

/// Shared-filesystem backend selected via `STATE_STORE_URL=file://<dir>`,
/// for deployments running more than one gateway instance behind a load
/// balancer where a resume may land on a different process than the one
/// that paused (§4.7). One record per file, named after its key.
pub struct FileStore {
    dir: PathBuf,
    metrics: Metrics,
    ttl: Duration,
    max_pause_duration: Duration,
}

impl FileStore {
    pub fn new(dir: PathBuf, ttl: Duration, max_pause_duration: Duration) -> Self {
        Self {
            dir,
            metrics: Metrics::default(),
            ttl,
            max_pause_duration,
        }
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(key_to_filename(key))
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

    async fn read_record(&self, path: &PathBuf) -> Result<Option<ExecutionRecord>> {
        match tokio::fs::read(path).await {
            Ok(bytes) => {
                let record: ExecutionRecord = serde_json::from_slice(&bytes)?;
                Ok(Some(record))
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(Error::Io(e)),
        }
    }
}

#[async_trait]
impl ExecutionStore for FileStore {
    async fn put(&self, record: ExecutionRecord) -> Result<()> {
        tokio::fs::create_dir_all(&self.dir).await?;
        let key = execution_key(&record.tenant_id, &record.execution_id);
        let path = self.path_for(&key);
        let bytes = serde_json::to_vec_pretty(&record)?;

        // Write-then-rename keeps a concurrent reader from ever observing
        // a half-written file.
        let tmp_path = path.with_extension("json.tmp");
        tokio::fs::write(&tmp_path, bytes).await?;
        tokio::fs::rename(&tmp_path, &path).await?;

        if record.is_paused() {
            self.metrics.record_pause();
        } else {
            self.metrics.record_resume();
        }
        Ok(())
    }

    async fn get(&self, tenant_id: &str, execution_id: &str) -> Result<Option<ExecutionRecord>> {
        let key = execution_key(tenant_id, execution_id);
        let path = self.path_for(&key);

        let Some(record) = self.read_record(&path).await? else {
            return Ok(None);
        };

        if self.is_expired(&record, chrono::Utc::now()) {
            let _ = tokio::fs::remove_file(&path).await;
            self.metrics.record_expired();
            return Ok(None);
        }

        Ok(Some(record))
    }

    async fn delete(&self, tenant_id: &str, execution_id: &str) -> Result<()> {
        let key = execution_key(tenant_id, execution_id);
        let path = self.path_for(&key);
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(Error::Io(e)),
        }
    }

    async fn owner_tenant(&self, execution_id: &str) -> Result<Option<String>> {
        let mut entries = match tokio::fs::read_dir(&self.dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(Error::Io(e)),
        };

        let now = chrono::Utc::now();
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            if let Some(record) = self.read_record(&path).await? {
                if record.execution_id == execution_id && !self.is_expired(&record, now) {
                    return Ok(Some(record.tenant_id));
                }
            }
        }
        Ok(None)
    }

    async fn gc_sweep(&self) -> Result<usize> {
        let mut reclaimed = 0;
        let mut entries = match tokio::fs::read_dir(&self.dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(0),
            Err(e) => return Err(Error::Io(e)),
        };

        let now = chrono::Utc::now();
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            if let Some(record) = self.read_record(&path).await? {
                if self.is_expired(&record, now) {
                    let _ = tokio::fs::remove_file(&path).await;
                    self.metrics.record_expired();
                    reclaimed += 1;
                }
            }
        }
        Ok(reclaimed)
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
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path().to_path_buf(), Duration::from_secs(3600), Duration::from_secs(3600));
        store.put(sample_record("e1", false)).await.unwrap();
        let got = store.get("acme", "e1").await.unwrap();
        assert_eq!(got.unwrap().execution_id, "e1");
    }

    #[tokio::test]
    async fn get_missing_returns_none() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path().to_path_buf(), Duration::from_secs(3600), Duration::from_secs(3600));
        assert!(store.get("acme", "nope").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn expired_paused_record_is_gced_on_read() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path().to_path_buf(), Duration::from_secs(3600), Duration::from_millis(1));
        store.put(sample_record("e1", true)).await.unwrap();
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(store.get("acme", "e1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn gc_sweep_reclaims_expired_files() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path().to_path_buf(), Duration::from_secs(3600), Duration::from_millis(1));
        store.put(sample_record("e1", true)).await.unwrap();
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(store.gc_sweep().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn owner_tenant_finds_the_record_under_any_tenant() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path().to_path_buf(), Duration::from_secs(3600), Duration::from_secs(3600));
        store.put(sample_record("e1", false)).await.unwrap();
        assert_eq!(store.owner_tenant("e1").await.unwrap(), Some("acme".to_string()));
        assert!(store.owner_tenant("nope").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn delete_is_idempotent_on_missing_key() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path().to_path_buf(), Duration::from_secs(3600), Duration::from_secs(3600));
        store.delete("acme", "nope").await.unwrap();
    }
}
