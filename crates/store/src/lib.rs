pub mod file;
pub mod key;
pub mod memory;
pub mod metrics;

use async_trait::async_trait;
use atp_domain::error::Result;
use atp_domain::model::ExecutionRecord;

pub use metrics::MetricsSnapshot;

/// The KV contract C7 needs: durable, tenant-scoped storage for paused
/// executions, with TTL-driven garbage collection (§4.7).
///
/// Implementations decide for themselves whether GC happens eagerly on
/// every `get` or only during `gc_sweep`; both are required to eventually
/// reclaim expired records, since nothing else calls `delete` for them.
#[async_trait]
pub trait ExecutionStore: Send + Sync {
    async fn put(&self, record: ExecutionRecord) -> Result<()>;

    /// Returns `None` both when the key was never written and when it has
    /// expired — callers can't distinguish the two, matching the `not_found`
    /// error kind a caller sees either way.
    async fn get(&self, tenant_id: &str, execution_id: &str) -> Result<Option<ExecutionRecord>>;

    async fn delete(&self, tenant_id: &str, execution_id: &str) -> Result<()>;

    /// Resolves which tenant owns `execution_id`, regardless of the
    /// caller's claimed tenant. Used only to tell a cross-tenant resume
    /// attempt (`forbidden`) apart from one naming an execution that
    /// simply doesn't exist (`not_found`) — §4.8's resume authorization
    /// rule needs that distinction and a tenant-scoped `get` can't make it.
    async fn owner_tenant(&self, execution_id: &str) -> Result<Option<String>>;

    /// Scans for expired records and removes them, returning how many were
    /// reclaimed. Called by the gateway's periodic background sweep.
    async fn gc_sweep(&self) -> Result<usize>;

    fn metrics(&self) -> MetricsSnapshot;
}

pub use file::FileStore;
pub use memory::MemoryStore;
