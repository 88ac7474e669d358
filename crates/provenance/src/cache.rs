//! The shared metadata cache a [`crate::token::ProvenanceToken`] points
//! into (§3, §4.6): `prov:meta:{tenant_id}:{metadata_ref}` → full
//! [`ProvenanceMetadata`]. Tokens stay small by carrying only a reference;
//! this is where the referenced record actually lives.
//!
//! TTL tracks the execution TTL, not the token's own expiry — a metadata
//! record must outlive every token that could still reference it.

use std::collections::HashMap;
use std::time::Duration;

use parking_lot::RwLock;

use crate::origin::ProvenanceMetadata;

fn cache_key(tenant_id: &str, metadata_ref: &str) -> String {
    format!("prov:meta:{tenant_id}:{metadata_ref}")
}

struct Entry {
    metadata: ProvenanceMetadata,
    expires_at: std::time::Instant,
}

/// In-memory metadata cache, sized for a single gateway instance. Matches
/// the store crate's `MemoryStore` shape: `RwLock<HashMap<_>>` plus
/// expire-on-read and a periodic sweep.
pub struct MetadataCache {
    entries: RwLock<HashMap<String, Entry>>,
    ttl: Duration,
}

impl MetadataCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            ttl,
        }
    }

    pub fn put(&self, tenant_id: &str, metadata_ref: &str, metadata: ProvenanceMetadata) {
        let key = cache_key(tenant_id, metadata_ref);
        let expires_at = std::time::Instant::now() + self.ttl;
        self.entries.write().insert(key, Entry { metadata, expires_at });
    }

    pub fn get(&self, tenant_id: &str, metadata_ref: &str) -> Option<ProvenanceMetadata> {
        let key = cache_key(tenant_id, metadata_ref);
        let now = std::time::Instant::now();
        let expired = match self.entries.read().get(&key) {
            Some(entry) => entry.expires_at <= now,
            None => return None,
        };
        if expired {
            self.entries.write().remove(&key);
            return None;
        }
        self.entries.read().get(&key).map(|e| e.metadata.clone())
    }

    /// Drop every record past its TTL; returns how many were reclaimed.
    pub fn gc_sweep(&self) -> usize {
        let now = std::time::Instant::now();
        let expired: Vec<String> = self
            .entries
            .read()
            .iter()
            .filter(|(_, e)| e.expires_at <= now)
            .map(|(k, _)| k.clone())
            .collect();
        let mut guard = self.entries.write();
        for key in &expired {
            guard.remove(key);
        }
        expired.len()
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
