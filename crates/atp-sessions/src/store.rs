//! In-memory session records.
//!
//! A session holds no pause state — that lives in `ExecutionRecord` via
//! `atp-store` — so there is nothing here that needs to survive a restart.
//! A session just remembers which client tools an `/init` call registered,
//! so a later `/execute` on the same session can resolve `api.*` calls.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use atp_domain::model::ClientTool;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionRecord {
    pub session_id: String,
    pub tenant_id: String,
    pub registered_services: Vec<String>,
    pub registered_tools: Vec<ClientTool>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

pub struct SessionStore {
    sessions: RwLock<HashMap<String, SessionRecord>>,
    /// Index of each tenant's most recently created session. Requests carry
    /// `X-Tenant-Id` plus a tenant-scoped bearer token but no session-id
    /// header (§6), so a tenant's active session is "whichever `/init` ran
    /// last" — a fresh `/init` replaces the previous session in this index.
    by_tenant: RwLock<HashMap<String, String>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            by_tenant: RwLock::new(HashMap::new()),
        }
    }

    pub fn create(
        &self,
        tenant_id: &str,
        registered_services: Vec<String>,
        registered_tools: Vec<ClientTool>,
    ) -> SessionRecord {
        let now = Utc::now();
        let record = SessionRecord {
            session_id: uuid::Uuid::new_v4().to_string(),
            tenant_id: tenant_id.to_string(),
            registered_services,
            registered_tools,
            created_at: now,
            updated_at: now,
        };
        self.sessions
            .write()
            .insert(record.session_id.clone(), record.clone());
        self.by_tenant
            .write()
            .insert(tenant_id.to_string(), record.session_id.clone());
        record
    }

    pub fn get(&self, session_id: &str) -> Option<SessionRecord> {
        self.sessions.read().get(session_id).cloned()
    }

    /// Look up a tenant's current session, if `/init` has been called.
    pub fn get_by_tenant(&self, tenant_id: &str) -> Option<SessionRecord> {
        let session_id = self.by_tenant.read().get(tenant_id).cloned()?;
        self.get(&session_id)
    }

    pub fn touch(&self, session_id: &str) {
        if let Some(record) = self.sessions.write().get_mut(session_id) {
            record.updated_at = Utc::now();
        }
    }

    pub fn remove(&self, session_id: &str) -> Option<SessionRecord> {
        let record = self.sessions.write().remove(session_id)?;
        let mut by_tenant = self.by_tenant.write();
        if by_tenant.get(&record.tenant_id) == Some(&record.session_id) {
            by_tenant.remove(&record.tenant_id);
        }
        Some(record)
    }
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::new()
    }
}
