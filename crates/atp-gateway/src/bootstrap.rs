//! Wires the durable store, provenance cache, session/token managers and
//! the orchestrator into one [`AppState`], reading the security-sensitive
//! secrets from the environment (§6) rather than the config file.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use atp_domain::config::Config;
use atp_engine::Orchestrator;
use atp_provenance::MetadataCache;
use atp_sessions::{SessionStore, TokenManager};
use atp_store::{ExecutionStore, FileStore, MemoryStore};

use crate::state::AppState;

/// Select the execution-state store backend. `STATE_STORE_URL` (env)
/// overrides `store.url` (config file); unset/`memory://` means in-process
/// only, `file://<dir>` is the shared-filesystem backend required for a
/// multi-instance deployment (§4.7).
fn build_store(config: &Config) -> anyhow::Result<Arc<dyn ExecutionStore>> {
    let url = std::env::var("STATE_STORE_URL")
        .ok()
        .or_else(|| config.store.url.clone());
    let ttl = Duration::from_secs(config.store.execution_ttl_secs);
    let max_pause = Duration::from_secs(config.store.max_pause_duration_secs);

    match url.as_deref() {
        None | Some("") | Some("memory://") => {
            tracing::info!("execution state store: in-memory (single instance)");
            Ok(Arc::new(MemoryStore::new(ttl, max_pause)))
        }
        Some(url) if url.starts_with("file://") => {
            let dir = PathBuf::from(url.trim_start_matches("file://"));
            std::fs::create_dir_all(&dir)
                .with_context(|| format!("creating state store directory {}", dir.display()))?;
            tracing::info!(dir = %dir.display(), "execution state store: shared filesystem");
            Ok(Arc::new(FileStore::new(dir, ttl, max_pause)))
        }
        Some(other) => anyhow::bail!("unrecognized STATE_STORE_URL scheme: {other}"),
    }
}

fn read_secret(env_var: &str, min_len: usize) -> anyhow::Result<Vec<u8>> {
    let value = std::env::var(env_var)
        .with_context(|| format!("{env_var} is required but not set"))?;
    if value.len() < min_len {
        anyhow::bail!("{env_var} must be at least {min_len} bytes (got {})", value.len());
    }
    Ok(value.into_bytes())
}

/// Build the full application state. Called once at startup by `serve`,
/// and again by any one-shot CLI command that needs to drive the engine.
pub async fn build_app_state(config: Arc<Config>) -> anyhow::Result<AppState> {
    let store = build_store(&config)?;

    let provenance_secret = if config.provenance.mode != atp_domain::config::ProvenanceMode::None {
        read_secret(&config.provenance.secret_env, 32)?
    } else {
        Vec::new()
    };
    let provenance_cache = Arc::new(MetadataCache::new(Duration::from_secs(
        config.store.execution_ttl_secs,
    )));

    let session_secret = read_secret(&config.sessions.secret_env, 32)?;
    let tokens = Arc::new(TokenManager::new(
        session_secret,
        Duration::from_secs(config.sessions.token_ttl_secs),
    ));
    let sessions = Arc::new(SessionStore::new());

    let orchestrator = Arc::new(Orchestrator::new(
        store,
        provenance_cache,
        (*config).clone(),
        provenance_secret,
    ));

    Ok(AppState {
        config,
        orchestrator,
        sessions,
        tokens,
    })
}
