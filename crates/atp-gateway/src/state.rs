use std::sync::Arc;

use atp_domain::config::Config;
use atp_engine::Orchestrator;
use atp_sessions::{SessionStore, TokenManager};

/// Shared application state passed to every API handler.
///
/// Unlike the orchestrator, which knows nothing of HTTP or sessions, this
/// is the seam where the request boundary (auth headers, sliding-window
/// tokens, session lookup) meets the engine (§4.9's `execute`/`resume`).
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub orchestrator: Arc<Orchestrator>,
    pub sessions: Arc<SessionStore>,
    pub tokens: Arc<TokenManager>,
}
