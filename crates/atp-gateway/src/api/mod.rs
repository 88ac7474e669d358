pub mod auth;
pub mod definitions;
pub mod execute;
pub mod info;
pub mod init;
pub mod resume;
mod wire;

use axum::middleware;
use axum::routing::{get, post};
use axum::Router;

use crate::state::AppState;

/// Build the full API router (§6).
///
/// `/info` and `/init` are public; `/definitions`, `/execute`, and
/// `/resume/:exec_id` sit behind [`auth::require_session`].
pub fn router(state: AppState) -> Router<AppState> {
    let public = Router::new()
        .route("/info", get(info::info))
        .route("/init", post(init::init));

    let protected = Router::new()
        .route("/definitions", get(definitions::definitions))
        .route("/execute", post(execute::execute))
        .route("/resume/:execution_id", post(resume::resume))
        .route_layer(middleware::from_fn_with_state(state, auth::require_session));

    public.merge(protected).layer(tower_http::trace::TraceLayer::new_for_http())
}
