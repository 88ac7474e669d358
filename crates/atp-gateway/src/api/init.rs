//! `POST /init` — create a session and issue the first token (§4.8, §6).

use axum::extract::State;
use axum::http::HeaderValue;
use axum::response::IntoResponse;
use axum::Json;
use serde::Deserialize;

use atp_domain::error::Error;
use atp_domain::model::ClientTool;

use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct InitRequest {
    pub tenant_id: String,
    #[serde(default)]
    pub registered_services: Vec<String>,
    #[serde(default)]
    pub registered_tools: Vec<ClientTool>,
}

pub async fn init(State(state): State<AppState>, Json(body): Json<InitRequest>) -> axum::response::Response {
    if body.tenant_id.is_empty() {
        return crate::error::to_response(&Error::ValidationFailed("tenant_id must not be empty".into()));
    }

    let session = state.sessions.create(&body.tenant_id, body.registered_services, body.registered_tools);
    let token = match state.tokens.issue(&body.tenant_id) {
        Ok(t) => t,
        Err(e) => return crate::error::to_response(&e),
    };
    let expires_at = match state.tokens.verify(&token) {
        Ok(c) => c.expires_at,
        Err(e) => return crate::error::to_response(&e),
    };

    let mut response = Json(serde_json::json!({
        "session_id": session.session_id,
        "tenant_id": session.tenant_id,
        "token": token,
        "token_expires_at": expires_at,
    }))
    .into_response();

    let headers = response.headers_mut();
    if let Ok(v) = HeaderValue::from_str(&token) {
        headers.insert("x-session-token", v);
    }
    if let Ok(v) = HeaderValue::from_str(&expires_at.to_rfc3339()) {
        headers.insert("x-session-token-expires", v);
    }
    response
}
