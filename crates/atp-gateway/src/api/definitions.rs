//! `GET /definitions` — TypeScript-ish type text for the `atp.*`/`api.*`
//! surface, filtered to the tenant's current session's registered
//! services (§4.2, §6).

use axum::extract::State;
use axum::response::IntoResponse;
use axum::Extension;

use atp_domain::model::ClientTool;

use crate::api::auth::AuthedTenant;
use crate::state::AppState;

const BUILTIN_DEFINITIONS: &str = r#"declare namespace atp {
  namespace llm {
    function call(args: { prompt: string; model?: string }): Promise<string>;
  }
  namespace approval {
    function request(args: { message: string }): Promise<boolean>;
  }
  namespace embedding {
    function compute(args: { text: string }): Promise<number[]>;
  }
  namespace progress {
    function report(args: { message: string; fraction?: number }): Promise<void>;
  }
  namespace log {
    function write(args: { message: string }): Promise<void>;
  }
  namespace cache {
    function get(args: { key: string }): Promise<unknown>;
    function set(args: { key: string; value: unknown }): Promise<void>;
  }
}
"#;

pub async fn definitions(
    State(state): State<AppState>,
    Extension(AuthedTenant(tenant_id)): Extension<AuthedTenant>,
) -> impl IntoResponse {
    let session = state.sessions.get_by_tenant(&tenant_id);
    let mut out = BUILTIN_DEFINITIONS.to_string();

    let tools: Vec<ClientTool> = session
        .map(|s| {
            if s.registered_services.is_empty() {
                s.registered_tools
            } else {
                s.registered_tools
                    .into_iter()
                    .filter(|t| s.registered_services.contains(&t.namespace))
                    .collect()
            }
        })
        .unwrap_or_default();

    if !tools.is_empty() {
        out.push_str("\ndeclare namespace api {\n");
        let mut namespaces: Vec<&str> = tools.iter().map(|t| t.namespace.as_str()).collect();
        namespaces.sort_unstable();
        namespaces.dedup();
        for ns in namespaces {
            out.push_str(&format!("  namespace {ns} {{\n"));
            for tool in tools.iter().filter(|t| t.namespace == ns) {
                out.push_str(&format!(
                    "    // {operation_type}{approval}\n    function {name}(args: {schema}): Promise<unknown>;\n",
                    operation_type = tool.metadata.operation_type,
                    approval = if tool.metadata.requires_approval { ", requires approval" } else { "" },
                    name = tool.name,
                    schema = tool.input_schema,
                ));
            }
            out.push_str("  }\n");
        }
        out.push_str("}\n");
    }

    ([("content-type", "text/plain")], out)
}
