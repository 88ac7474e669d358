//! Builds the `atp.*`/`api.*` JS-facing surface (§4.2) that gets evaluated
//! into a fresh context before user code runs.
//!
//! Every leaf is a thin wrapper around one native entry point,
//! `__atp_host_call`: it JSON-encodes its arguments, calls the native
//! function, and `JSON.parse`s the result. Routing every call through one
//! native function keeps the boundary between Rust and the engine to a
//! single, simple signature (string in, string out) instead of needing
//! per-operation `JsValue` marshalling.
//!
//! `__atp_host_call` never throws to signal a pause. When the call pauses
//! the execution it returns the bare sentinel string `__atp_pause__` as an
//! ordinary value, and the leaf below responds by `await`ing a promise that
//! never settles — suspending this call (and everything awaiting it) without
//! ever raising a catchable exception, so a user's own `try`/`catch` cannot
//! observe or swallow a pause.

use atp_domain::model::ClientTool;

use crate::signal::PAUSE_SENTINEL;

const BUILTIN_NAMESPACES: &[(&str, &[(&str, &str)])] = &[
    ("llm", &[("call", "llm")]),
    ("approval", &[("request", "approval")]),
    ("embedding", &[("compute", "embedding")]),
    ("progress", &[("report", "progress")]),
    ("log", &[("write", "log")]),
    ("cache", &[("get", "cache"), ("set", "cache")]),
];

/// Generate the full prelude script: `atp.{llm,approval,embedding,progress,
/// log,cache}` plus `api.{namespace}.{name}` for every registered client
/// tool, each call routed through `__atp_host_call`.
pub fn build_prelude(tools: &[ClientTool]) -> String {
    let mut out = String::new();
    out.push_str("globalThis.atp = {};\n");
    for (ns, fns) in BUILTIN_NAMESPACES {
        out.push_str(&format!("atp.{ns} = {{}};\n"));
        for (fn_name, kind) in *fns {
            out.push_str(&leaf_fn("atp", ns, fn_name, kind));
        }
    }

    out.push_str("globalThis.api = {};\n");
    for tool in tools {
        out.push_str(&format!(
            "if (!api.{ns}) api.{ns} = {{}};\n",
            ns = tool.namespace
        ));
        out.push_str(&leaf_fn("api", &tool.namespace, &tool.name, "client_tool"));
    }
    out
}

fn leaf_fn(root: &str, ns: &str, name: &str, kind: &str) -> String {
    format!(
        r#"{root}.{ns}.{name} = async function(args) {{
  const __payload = JSON.stringify({{
    kind: "{kind}",
    operation: "{root}.{ns}.{name}",
    args: args === undefined ? {{}} : args,
  }});
  const __result = __atp_host_call(__payload);
  if (__result === "{PAUSE_SENTINEL}") {{
    // The call paused; hang here forever rather than ever resolving or
    // rejecting, so no enclosing try/catch observes anything.
    await new Promise(() => {{}});
  }}
  return JSON.parse(__result);
}};
"#,
    )
}
