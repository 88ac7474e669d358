//! End-to-end scenarios driven straight through the HTTP router with
//! [`tower::ServiceExt::oneshot`] — no socket, no separate process, but
//! every layer from session auth down to the sandbox actually runs.

use std::path::PathBuf;
use std::sync::{Arc, Once};
use std::time::Duration;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use tower::ServiceExt;

use atp_domain::config::Config;
use atp_gateway::{bootstrap, api};

fn set_test_env() {
    static ONCE: Once = Once::new();
    ONCE.call_once(|| {
        std::env::set_var("SESSION_SECRET", "01234567890123456789012345678901");
        std::env::set_var("PROVENANCE_SECRET", "98765432109876543210987654321098");
    });
}

fn memory_config() -> Config {
    let mut config = Config::default();
    config.store.url = None;
    config
}

fn file_config(dir: &PathBuf) -> Config {
    let mut config = Config::default();
    config.store.url = Some(format!("file://{}", dir.display()));
    config
}

async fn router_for(config: Config) -> Router {
    set_test_env();
    let state = bootstrap::build_app_state(Arc::new(config)).await.unwrap();
    api::router(state.clone()).with_state(state)
}

async fn body_json(response: axum::response::Response) -> (StatusCode, Value) {
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let value: Value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, value)
}

async fn init(router: &Router, tenant: &str, tools: Vec<Value>) -> String {
    let body = json!({ "tenant_id": tenant, "registered_tools": tools });
    let req = Request::builder()
        .method("POST")
        .uri("/init")
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();
    let (status, value) = body_json(router.clone().oneshot(req).await.unwrap()).await;
    assert_eq!(status, StatusCode::OK, "init failed: {value:?}");
    value["token"].as_str().unwrap().to_string()
}

async fn execute(router: &Router, tenant: &str, token: &str, code: &str) -> (StatusCode, Value) {
    let body = json!({ "code": code });
    let req = Request::builder()
        .method("POST")
        .uri("/execute")
        .header("content-type", "application/json")
        .header("authorization", format!("Bearer {token}"))
        .header("x-tenant-id", tenant)
        .body(Body::from(body.to_string()))
        .unwrap();
    body_json(router.clone().oneshot(req).await.unwrap()).await
}

async fn resume(router: &Router, tenant: &str, token: &str, execution_id: &str, body: Value) -> (StatusCode, Value) {
    let req = Request::builder()
        .method("POST")
        .uri(format!("/resume/{execution_id}"))
        .header("content-type", "application/json")
        .header("authorization", format!("Bearer {token}"))
        .header("x-tenant-id", tenant)
        .body(Body::from(body.to_string()))
        .unwrap();
    body_json(router.clone().oneshot(req).await.unwrap()).await
}

fn client_tool(namespace: &str, name: &str) -> Value {
    json!({
        "namespace": namespace,
        "name": name,
        "input_schema": {},
        "metadata": { "operation_type": "read", "sensitivity": "internal", "requires_approval": false },
    })
}

/// Scenario 1: a single `atp.llm.call` pauses the run, and the settled
/// result it's resumed with flows straight back out as the return value.
#[tokio::test]
async fn single_llm_call_pauses_then_completes() {
    let router = router_for(memory_config()).await;
    let token = init(&router, "acme", vec![]).await;

    let (status, body) = execute(
        &router,
        "acme",
        &token,
        "const r = await atp.llm.call({prompt: 'hi'}); return {r};",
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "paused");
    assert_eq!(body["callback"]["operation"], "atp.llm.call");
    let execution_id = body["execution_id"].as_str().unwrap();

    let (status, body) = resume(
        &router,
        "acme",
        &token,
        execution_id,
        json!({ "result": "hello from the model" }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "completed");
    assert_eq!(body["result"]["r"], "hello from the model");
}

/// Scenario 2: two sequential awaited calls pause twice, in order, each
/// resume unblocking exactly the next one.
#[tokio::test]
async fn sequential_llm_calls_pause_twice() {
    let router = router_for(memory_config()).await;
    let token = init(&router, "acme", vec![]).await;

    let (status, body) = execute(
        &router,
        "acme",
        &token,
        "const a = await atp.llm.call({prompt: 'first'}); \
         const b = await atp.llm.call({prompt: 'second'}); \
         return {a, b};",
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "paused");
    let execution_id = body["execution_id"].as_str().unwrap().to_string();

    let (status, body) = resume(&router, "acme", &token, &execution_id, json!({ "result": "A" })).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "paused", "expected a second pause, got {body:?}");

    let (status, body) = resume(&router, "acme", &token, &execution_id, json!({ "result": "B" })).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "completed");
    assert_eq!(body["result"]["a"], "A");
    assert_eq!(body["result"]["b"], "B");
    // The second resume re-walks (but must not re-emit) the already-settled
    // first call: exactly two LLM calls happened, not three.
    assert_eq!(body["stats"]["llm_calls"], 2);
}

/// `atp.cache` (C5, §4.5): a value stashed before a pause is still there,
/// unchanged, after the resume re-walks the whole script from the top.
#[tokio::test]
async fn cache_set_before_a_pause_survives_the_resume_replay() {
    let router = router_for(memory_config()).await;
    let token = init(&router, "acme", vec![]).await;

    let (status, body) = execute(
        &router,
        "acme",
        &token,
        "await atp.cache.set({key: 'greeting', value: 'hello'}); \
         const r = await atp.llm.call({prompt: 'first'}); \
         const cached = await atp.cache.get({key: 'greeting'}); \
         return {r, cached};",
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "paused");
    let execution_id = body["execution_id"].as_str().unwrap().to_string();

    let (status, body) = resume(&router, "acme", &token, &execution_id, json!({ "result": "A" })).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "completed");
    assert_eq!(body["result"]["r"], "A");
    assert_eq!(body["result"]["cached"], "hello");
}

/// Scenario 3: `Array.prototype.map` over independent awaited calls is the
/// batch optimizer's eligible shape — one pause carries every sub-call,
/// resumed with one `{sub_id, result}` per slot.
#[tokio::test]
async fn parallel_batch_pauses_once_for_every_sub_call() {
    let router = router_for(memory_config()).await;
    let token = init(&router, "acme", vec![]).await;

    let (status, body) = execute(
        &router,
        "acme",
        &token,
        "const items = [1, 2, 3]; \
         const results = await Promise.all(items.map(async (x) => { return await atp.llm.call({n: x}); })); \
         return results;",
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "paused");
    let execution_id = body["execution_id"].as_str().unwrap().to_string();
    let batch = body["batch"].as_array().expect("batch payload");
    assert_eq!(batch.len(), 3);

    let results: Vec<Value> = batch
        .iter()
        .map(|sub| json!({ "sub_id": sub["sub_id"], "result": format!("r{}", sub["sub_id"]) }))
        .collect();
    let (status, body) = resume(&router, "acme", &token, &execution_id, json!({ "results": results })).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "completed");
    assert_eq!(body["result"], json!(["r0", "r1", "r2"]));
}

/// Scenario 4: a pause recorded by one gateway instance resumes cleanly
/// on another, via the shared filesystem store (§4.7).
#[tokio::test]
async fn cross_instance_resume_via_shared_file_store() {
    let dir = tempfile::tempdir().unwrap();
    let router_a = router_for(file_config(&dir.path().to_path_buf())).await;
    let router_b = router_for(file_config(&dir.path().to_path_buf())).await;

    let token = init(&router_a, "acme", vec![]).await;
    let (status, body) = execute(&router_a, "acme", &token, "const r = await atp.llm.call({prompt: 'hi'}); return r;").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "paused");
    let execution_id = body["execution_id"].as_str().unwrap().to_string();

    // Resumed against a different `AppState`/router sharing only the
    // on-disk store and the process-wide session secret.
    let (status, body) = resume(&router_b, "acme", &token, &execution_id, json!({ "result": "ok" })).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "completed");
    assert_eq!(body["result"], "ok");
}

/// Scenario 5: a pause older than `max_pause_duration_secs` is reclaimed
/// before a resume can reach it — surfaced as `not_found` (§4.7).
#[tokio::test]
async fn expired_resume_reports_not_found() {
    let mut config = memory_config();
    config.store.max_pause_duration_secs = 0;
    let router = router_for(config).await;
    let token = init(&router, "acme", vec![]).await;

    let (status, body) = execute(&router, "acme", &token, "const r = await atp.llm.call({prompt: 'hi'}); return r;").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "paused");
    let execution_id = body["execution_id"].as_str().unwrap().to_string();

    tokio::time::sleep(Duration::from_millis(10)).await;

    let (status, body) = resume(&router, "acme", &token, &execution_id, json!({ "result": "too late" })).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["kind"], "not_found");
}

/// Scenario 6: a resume naming another tenant's execution is rejected as
/// `forbidden`, distinct from the `not_found` an unknown id gets (§4.8).
#[tokio::test]
async fn cross_tenant_resume_is_forbidden() {
    let router = router_for(memory_config()).await;
    let token_a = init(&router, "tenant-a", vec![]).await;
    let token_b = init(&router, "tenant-b", vec![]).await;

    let (status, body) = execute(&router, "tenant-a", &token_a, "const r = await atp.llm.call({prompt: 'hi'}); return r;").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "paused");
    let execution_id = body["execution_id"].as_str().unwrap().to_string();

    let (status, body) = resume(&router, "tenant-b", &token_b, &execution_id, json!({ "result": "nope" })).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"]["kind"], "forbidden");
}

/// Scenario 7: a value the LLM produced cannot be smuggled out through a
/// recipient-shaped argument of a client tool call (§4.6).
#[tokio::test]
async fn llm_derived_recipient_is_blocked_as_exfiltration() {
    let router = router_for(memory_config()).await;
    let tools = vec![client_tool("mail", "send_email")];
    let token = init(&router, "acme", tools).await;

    let (status, body) = execute(
        &router,
        "acme",
        &token,
        "const to = await atp.llm.call({prompt: 'whose address?'}); \
         return await api.mail.send_email({to, body: 'hi'});",
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "paused");
    let execution_id = body["execution_id"].as_str().unwrap().to_string();

    let (status, body) = resume(
        &router,
        "acme",
        &token,
        &execution_id,
        json!({ "result": "mallory@evil.example" }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "security_violation", "expected a blocked call, got {body:?}");
    assert_eq!(body["error"]["kind"], "security_violation");
}

/// Scenario 8: a client tool call that the agent reports as failed throws
/// a catchable error into user code, which can recover from it (§7).
#[tokio::test]
async fn tool_error_is_recoverable_with_try_catch() {
    let router = router_for(memory_config()).await;
    let tools = vec![client_tool("crm", "lookup_contact")];
    let token = init(&router, "acme", tools).await;

    let (status, body) = execute(
        &router,
        "acme",
        &token,
        "let v; \
         try { v = await api.crm.lookup_contact({id: 1}); } \
         catch (e) { v = 'fallback:' + e.message; } \
         return v;",
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "paused");
    assert_eq!(body["callback"]["operation"], "api.crm.lookup_contact");
    let execution_id = body["execution_id"].as_str().unwrap().to_string();

    let (status, body) = resume(
        &router,
        "acme",
        &token,
        &execution_id,
        json!({ "error": "contact not found" }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "completed");
    assert_eq!(body["result"], "fallback:contact not found");
}
