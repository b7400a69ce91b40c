//! HTTP surface driven in-process through `tower::ServiceExt::oneshot`.

use axum::body::{to_bytes, Body};
use axum::http::header::CONTENT_TYPE;
use axum::http::{Request, StatusCode};
use axum::response::Response;
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;

use suite_gateway::server;

use crate::support::*;

async fn json_body(response: Response) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.expect("read body");
    serde_json::from_slice(&bytes).expect("json body")
}

fn post(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .expect("build request")
}

#[tokio::test]
async fn chat_returns_success_envelope() {
    let h = harness(vec![Arc::new(ScriptedProvider::new("gemini", 1).then_text("Hashrate looks steady."))]);
    let app = server::app(h.state.clone());

    let response = app
        .oneshot(post(
            "/chat",
            json!({
                "messages": [{"role": "user", "content": "how is mining?"}],
                "miningStats": {"hashrate": 1500},
                "councilMode": false
            }),
        ))
        .await
        .expect("router call");
    assert_eq!(response.status(), StatusCode::OK);

    let body = json_body(response).await;
    assert_eq!(body["success"], true);
    assert_eq!(body["response"], "Hashrate looks steady.");
    assert_eq!(body["hasToolCalls"], false);
    assert_eq!(body["toolCallsExecuted"], 0);
    assert_eq!(body["provider"], "gemini");
    assert_eq!(body["executive"], "cso");
    assert_eq!(body["confidence"], 95);
}

#[tokio::test]
async fn named_executive_is_used() {
    let provider = Arc::new(ScriptedProvider::new("gemini", 1).then_text("CTO here."));
    let h = harness(vec![provider.clone()]);
    let app = server::app(h.state.clone());

    let response = app
        .oneshot(post(
            "/executives/cao/chat",
            json!({"messages": [{"role": "user", "content": "trends?"}]}),
        ))
        .await
        .expect("router call");
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json_body(response).await["executive"], "cao");

    let system = &provider.calls()[0].messages[0].content;
    assert!(system.contains("Chief Analytics Officer"));
}

#[tokio::test]
async fn unknown_executive_is_404() {
    let h = harness(vec![Arc::new(ScriptedProvider::new("gemini", 1))]);
    let response = server::app(h.state.clone())
        .oneshot(post(
            "/executives/cfo/chat",
            json!({"messages": [{"role": "user", "content": "hi"}]}),
        ))
        .await
        .expect("router call");
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let body = json_body(response).await;
    assert_eq!(body["success"], false);
    assert_eq!(body["error"]["code"], 404);
}

#[tokio::test]
async fn quota_exhaustion_with_emergency_is_still_200() {
    let h = harness(vec![Arc::new(ScriptedProvider::new("gemini", 1).always(Err(quota())))]);
    let response = server::app(h.state.clone())
        .oneshot(post(
            "/chat",
            json!({"messages": [{"role": "user", "content": "show mining stats"}]}),
        ))
        .await
        .expect("router call");
    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["provider"], "emergency-fallback");
    assert!(body["response"].as_str().unwrap().contains("1500"));
}

#[tokio::test]
async fn quota_exhaustion_without_emergency_is_402() {
    let mut config = test_config();
    config.pipeline.emergency_fallback = false;
    let h = harness_with(
        config,
        vec![Arc::new(ScriptedProvider::new("gemini", 1).always(Err(quota())))],
        StaticKeys::all(),
    );
    let response = server::app(h.state.clone())
        .oneshot(post(
            "/chat",
            json!({"messages": [{"role": "user", "content": "hi"}]}),
        ))
        .await
        .expect("router call");
    assert_eq!(response.status(), StatusCode::PAYMENT_REQUIRED);
    let body = json_body(response).await;
    assert_eq!(body["error"]["type"], "token_exhausted");
    assert_eq!(body["error"]["canRetry"], false);
}

#[tokio::test]
async fn missing_credentials_is_401() {
    let h = harness_with(
        test_config(),
        vec![Arc::new(ScriptedProvider::new("gemini", 1))],
        StaticKeys::none(),
    );
    let response = server::app(h.state.clone())
        .oneshot(post(
            "/chat",
            json!({"messages": [{"role": "user", "content": "hi"}]}),
        ))
        .await
        .expect("router call");
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn malformed_body_is_400() {
    let h = harness(vec![Arc::new(ScriptedProvider::new("gemini", 1))]);
    let request = Request::builder()
        .method("POST")
        .uri("/chat")
        .header(CONTENT_TYPE, "application/json")
        .body(Body::from("{not json"))
        .expect("build request");
    let response = server::app(h.state.clone()).oneshot(request).await.expect("router call");
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = server::app(h.state.clone())
        .oneshot(post("/chat", json!({"messages": []})))
        .await
        .expect("router call");
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(json_body(response).await["success"], false);
}

#[tokio::test]
async fn health_reports_providers_in_priority_order() {
    let h = harness(vec![
        Arc::new(ScriptedProvider::new("kimi", 4)),
        Arc::new(ScriptedProvider::new("gemini", 1).always(Err(quota()))),
        Arc::new(ScriptedProvider::new("deepseek", 2).then_text("ok")),
    ]);
    // Exhaust gemini so it shows as unavailable.
    h.state
        .pipeline
        .orchestrator()
        .execute(
            &ctx(),
            &[suite_gateway_llm::CanonicalMessage::user("hi")],
            &Default::default(),
        )
        .await
        .unwrap();

    let request = Request::builder()
        .uri("/health")
        .body(Body::empty())
        .expect("build request");
    let response = server::app(h.state.clone()).oneshot(request).await.expect("router call");
    assert_eq!(response.status(), StatusCode::OK);

    let body = json_body(response).await;
    assert_eq!(body["status"], "ok");
    let providers = body["providers"].as_array().unwrap();
    let names: Vec<&str> = providers.iter().map(|p| p["name"].as_str().unwrap()).collect();
    assert_eq!(names, vec!["gemini", "deepseek", "kimi"]);
    assert_eq!(providers[0]["available"], false);
    assert_eq!(providers[0]["failureCount"], 1);
    assert_eq!(providers[0]["admitted"], false);
    assert_eq!(providers[1]["admitted"], true);
    assert_eq!(body["tools"], 5);
}
