#![allow(dead_code)]

use axum::body::{to_bytes, Body};
use axum::http::{header, Method, Request, StatusCode};
use axum::Router;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use takatrack::api::{create_router, ApiState};
use takatrack::config::LlmConfig;
use takatrack::llm::ModelGateway;
use takatrack::random::FixedRandom;
use takatrack::store::InMemoryStore;
use tokio_test::assert_ok;
use tower::ServiceExt;

pub const ADMIN_EMAIL: &str = "root@takatrack.test";

/// Gateway pointed at `base_url` with short timeouts
pub fn gateway(base_url: &str, api_key: &str) -> Arc<ModelGateway> {
    let config = LlmConfig {
        api_key: api_key.to_string(),
        base_url: base_url.to_string(),
        timeout: Duration::from_millis(400),
        max_retries: 1,
        retry_backoff: Duration::from_millis(10),
        ..LlmConfig::default()
    };
    Arc::new(assert_ok!(ModelGateway::from_config(&config)))
}

/// Router on a fresh in-memory store; no API key so every model call falls back
pub fn offline_app() -> Router {
    app_with_gateway(gateway("http://127.0.0.1:9", ""))
}

pub fn app_with_gateway(gateway: Arc<ModelGateway>) -> Router {
    let state = ApiState::new(
        Arc::new(InMemoryStore::new()),
        gateway,
        Arc::new(FixedRandom(0)),
        Some(ADMIN_EMAIL.to_string()),
    );
    create_router(state)
}

pub async fn send(app: &Router, method: Method, uri: &str, token: Option<&str>, body: Option<Value>) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    let request = match body {
        Some(json) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(json.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, json)
}

pub async fn get(app: &Router, uri: &str, token: &str) -> (StatusCode, Value) {
    send(app, Method::GET, uri, Some(token), None).await
}

pub async fn post(app: &Router, uri: &str, token: &str, body: Value) -> (StatusCode, Value) {
    send(app, Method::POST, uri, Some(token), Some(body)).await
}

/// Registers a user and returns its bearer token
pub async fn register(app: &Router, email: &str) -> String {
    let (status, json) = send(
        app,
        Method::POST,
        "/api/auth/register",
        None,
        Some(serde_json::json!({
            "name": "Test User",
            "email": email,
            "password": "long enough password",
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "register failed: {}", json);
    json["data"]["token"].as_str().unwrap().to_string()
}

pub async fn record(app: &Router, token: &str, kind: &str, amount: u32, description: &str) -> Value {
    let (status, json) = post(
        app,
        "/api/transactions",
        token,
        serde_json::json!({
            "type": kind,
            "amount": amount,
            "description": description,
        }),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "transaction failed: {}", json);
    json["data"].clone()
}
