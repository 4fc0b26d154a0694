mod common;

use axum::http::StatusCode;
use common::{app_with_gateway, gateway, get, post, record, register};
use httpmock::prelude::*;
use serde_json::json;
use std::time::{Duration, Instant};

const PLANNING_QUESTION: &str = "I want to build a proper monthly budget plan so I can stop living paycheck to paycheck. \
Where should my salary go each month and how much should I set aside?";

fn completion(content: &str) -> serde_json::Value {
    json!({
        "choices": [{ "message": { "role": "assistant", "content": content } }],
        "usage": { "total_tokens": 87 }
    })
}

#[tokio::test]
async fn model_errors_fall_back_to_a_200_answer() {
    let server = MockServer::start_async().await;
    let mock = server
        .mock_async(|when, then| {
            when.method(POST).path("/chat/completions");
            then.status(500).body("upstream exploded");
        })
        .await;

    let app = app_with_gateway(gateway(&server.base_url(), "test-key"));
    let token = register(&app, "ana@example.com").await;

    let (status, json) = post(&app, "/api/advice", &token, json!({ "question": "Should I save more?" })).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["data"]["context_used"], false);
    assert!(!json["data"]["answer"].as_str().unwrap().trim().is_empty());

    // one try plus one retry
    assert_eq!(mock.hits_async().await, 2);
}

#[tokio::test]
async fn slow_model_times_out_into_fallback() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(POST).path("/chat/completions");
            then.status(200)
                .delay(Duration::from_secs(3))
                .json_body(completion("too late"));
        })
        .await;

    let app = app_with_gateway(gateway(&server.base_url(), "test-key"));
    let token = register(&app, "ana@example.com").await;

    let started = Instant::now();
    let (status, json) = post(
        &app,
        "/api/advice",
        &token,
        json!({ "question": "Is investing worth it?" }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["data"]["context_used"], false);
    assert_ne!(json["data"]["answer"], "too late");
    assert!(started.elapsed() < Duration::from_secs(3));
}

#[tokio::test]
async fn planning_question_runs_the_workflow_end_to_end() {
    let server = MockServer::start_async().await;
    let mock = server
        .mock_async(|when, then| {
            when.method(POST)
                .path("/chat/completions")
                .header("authorization", "Bearer test-key")
                .body_contains("Total income: 3500")
                .body_contains("Total expenses: 2000");
            then.status(200).json_body(completion(
                "Split your salary 50/30/20 and move the 20% to savings on payday.",
            ));
        })
        .await;

    let app = app_with_gateway(gateway(&server.base_url(), "test-key"));
    let token = register(&app, "ana@example.com").await;

    record(&app, &token, "income", 3500, "Salary").await;
    record(&app, &token, "expense", 1200, "Rent").await;
    record(&app, &token, "expense", 800, "Groceries").await;

    let (status, json) = post(&app, "/api/advice", &token, json!({ "question": PLANNING_QUESTION })).await;
    assert_eq!(status, StatusCode::OK);

    let data = &json["data"];
    assert_eq!(data["context_used"], true);
    assert_eq!(data["question_type"], "budgeting");
    assert!(data["reasoning_steps"].as_array().unwrap().len() >= 4);
    assert!(data["answer"].as_str().unwrap().contains("50/30/20"));
    assert_eq!(mock.hits_async().await, 1);

    let (_, history) = get(&app, "/api/conversations", &token).await;
    let conversations = history["data"].as_array().unwrap();
    assert_eq!(conversations.len(), 1);
    assert_eq!(conversations[0]["type"], "advice");
    assert_eq!(conversations[0]["metadata"]["context"]["total_income"], 3500.0);
    assert_eq!(conversations[0]["metadata"]["context"]["net_balance"], 1500.0);
}

#[tokio::test]
async fn expense_classification_uses_keywords_then_model() {
    let server = MockServer::start_async().await;
    let mock = server
        .mock_async(|when, then| {
            when.method(POST).path("/chat/completions");
            then.status(200).json_body(completion("Entertainment"));
        })
        .await;

    let app = app_with_gateway(gateway(&server.base_url(), "test-key"));
    let token = register(&app, "ana@example.com").await;

    let (_, keyword) = post(
        &app,
        "/api/classify-expense",
        &token,
        json!({ "description": "Uber ride to the airport" }),
    )
    .await;
    assert_eq!(keyword["data"]["method"], "keyword");
    assert_eq!(mock.hits_async().await, 0);

    let (_, ai) = post(
        &app,
        "/api/classify-expense",
        &token,
        json!({ "description": "Zorblax annual pass" }),
    )
    .await;
    assert_eq!(ai["data"]["method"], "ai");
    assert_eq!(ai["data"]["category"], "Entertainment");
    assert_eq!(mock.hits_async().await, 1);
}
