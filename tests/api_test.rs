mod common;

use axum::http::{Method, StatusCode};
use common::{get, offline_app, post, record, register, send, ADMIN_EMAIL};
use serde_json::json;

#[tokio::test]
async fn health_is_public() {
    let app = offline_app();
    let (status, json) = send(&app, Method::GET, "/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "healthy");
}

#[tokio::test]
async fn protected_routes_require_a_token() {
    let app = offline_app();

    let (status, json) = send(&app, Method::GET, "/api/transactions", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(json["success"], false);

    let (status, _) = get(&app, "/api/transactions", "not-a-real-token").await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let token = register(&app, "ana@example.com").await;
    send(&app, Method::POST, "/api/auth/logout", Some(&token), None).await;
    let (status, _) = get(&app, "/api/auth/me", &token).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn validation_errors_are_422_with_fields() {
    let app = offline_app();
    let token = register(&app, "ana@example.com").await;

    let (status, json) = post(
        &app,
        "/api/transactions",
        &token,
        json!({ "type": "gift", "amount": 0, "description": "" }),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(json["errors"]["type"].is_array());
    assert!(json["errors"]["amount"].is_array());
    assert!(json["errors"]["description"].is_array());

    let (status, json) = send(
        &app,
        Method::POST,
        "/api/advice",
        Some(&token),
        Some(json!({ "question": "   " })),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(json["errors"]["question"].is_array());

    let (status, _) = get(&app, "/api/transactions?per_page=500", &token).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn other_users_rows_are_forbidden() {
    let app = offline_app();
    let owner = register(&app, "owner@example.com").await;
    let intruder = register(&app, "intruder@example.com").await;

    let tx = record(&app, &owner, "expense", 40, "Dinner").await;
    let uri = format!("/api/transactions/{}", tx["id"].as_str().unwrap());

    let (status, _) = get(&app, &uri, &intruder).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = send(&app, Method::DELETE, &uri, Some(&intruder), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, json) = get(&app, &uri, &owner).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["data"]["description"], "Dinner");

    let (status, _) = get(&app, "/api/transactions/not-a-uuid", &owner).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn transaction_list_is_paginated_and_filtered() {
    let app = offline_app();
    let token = register(&app, "ana@example.com").await;

    record(&app, &token, "income", 3500, "Salary").await;
    for i in 0..4 {
        record(&app, &token, "expense", 10 + i, &format!("Coffee {}", i)).await;
    }

    let (status, json) = get(&app, "/api/transactions?per_page=2&page=2&type=expense", &token).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["data"].as_array().unwrap().len(), 2);
    assert_eq!(json["meta"]["total"], 4);
    assert_eq!(json["meta"]["last_page"], 2);

    let (_, json) = get(&app, "/api/transactions?search=salary", &token).await;
    assert_eq!(json["meta"]["total"], 1);

    let (status, _) = get(&app, "/api/transactions?sort=password_hash", &token).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn recording_a_transaction_starts_a_streak() {
    let app = offline_app();
    let token = register(&app, "ana@example.com").await;

    record(&app, &token, "expense", 12, "Lunch").await;

    let (status, json) = get(&app, "/api/gamification/profile", &token).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["data"]["progress"]["current_streak"], 1);

    // same day check-in does not extend it
    let (_, json) = send(&app, Method::POST, "/api/gamification/check-in", Some(&token), None).await;
    assert_eq!(json["data"]["current_streak"], 1);
    assert_eq!(json["data"]["already_logged_today"], true);
}

#[tokio::test]
async fn second_spin_on_the_same_day_is_refused() {
    let app = offline_app();
    let token = register(&app, "ana@example.com").await;

    let (status, json) = get(&app, "/api/gamification/spin", &token).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["data"]["can_spin"], true);

    let (_, first) = send(&app, Method::POST, "/api/gamification/spin", Some(&token), None).await;
    assert_eq!(first["data"]["spun"], true);
    assert_eq!(first["data"]["can_spin"], false);

    let (status, second) = send(&app, Method::POST, "/api/gamification/spin", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(second["data"]["spun"], false);
    assert_eq!(second["data"]["can_spin"], false);

    let (_, rewards) = get(&app, "/api/gamification/rewards", &token).await;
    assert_eq!(rewards["data"].as_array().unwrap().len(), 1);

    let reward_id = first["data"]["reward"]["id"].as_str().unwrap();
    let claim_uri = format!("/api/gamification/rewards/{}/claim", reward_id);
    let (status, claimed) = send(&app, Method::POST, &claim_uri, Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(claimed["data"]["coins"], 10);

    let (status, _) = send(&app, Method::POST, &claim_uri, Some(&token), None).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn greetings_are_answered_without_persisting() {
    let app = offline_app();
    let token = register(&app, "ana@example.com").await;

    let (status, json) = post(&app, "/api/advice", &token, json!({ "question": "  Hello " })).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["data"]["context_used"], false);
    assert!(json["data"]["answer"].as_str().unwrap().len() > 10);
    assert!(json["data"].get("question_type").is_none());

    let (_, history) = get(&app, "/api/conversations", &token).await;
    assert!(history["data"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn budgets_report_progress() {
    let app = offline_app();
    let token = register(&app, "ana@example.com").await;

    let (_, category) = post(
        &app,
        "/api/categories",
        &token,
        json!({ "name": "Groceries", "type": "expense", "color": "#22AA66" }),
    )
    .await;
    let category_id = category["data"]["id"].as_str().unwrap().to_string();

    post(
        &app,
        "/api/transactions",
        &token,
        json!({ "type": "expense", "amount": 300, "description": "Weekly shop", "category_id": category_id }),
    )
    .await;

    let (status, budget) = post(
        &app,
        "/api/budgets",
        &token,
        json!({
            "category_id": category_id,
            "name": "Food",
            "amount": 200,
            "period": "monthly",
            "start_date": "2000-01-01",
        }),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{}", budget);
    assert_eq!(budget["data"]["progress"]["over_budget"], true);
    assert_eq!(budget["data"]["progress"]["remaining"], 0.0);

    let (_, summary) = get(&app, "/api/reports/summary", &token).await;
    assert_eq!(summary["data"]["expenses"], 300.0);
    assert_eq!(summary["data"]["categories"][0]["name"], "Groceries");
}

#[tokio::test]
async fn cms_writes_need_capabilities() {
    let app = offline_app();
    let admin = register(&app, ADMIN_EMAIL).await;
    let member = register(&app, "member@example.com").await;

    let page = json!({ "title": "About us", "body": "Who we are.", "status": "published" });

    let (status, _) = post(&app, "/api/pages", &member, page.clone()).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, created) = post(&app, "/api/pages", &admin, page).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(created["data"]["slug"], "about-us");

    let (_, listed) = get(&app, "/api/pages", &member).await;
    assert_eq!(listed["meta"]["total"], 1);

    let (status, _) = get(&app, "/api/users", &member).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (_, me) = get(&app, "/api/auth/me", &member).await;
    let member_id = me["data"]["user"]["id"].as_str().unwrap().to_string();
    let (status, promoted) = send(
        &app,
        Method::PUT,
        &format!("/api/users/{}/role", member_id),
        Some(&admin),
        Some(json!({ "role": "admin" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(promoted["data"]["role"], "admin");

    let (status, _) = get(&app, "/api/users", &member).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn oversized_balances_are_422_not_a_crash() {
    let app = offline_app();
    let token = register(&app, "ana@example.com").await;

    let (status, json) = post(
        &app,
        "/api/accounts",
        &token,
        json!({ "name": "Vault", "kind": "investment", "balance": 7.9228e28 }),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(json["errors"]["balance"].is_array());

    let (status, account) = post(
        &app,
        "/api/accounts",
        &token,
        json!({ "name": "Vault", "kind": "investment", "balance": 999999999000.0 }),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let account_id = account["data"]["id"].as_str().unwrap().to_string();

    let income = json!({
        "account_id": account_id,
        "type": "income",
        "amount": 999999999999.99,
        "description": "Windfall",
    });
    let (status, json) = post(&app, "/api/transactions", &token, income).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(json["success"], false);

    let (_, listed) = get(&app, "/api/transactions", &token).await;
    assert_eq!(listed["meta"]["total"], 0);
    let (_, account) = get(&app, &format!("/api/accounts/{}", account_id), &token).await;
    assert_eq!(account["data"]["balance"], 999999999000.0);
}
