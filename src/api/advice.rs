use axum::extract::State;
use axum::routing::{get, post};
use axum::Router;
use chrono::Utc;
use serde::Deserialize;

use super::{ok, ApiResult, ApiState, AuthUser, JsonBody, QueryParams};
use crate::advice::{ExpenseItem, MAX_QUESTION_CHARS};
use crate::error::Validator;
use rust_decimal::Decimal;

const MAX_EXPENSE_ITEMS: usize = 100;

#[derive(Debug, Deserialize)]
struct AdviceRequest {
    #[serde(default)]
    question: String,
}

#[derive(Debug, Deserialize)]
struct InsightsRequest {
    #[serde(default)]
    expenses: Vec<ExpenseItem>,
}

#[derive(Debug, Deserialize)]
struct ClassifyRequest {
    #[serde(default)]
    description: String,
}

#[derive(Debug, Deserialize)]
struct HistoryQuery {
    limit: Option<u32>,
}

pub(super) fn routes() -> Router<ApiState> {
    Router::new()
        .route("/advice", post(ask))
        .route("/spending-insights", post(spending_insights))
        .route("/classify-expense", post(classify_expense))
        .route("/conversations", get(history))
}

async fn ask(
    State(state): State<ApiState>,
    caller: AuthUser,
    JsonBody(request): JsonBody<AdviceRequest>,
) -> ApiResult {
    Validator::new()
        .require_text(&request.question, "question", MAX_QUESTION_CHARS)
        .finish()?;

    ok(state
        .advice
        .ask(caller.id(), request.question.trim(), Utc::now())
        .await)
}

async fn spending_insights(
    State(state): State<ApiState>,
    caller: AuthUser,
    JsonBody(request): JsonBody<InsightsRequest>,
) -> ApiResult {
    let mut v = Validator::new();
    v.check(!request.expenses.is_empty(), "expenses", "The expenses field is required.");
    v.check(
        request.expenses.len() <= MAX_EXPENSE_ITEMS,
        "expenses",
        &format!("The expenses may not have more than {} items.", MAX_EXPENSE_ITEMS),
    );
    for (index, item) in request.expenses.iter().enumerate() {
        v.require_text(&item.description, &format!("expenses.{}.description", index), 255);
        v.check(
            item.amount > Decimal::ZERO,
            &format!("expenses.{}.amount", index),
            "The amount must be greater than 0.",
        );
    }
    v.finish()?;

    ok(state
        .advice
        .spending_insights(caller.id(), &request.expenses, Utc::now())
        .await)
}

async fn classify_expense(
    State(state): State<ApiState>,
    caller: AuthUser,
    JsonBody(request): JsonBody<ClassifyRequest>,
) -> ApiResult {
    Validator::new()
        .require_text(&request.description, "description", 255)
        .finish()?;

    ok(state
        .advice
        .classify_expense(caller.id(), request.description.trim())
        .await)
}

async fn history(
    State(state): State<ApiState>,
    caller: AuthUser,
    QueryParams(query): QueryParams<HistoryQuery>,
) -> ApiResult {
    ok(state.advice.history(caller.id(), query.limit).await?)
}
