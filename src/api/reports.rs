use axum::extract::State;
use axum::routing::get;
use axum::Router;
use chrono::Utc;

use super::{ok, ApiResult, ApiState, AuthUser, QueryParams};
use crate::reports::{MonthlyQuery, SummaryQuery};

pub(super) fn routes() -> Router<ApiState> {
    Router::new()
        .route("/reports/summary", get(summary))
        .route("/reports/monthly", get(monthly))
}

async fn summary(
    State(state): State<ApiState>,
    caller: AuthUser,
    QueryParams(query): QueryParams<SummaryQuery>,
) -> ApiResult {
    ok(state
        .reports
        .summary(caller.id(), query, Utc::now().date_naive())
        .await?)
}

async fn monthly(
    State(state): State<ApiState>,
    caller: AuthUser,
    QueryParams(query): QueryParams<MonthlyQuery>,
) -> ApiResult {
    ok(state
        .reports
        .monthly(caller.id(), query, Utc::now().date_naive())
        .await?)
}
