use axum::extract::State;
use axum::routing::{get, post};
use axum::Router;
use chrono::Utc;
use tracing::warn;

use super::{created, deleted, ok, paginated, ApiResult, ApiState, AuthUser, JsonBody, PathId, QueryParams};
use crate::error::TrackerError;
use crate::ledger::{
    AccountPayload, BudgetPayload, CategoryPayload, ContributionPayload, GoalPayload, TransactionPayload,
};
use crate::pagination::{
    parse_enum, AccountFields, AccountFilter, BudgetFields, BudgetFilter, CategoryFields, CategoryFilter,
    GoalFields, GoalFilter, ListQuery, TransactionFields, TransactionFilter,
};
use crate::Result;

pub(super) fn routes() -> Router<ApiState> {
    Router::new()
        .route("/accounts", get(list_accounts).post(create_account))
        .route(
            "/accounts/:id",
            get(show_account).put(update_account).delete(delete_account),
        )
        .route("/categories", get(list_categories).post(create_category))
        .route(
            "/categories/:id",
            get(show_category).put(update_category).delete(delete_category),
        )
        .route("/transactions", get(list_transactions).post(create_transaction))
        .route(
            "/transactions/:id",
            get(show_transaction)
                .put(update_transaction)
                .delete(delete_transaction),
        )
        .route("/budgets", get(list_budgets).post(create_budget))
        .route(
            "/budgets/:id",
            get(show_budget).put(update_budget).delete(delete_budget),
        )
        .route("/goals", get(list_goals).post(create_goal))
        .route("/goals/:id", get(show_goal).put(update_goal).delete(delete_goal))
        .route("/goals/:id/contribute", post(contribute))
}

//
// ================= Filters =================
//

fn transaction_filter(query: &ListQuery) -> Result<TransactionFilter> {
    if let (Some(from), Some(to)) = (query.from, query.to) {
        if from > to {
            return Err(TrackerError::invalid(
                "from",
                "The from date must be before or equal to the to date.",
            ));
        }
    }

    let fields = TransactionFields {
        kind: parse_enum(query.kind.as_deref(), "type")?,
        category_id: query.category_id,
        account_id: query.account_id,
        from: query.from,
        to: query.to,
    };
    TransactionFilter::from_query(query, fields)
}

//
// ================= Accounts =================
//

async fn list_accounts(
    State(state): State<ApiState>,
    caller: AuthUser,
    QueryParams(query): QueryParams<ListQuery>,
) -> ApiResult {
    let fields = AccountFields {
        kind: parse_enum(query.kind.as_deref(), "kind")?,
    };
    let filter = AccountFilter::from_query(&query, fields)?;
    paginated(state.ledger.list_accounts(caller.id(), &filter).await?)
}

async fn create_account(
    State(state): State<ApiState>,
    caller: AuthUser,
    JsonBody(payload): JsonBody<AccountPayload>,
) -> ApiResult {
    created(state.ledger.create_account(caller.id(), payload, Utc::now()).await?)
}

async fn show_account(State(state): State<ApiState>, caller: AuthUser, PathId(id): PathId) -> ApiResult {
    ok(state.ledger.get_account(caller.id(), id).await?)
}

async fn update_account(
    State(state): State<ApiState>,
    caller: AuthUser,
    PathId(id): PathId,
    JsonBody(payload): JsonBody<AccountPayload>,
) -> ApiResult {
    ok(state.ledger.update_account(caller.id(), id, payload, Utc::now()).await?)
}

async fn delete_account(State(state): State<ApiState>, caller: AuthUser, PathId(id): PathId) -> ApiResult {
    state.ledger.delete_account(caller.id(), id).await?;
    deleted()
}

//
// ================= Categories =================
//

async fn list_categories(
    State(state): State<ApiState>,
    caller: AuthUser,
    QueryParams(query): QueryParams<ListQuery>,
) -> ApiResult {
    let fields = CategoryFields {
        kind: parse_enum(query.kind.as_deref(), "type")?,
    };
    let filter = CategoryFilter::from_query(&query, fields)?;
    paginated(state.ledger.list_categories(caller.id(), &filter).await?)
}

async fn create_category(
    State(state): State<ApiState>,
    caller: AuthUser,
    JsonBody(payload): JsonBody<CategoryPayload>,
) -> ApiResult {
    created(state.ledger.create_category(caller.id(), payload, Utc::now()).await?)
}

async fn show_category(State(state): State<ApiState>, caller: AuthUser, PathId(id): PathId) -> ApiResult {
    ok(state.ledger.get_category(caller.id(), id).await?)
}

async fn update_category(
    State(state): State<ApiState>,
    caller: AuthUser,
    PathId(id): PathId,
    JsonBody(payload): JsonBody<CategoryPayload>,
) -> ApiResult {
    ok(state.ledger.update_category(caller.id(), id, payload, Utc::now()).await?)
}

async fn delete_category(State(state): State<ApiState>, caller: AuthUser, PathId(id): PathId) -> ApiResult {
    state.ledger.delete_category(caller.id(), id).await?;
    deleted()
}

//
// ================= Transactions =================
//

async fn list_transactions(
    State(state): State<ApiState>,
    caller: AuthUser,
    QueryParams(query): QueryParams<ListQuery>,
) -> ApiResult {
    let filter = transaction_filter(&query)?;
    paginated(state.ledger.list_transactions(caller.id(), &filter).await?)
}

async fn create_transaction(
    State(state): State<ApiState>,
    caller: AuthUser,
    JsonBody(payload): JsonBody<TransactionPayload>,
) -> ApiResult {
    let now = Utc::now();
    let tx = state.ledger.create_transaction(caller.id(), payload, now).await?;

    // recording a transaction counts as daily activity
    if let Err(e) = state
        .gamification
        .log_activity(caller.id(), now.date_naive(), now)
        .await
    {
        warn!(user_id = %caller.id(), error = %e, "Failed to log activity for transaction");
    }

    created(tx)
}

async fn show_transaction(State(state): State<ApiState>, caller: AuthUser, PathId(id): PathId) -> ApiResult {
    ok(state.ledger.get_transaction(caller.id(), id).await?)
}

async fn update_transaction(
    State(state): State<ApiState>,
    caller: AuthUser,
    PathId(id): PathId,
    JsonBody(payload): JsonBody<TransactionPayload>,
) -> ApiResult {
    ok(state
        .ledger
        .update_transaction(caller.id(), id, payload, Utc::now())
        .await?)
}

async fn delete_transaction(State(state): State<ApiState>, caller: AuthUser, PathId(id): PathId) -> ApiResult {
    state.ledger.delete_transaction(caller.id(), id).await?;
    deleted()
}

//
// ================= Budgets =================
//

async fn list_budgets(
    State(state): State<ApiState>,
    caller: AuthUser,
    QueryParams(query): QueryParams<ListQuery>,
) -> ApiResult {
    let fields = BudgetFields {
        period: parse_enum(query.period.as_deref(), "period")?,
    };
    let filter = BudgetFilter::from_query(&query, fields)?;
    paginated(
        state
            .ledger
            .list_budgets(caller.id(), &filter, Utc::now().date_naive())
            .await?,
    )
}

async fn create_budget(
    State(state): State<ApiState>,
    caller: AuthUser,
    JsonBody(payload): JsonBody<BudgetPayload>,
) -> ApiResult {
    created(state.ledger.create_budget(caller.id(), payload, Utc::now()).await?)
}

async fn show_budget(State(state): State<ApiState>, caller: AuthUser, PathId(id): PathId) -> ApiResult {
    ok(state
        .ledger
        .get_budget(caller.id(), id, Utc::now().date_naive())
        .await?)
}

async fn update_budget(
    State(state): State<ApiState>,
    caller: AuthUser,
    PathId(id): PathId,
    JsonBody(payload): JsonBody<BudgetPayload>,
) -> ApiResult {
    ok(state.ledger.update_budget(caller.id(), id, payload, Utc::now()).await?)
}

async fn delete_budget(State(state): State<ApiState>, caller: AuthUser, PathId(id): PathId) -> ApiResult {
    state.ledger.delete_budget(caller.id(), id).await?;
    deleted()
}

//
// ================= Goals =================
//

async fn list_goals(
    State(state): State<ApiState>,
    caller: AuthUser,
    QueryParams(query): QueryParams<ListQuery>,
) -> ApiResult {
    let fields = GoalFields {
        status: parse_enum(query.status.as_deref(), "status")?,
    };
    let filter = GoalFilter::from_query(&query, fields)?;
    paginated(state.ledger.list_goals(caller.id(), &filter).await?)
}

async fn create_goal(
    State(state): State<ApiState>,
    caller: AuthUser,
    JsonBody(payload): JsonBody<GoalPayload>,
) -> ApiResult {
    created(state.ledger.create_goal(caller.id(), payload, Utc::now()).await?)
}

async fn show_goal(State(state): State<ApiState>, caller: AuthUser, PathId(id): PathId) -> ApiResult {
    ok(state.ledger.get_goal(caller.id(), id).await?)
}

async fn update_goal(
    State(state): State<ApiState>,
    caller: AuthUser,
    PathId(id): PathId,
    JsonBody(payload): JsonBody<GoalPayload>,
) -> ApiResult {
    ok(state.ledger.update_goal(caller.id(), id, payload, Utc::now()).await?)
}

async fn delete_goal(State(state): State<ApiState>, caller: AuthUser, PathId(id): PathId) -> ApiResult {
    state.ledger.delete_goal(caller.id(), id).await?;
    deleted()
}

async fn contribute(
    State(state): State<ApiState>,
    caller: AuthUser,
    PathId(id): PathId,
    JsonBody(payload): JsonBody<ContributionPayload>,
) -> ApiResult {
    ok(state.ledger.contribute(caller.id(), id, payload, Utc::now()).await?)
}
