use axum::extract::State;
use axum::routing::{get, post, put};
use axum::Router;
use chrono::Utc;

use super::{created, ok, paginated, ApiResult, ApiState, AuthUser, JsonBody, PathId, QueryParams};
use crate::auth::{self, Capability, LoginPayload, RegisterPayload, RolePayload};
use crate::pagination::{ListQuery, PageRequest};

pub(super) fn routes() -> Router<ApiState> {
    Router::new()
        .route("/auth/register", post(register))
        .route("/auth/login", post(login))
        .route("/auth/logout", post(logout))
        .route("/auth/me", get(me))
        .route("/roles", get(list_roles))
        .route("/users", get(list_users))
        .route("/users/:id/role", put(assign_role))
}

async fn register(State(state): State<ApiState>, JsonBody(payload): JsonBody<RegisterPayload>) -> ApiResult {
    created(state.auth.register(payload, Utc::now()).await?)
}

async fn login(State(state): State<ApiState>, JsonBody(payload): JsonBody<LoginPayload>) -> ApiResult {
    ok(state.auth.login(payload, Utc::now()).await?)
}

async fn logout(State(state): State<ApiState>, caller: AuthUser) -> ApiResult {
    state.auth.logout(&caller.token).await?;
    ok(serde_json::json!({ "logged_out": true }))
}

async fn me(caller: AuthUser) -> ApiResult {
    ok(serde_json::json!({
        "user": caller.user,
        "capabilities": caller.user.role.capabilities(),
    }))
}

async fn list_roles(_caller: AuthUser) -> ApiResult {
    ok(auth::roles())
}

async fn list_users(
    State(state): State<ApiState>,
    caller: AuthUser,
    QueryParams(query): QueryParams<ListQuery>,
) -> ApiResult {
    caller.require(Capability::ViewAllUsers)?;
    paginated(state.auth.list_users(PageRequest::from_query(&query)?).await?)
}

async fn assign_role(
    State(state): State<ApiState>,
    caller: AuthUser,
    PathId(id): PathId,
    JsonBody(payload): JsonBody<RolePayload>,
) -> ApiResult {
    caller.require(Capability::ManageRoles)?;
    ok(state.auth.assign_role(&caller.user, id, payload).await?)
}
