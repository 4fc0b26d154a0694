use axum::extract::State;
use axum::routing::{get, post};
use axum::Router;
use chrono::Utc;

use super::{ok, ApiResult, ApiState, AuthUser, PathId};

pub(super) fn routes() -> Router<ApiState> {
    Router::new()
        .route("/gamification/profile", get(profile))
        .route("/gamification/check-in", post(check_in))
        .route("/gamification/spin", get(spin_status).post(spin))
        .route("/gamification/rewards", get(rewards))
        .route("/gamification/rewards/:id/claim", post(claim))
        .route("/gamification/badges", get(badges))
}

async fn profile(State(state): State<ApiState>, caller: AuthUser) -> ApiResult {
    ok(state
        .gamification
        .profile(caller.id(), Utc::now().date_naive())
        .await?)
}

async fn check_in(State(state): State<ApiState>, caller: AuthUser) -> ApiResult {
    let now = Utc::now();
    ok(state
        .gamification
        .log_activity(caller.id(), now.date_naive(), now)
        .await?)
}

async fn spin_status(State(state): State<ApiState>, caller: AuthUser) -> ApiResult {
    ok(state
        .gamification
        .spin_status(caller.id(), Utc::now().date_naive())
        .await?)
}

async fn spin(State(state): State<ApiState>, caller: AuthUser) -> ApiResult {
    let now = Utc::now();
    ok(state.gamification.spin(caller.id(), now.date_naive(), now).await?)
}

async fn rewards(State(state): State<ApiState>, caller: AuthUser) -> ApiResult {
    ok(state.gamification.rewards(caller.id()).await?)
}

async fn claim(State(state): State<ApiState>, caller: AuthUser, PathId(id): PathId) -> ApiResult {
    ok(state.gamification.claim(caller.id(), id, Utc::now()).await?)
}

async fn badges(State(state): State<ApiState>, caller: AuthUser) -> ApiResult {
    ok(state.gamification.badges(caller.id()).await?)
}
