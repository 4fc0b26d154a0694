use axum::extract::State;
use axum::routing::get;
use axum::Router;
use chrono::Utc;

use super::{created, deleted, ok, paginated, ApiResult, ApiState, AuthUser, JsonBody, PathId, QueryParams};
use crate::auth::Capability;
use crate::content::{MediaPayload, PagePayload, PostPayload};
use crate::pagination::{parse_enum, ContentFields, ContentFilter, ListQuery, PageRequest};
use crate::Result;

pub(super) fn routes() -> Router<ApiState> {
    Router::new()
        .route("/pages", get(list_pages).post(create_page))
        .route("/pages/:id", get(show_page).put(update_page).delete(delete_page))
        .route("/posts", get(list_posts).post(create_post))
        .route("/posts/:id", get(show_post).put(update_post).delete(delete_post))
        .route("/media", get(list_media).post(create_media))
        .route("/media/:id", get(show_media).delete(delete_media))
}

fn content_filter(query: &ListQuery) -> Result<ContentFilter> {
    let fields = ContentFields {
        status: parse_enum(query.status.as_deref(), "status")?,
    };
    ContentFilter::from_query(query, fields)
}

//
// ================= Pages =================
//

async fn list_pages(
    State(state): State<ApiState>,
    caller: AuthUser,
    QueryParams(query): QueryParams<ListQuery>,
) -> ApiResult {
    let filter = content_filter(&query)?;
    paginated(
        state
            .content
            .list_pages(filter, caller.can(Capability::ManageContent))
            .await?,
    )
}

async fn show_page(State(state): State<ApiState>, caller: AuthUser, PathId(id): PathId) -> ApiResult {
    ok(state
        .content
        .get_page(id, caller.can(Capability::ManageContent))
        .await?)
}

async fn create_page(
    State(state): State<ApiState>,
    caller: AuthUser,
    JsonBody(payload): JsonBody<PagePayload>,
) -> ApiResult {
    caller.require(Capability::ManageContent)?;
    created(state.content.create_page(caller.id(), payload, Utc::now()).await?)
}

async fn update_page(
    State(state): State<ApiState>,
    caller: AuthUser,
    PathId(id): PathId,
    JsonBody(payload): JsonBody<PagePayload>,
) -> ApiResult {
    caller.require(Capability::ManageContent)?;
    ok(state.content.update_page(id, payload, Utc::now()).await?)
}

async fn delete_page(State(state): State<ApiState>, caller: AuthUser, PathId(id): PathId) -> ApiResult {
    caller.require(Capability::ManageContent)?;
    state.content.delete_page(id).await?;
    deleted()
}

//
// ================= Posts =================
//

async fn list_posts(
    State(state): State<ApiState>,
    caller: AuthUser,
    QueryParams(query): QueryParams<ListQuery>,
) -> ApiResult {
    let filter = content_filter(&query)?;
    paginated(
        state
            .content
            .list_posts(filter, caller.can(Capability::ManageContent))
            .await?,
    )
}

async fn show_post(State(state): State<ApiState>, caller: AuthUser, PathId(id): PathId) -> ApiResult {
    ok(state
        .content
        .get_post(id, caller.can(Capability::ManageContent))
        .await?)
}

async fn create_post(
    State(state): State<ApiState>,
    caller: AuthUser,
    JsonBody(payload): JsonBody<PostPayload>,
) -> ApiResult {
    caller.require(Capability::ManageContent)?;
    created(state.content.create_post(caller.id(), payload, Utc::now()).await?)
}

async fn update_post(
    State(state): State<ApiState>,
    caller: AuthUser,
    PathId(id): PathId,
    JsonBody(payload): JsonBody<PostPayload>,
) -> ApiResult {
    caller.require(Capability::ManageContent)?;
    ok(state.content.update_post(id, payload, Utc::now()).await?)
}

async fn delete_post(State(state): State<ApiState>, caller: AuthUser, PathId(id): PathId) -> ApiResult {
    caller.require(Capability::ManageContent)?;
    state.content.delete_post(id).await?;
    deleted()
}

//
// ================= Media =================
//

async fn list_media(
    State(state): State<ApiState>,
    caller: AuthUser,
    QueryParams(query): QueryParams<ListQuery>,
) -> ApiResult {
    caller.require(Capability::ManageMedia)?;
    paginated(state.content.list_media(PageRequest::from_query(&query)?).await?)
}

async fn show_media(State(state): State<ApiState>, caller: AuthUser, PathId(id): PathId) -> ApiResult {
    caller.require(Capability::ManageMedia)?;
    ok(state.content.get_media(id).await?)
}

async fn create_media(
    State(state): State<ApiState>,
    caller: AuthUser,
    JsonBody(payload): JsonBody<MediaPayload>,
) -> ApiResult {
    caller.require(Capability::ManageMedia)?;
    created(state.content.create_media(caller.id(), payload, Utc::now()).await?)
}

async fn delete_media(State(state): State<ApiState>, caller: AuthUser, PathId(id): PathId) -> ApiResult {
    caller.require(Capability::ManageMedia)?;
    state.content.delete_media(id).await?;
    deleted()
}
