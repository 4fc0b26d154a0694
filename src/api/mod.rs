//! REST API server
//!
//! Every response, success or failure, is the same JSON envelope. Handlers
//! return `ApiResult`; any `TrackerError` is rendered by its `IntoResponse`
//! impl below.

use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{FromRequest, FromRequestParts, Path, Query, Request};
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{async_trait, Json, Router};
use chrono::Utc;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info};
use uuid::Uuid;

use crate::advice::AdviceService;
use crate::auth::{AuthService, Capability};
use crate::content::ContentService;
use crate::error::{FieldErrors, TrackerError};
use crate::gamification::GamificationService;
use crate::ledger::LedgerService;
use crate::llm::ModelGateway;
use crate::models::User;
use crate::pagination::{PageMeta, Paginated};
use crate::random::RandomSource;
use crate::reports::ReportService;
use crate::store::Store;

mod advice;
mod auth;
mod cms;
mod gamification;
mod ledger;
mod reports;

/// =============================
/// Response Wrapper
/// =============================

#[derive(Debug, Serialize, Deserialize)]
pub struct ApiResponse {
    pub success: bool,
    pub data: Option<serde_json::Value>,
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub errors: Option<FieldErrors>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub meta: Option<PageMeta>,
    pub timestamp: String,
}

impl ApiResponse {
    pub fn success<T: Serialize>(data: T) -> Self {
        Self {
            success: true,
            data: serde_json::to_value(data).ok(),
            error: None,
            errors: None,
            meta: None,
            timestamp: Utc::now().to_rfc3339(),
        }
    }

    pub fn page<T: Serialize>(page: Paginated<T>) -> Self {
        Self {
            meta: Some(page.meta),
            ..Self::success(page.data)
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message.into()),
            errors: None,
            meta: None,
            timestamp: Utc::now().to_rfc3339(),
        }
    }

    pub fn invalid(errors: FieldErrors) -> Self {
        Self {
            errors: Some(errors),
            ..Self::error("The given data was invalid.")
        }
    }
}

pub type ApiResult = std::result::Result<(StatusCode, Json<ApiResponse>), TrackerError>;

pub fn ok<T: Serialize>(data: T) -> ApiResult {
    Ok((StatusCode::OK, Json(ApiResponse::success(data))))
}

pub fn created<T: Serialize>(data: T) -> ApiResult {
    Ok((StatusCode::CREATED, Json(ApiResponse::success(data))))
}

pub fn paginated<T: Serialize>(page: Paginated<T>) -> ApiResult {
    Ok((StatusCode::OK, Json(ApiResponse::page(page))))
}

pub fn deleted() -> ApiResult {
    ok(serde_json::json!({ "deleted": true }))
}

impl IntoResponse for TrackerError {
    fn into_response(self) -> Response {
        let (status, body) = match self {
            TrackerError::Validation(errors) => {
                (StatusCode::UNPROCESSABLE_ENTITY, ApiResponse::invalid(errors))
            }
            TrackerError::Unauthenticated(message) => {
                (StatusCode::UNAUTHORIZED, ApiResponse::error(message))
            }
            TrackerError::Forbidden(message) => (StatusCode::FORBIDDEN, ApiResponse::error(message)),
            TrackerError::NotFound(message) => (StatusCode::NOT_FOUND, ApiResponse::error(message)),
            other => {
                error!(error = %other, "Unhandled error while serving request");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ApiResponse::error("Internal server error"),
                )
            }
        };
        (status, Json(body)).into_response()
    }
}

/// =============================
/// Extractors
/// =============================

/// JSON body whose rejections render as 422 envelopes
pub struct JsonBody<T>(pub T);

#[async_trait]
impl<S, T> FromRequest<S> for JsonBody<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = TrackerError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        match Json::<T>::from_request(req, state).await {
            Ok(Json(value)) => Ok(JsonBody(value)),
            Err(rejection) => Err(json_rejection(rejection)),
        }
    }
}

fn json_rejection(rejection: JsonRejection) -> TrackerError {
    TrackerError::invalid("body", rejection.body_text())
}

/// Query string whose rejections render as 422 envelopes
pub struct QueryParams<T>(pub T);

#[async_trait]
impl<S, T> FromRequestParts<S> for QueryParams<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = TrackerError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        match Query::<T>::from_request_parts(parts, state).await {
            Ok(Query(value)) => Ok(QueryParams(value)),
            Err(rejection) => Err(query_rejection(rejection)),
        }
    }
}

fn query_rejection(rejection: QueryRejection) -> TrackerError {
    TrackerError::invalid("query", rejection.body_text())
}

/// Resource id from the path; a malformed id is simply not found
pub struct PathId(pub Uuid);

#[async_trait]
impl<S> FromRequestParts<S> for PathId
where
    S: Send + Sync,
{
    type Rejection = TrackerError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        Path::<Uuid>::from_request_parts(parts, state)
            .await
            .map(|Path(id)| PathId(id))
            .map_err(|_| TrackerError::NotFound("Resource not found".to_string()))
    }
}

/// Caller resolved from the `Authorization: Bearer` header
pub struct AuthUser {
    pub user: User,
    pub token: String,
}

impl AuthUser {
    pub fn id(&self) -> Uuid {
        self.user.id
    }

    pub fn can(&self, capability: Capability) -> bool {
        self.user.role.can(capability)
    }

    pub fn require(&self, capability: Capability) -> Result<(), TrackerError> {
        if self.can(capability) {
            Ok(())
        } else {
            Err(TrackerError::Forbidden(format!(
                "Your role ({}) is not allowed to perform this action",
                self.user.role
            )))
        }
    }
}

fn bearer_token(parts: &Parts) -> Option<&str> {
    let value = parts.headers.get(AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.split_once(' ')?;
    let token = token.trim();
    (scheme.eq_ignore_ascii_case("bearer") && !token.is_empty()).then_some(token)
}

#[async_trait]
impl FromRequestParts<ApiState> for AuthUser {
    type Rejection = TrackerError;

    async fn from_request_parts(parts: &mut Parts, state: &ApiState) -> Result<Self, Self::Rejection> {
        let token = bearer_token(parts)
            .ok_or_else(|| TrackerError::Unauthenticated("Missing bearer token".to_string()))?
            .to_string();
        let user = state.auth.authenticate(&token, Utc::now()).await?;
        Ok(AuthUser { user, token })
    }
}

/// =============================
/// API State
/// =============================

#[derive(Clone)]
pub struct ApiState {
    pub auth: Arc<AuthService>,
    pub ledger: Arc<LedgerService>,
    pub advice: Arc<AdviceService>,
    pub gamification: Arc<GamificationService>,
    pub content: Arc<ContentService>,
    pub reports: Arc<ReportService>,
}

impl ApiState {
    pub fn new(
        store: Arc<dyn Store>,
        gateway: Arc<ModelGateway>,
        random: Arc<dyn RandomSource>,
        super_admin_email: Option<String>,
    ) -> Self {
        Self {
            auth: Arc::new(AuthService::new(store.clone()).with_super_admin_email(super_admin_email)),
            ledger: Arc::new(LedgerService::new(store.clone())),
            advice: Arc::new(AdviceService::new(store.clone(), gateway, random.clone())),
            gamification: Arc::new(GamificationService::new(store.clone(), random)),
            content: Arc::new(ContentService::new(store.clone())),
            reports: Arc::new(ReportService::new(store)),
        }
    }
}

/// =============================
/// Health Endpoint
/// =============================

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "healthy",
        "timestamp": Utc::now().to_rfc3339()
    }))
}

async fn fallback() -> TrackerError {
    TrackerError::NotFound("Route not found".to_string())
}

/// =============================
/// Router
/// =============================

pub fn create_router(state: ApiState) -> Router {
    let api = Router::new()
        .merge(auth::routes())
        .merge(ledger::routes())
        .merge(advice::routes())
        .merge(gamification::routes())
        .merge(reports::routes())
        .merge(cms::routes());

    Router::new()
        .route("/health", get(health))
        .nest("/api", api)
        .fallback(fallback)
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

/// =============================
/// Server Startup
/// =============================

pub async fn start_server(state: ApiState, port: u16) -> crate::Result<()> {
    let router = create_router(state);

    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", port)).await?;

    info!(port = port, "API server listening on http://0.0.0.0:{}", port);

    axum::serve(listener, router).await?;

    Ok(())
}
