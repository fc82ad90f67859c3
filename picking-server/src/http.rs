//! HTTP surface: `/api/health` and `/api/backup`.

use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::header::{AUTHORIZATION, CONTENT_TYPE};
use axum::http::{HeaderValue, Method, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{middleware, Json, Router};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tower_http::cors::{self, AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;

use picking_core::Snapshot;
use picking_store::{BackupError, BackupService, CommitResult, FetchMeta, HealthReport};

use crate::auth::{require_bearer, AuthFailure};
use crate::config::{AllowedOrigins, AuthMode};
use crate::writer::WriterHandle;

#[derive(Clone)]
pub struct AppState {
    pub service: Arc<BackupService>,
    pub writer: WriterHandle,
}

impl AppState {
    /// Wrap `service` and start its writer task. Needs a running tokio runtime.
    pub fn new(service: Arc<BackupService>) -> Self {
        let writer = WriterHandle::spawn(service.clone());
        Self { service, writer }
    }
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub repo: HealthReport,
}

#[derive(Debug, Serialize)]
pub struct FetchResponse {
    pub ok: bool,
    pub data: Snapshot,
    pub meta: FetchMeta,
}

#[derive(Debug, Deserialize)]
pub struct SubmitRequest {
    pub data: Snapshot,
    #[serde(default)]
    pub meta: Map<String, Value>,
}

impl SubmitRequest {
    /// `meta.author` when it is a string.
    pub fn author(&self) -> Option<String> {
        self.meta
            .get("author")
            .and_then(Value::as_str)
            .map(str::to_string)
    }
}

#[derive(Debug, Serialize)]
pub struct SubmitResponse {
    pub ok: bool,
    pub commit: CommitResult,
}

#[derive(Debug, Serialize)]
struct ErrorBody<'a> {
    ok: bool,
    error: &'a str,
    detail: &'a str,
}

/// Error response: `{ ok: false, error: <tag>, detail }`.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    tag: &'static str,
    detail: String,
}

impl ApiError {
    pub fn unauthorized(failure: AuthFailure) -> Self {
        Self {
            status: StatusCode::UNAUTHORIZED,
            tag: "unauthorized",
            detail: failure.message().to_string(),
        }
    }

    fn from_rejection(rejection: JsonRejection) -> Self {
        Self {
            status: rejection.status(),
            tag: "invalid_payload",
            detail: format!("invalid_payload: {}", rejection.body_text()),
        }
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }
}

impl From<BackupError> for ApiError {
    fn from(err: BackupError) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            tag: err.tag(),
            detail: err.detail(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            ok: false,
            error: self.tag,
            detail: &self.detail,
        };
        (self.status, Json(body)).into_response()
    }
}

/// Routes without transport layers; see [`app`] for the served stack.
pub fn router(state: AppState, auth: AuthMode) -> Router {
    let backup = Router::new()
        .route("/api/backup", get(get_backup).post(post_backup))
        .route_layer(middleware::from_fn_with_state(auth, require_bearer));

    Router::new()
        .route("/api/health", get(health))
        .merge(backup)
        .with_state(state)
}

/// [`router`] wrapped in CORS and request tracing.
pub fn app(state: AppState, auth: AuthMode, origins: &AllowedOrigins) -> Router {
    router(state, auth)
        .layer(cors_layer(origins))
        .layer(TraceLayer::new_for_http())
}

pub fn cors_layer(origins: &AllowedOrigins) -> CorsLayer {
    let base = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([AUTHORIZATION, CONTENT_TYPE]);
    match origins {
        AllowedOrigins::Any => base.allow_origin(cors::Any),
        AllowedOrigins::List(list) => {
            let origins: Vec<HeaderValue> = list.iter().filter_map(|o| o.parse().ok()).collect();
            base.allow_credentials(true)
                .allow_origin(AllowOrigin::list(origins))
        }
    }
}

async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        repo: state.service.health(),
    })
}

async fn get_backup(State(state): State<AppState>) -> Result<Json<FetchResponse>, ApiError> {
    let service = state.service.clone();
    let fetched = tokio::task::spawn_blocking(move || service.fetch())
        .await
        .map_err(|err| BackupError::Internal(format!("fetch task join error: {err}")))??;
    Ok(Json(FetchResponse {
        ok: true,
        data: fetched.data,
        meta: fetched.meta,
    }))
}

async fn post_backup(
    State(state): State<AppState>,
    payload: Result<Json<SubmitRequest>, JsonRejection>,
) -> Result<Json<SubmitResponse>, ApiError> {
    let Json(request) = payload.map_err(ApiError::from_rejection)?;
    let author = request.author();
    let commit = state.writer.submit(request.data, author).await?;
    Ok(Json(SubmitResponse { ok: true, commit }))
}
