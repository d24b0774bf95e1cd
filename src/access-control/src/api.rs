//! HTTP surface over the policy store and access resolver
//!
//! ## Endpoints
//!
//! - `GET /v1/iam/clients`, `GET /v1/iam/clients/:id`
//! - `GET /v1/iam/roles`, `GET /v1/iam/roles/:id`
//! - `GET /v1/iam/scopes`, `GET /v1/iam/scopes/:key`
//! - `GET /v1/iam/scopes/:key/mappings`, `GET /v1/iam/scopes/:key/mappings/:role`
//! - `GET /v1/iam/users/:id`
//! - `GET /v1/iam/users/:id/access?scope=a&scope=b`
//! - `GET /health`
//!
//! The admin router, served on its own port, answers `GET /livez` and
//! `GET /readyz` with a plain `OK`.
//!
//! Successful responses are wrapped as `{"data": ...}`, failures as
//! `{"error": {"code": <status>, "message": "..."}}`.

use crate::error::{AccessError, StoreError};
use crate::resolver::{AccessResolver, User, UserAccess};
use crate::store::{Client, PolicyStore, Role, RoleMapping, Scope};

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::get,
    Router,
};
use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;
use tower_http::trace::{DefaultOnResponse, TraceLayer};
use tracing::{debug, error, Level};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    store: Arc<PolicyStore>,
    resolver: AccessResolver,
    version: String,
    start_time: Instant,
}

impl AppState {
    pub fn new(store: Arc<PolicyStore>, resolver: AccessResolver, version: impl Into<String>) -> Self {
        Self {
            store,
            resolver,
            version: version.into(),
            start_time: Instant::now(),
        }
    }
}

#[derive(Debug, Serialize)]
struct DataResponse<T> {
    data: T,
}

#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: ErrorBody,
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    code: u16,
    message: String,
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: String,
    uptime_seconds: u64,
    version: String,
}

/// Application error type
#[derive(Debug)]
enum AppError {
    NotFound(String),
    BadRequest(String),
    Internal(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::Internal(msg) => {
                error!(error = %msg, "Request failed");
                (StatusCode::INTERNAL_SERVER_ERROR, msg)
            }
        };

        let body = Json(ErrorResponse {
            error: ErrorBody {
                code: status.as_u16(),
                message,
            },
        });

        (status, body).into_response()
    }
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        AppError::NotFound(err.to_string())
    }
}

impl From<AccessError> for AppError {
    fn from(err: AccessError) -> Self {
        match err {
            AccessError::UserNotFound(_) => AppError::NotFound(err.to_string()),
            AccessError::InvalidInput(_) => AppError::BadRequest(err.to_string()),
            other => AppError::Internal(other.to_string()),
        }
    }
}

type ApiResult<T> = Result<Json<DataResponse<T>>, AppError>;

fn data<T>(data: T) -> ApiResult<T> {
    Ok(Json(DataResponse { data }))
}

/// GET /v1/iam/clients
async fn get_clients(State(state): State<AppState>) -> ApiResult<Vec<Client>> {
    let mut clients = state.store.get_clients();
    clients.sort_by(|a, b| a.id.cmp(&b.id));
    data(clients)
}

/// GET /v1/iam/clients/:id
async fn get_client(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<Client> {
    data(state.store.get_client(&id)?)
}

/// GET /v1/iam/roles
async fn get_roles(State(state): State<AppState>) -> ApiResult<Vec<Role>> {
    let mut roles = state.store.get_roles();
    roles.sort_by(|a, b| a.id.cmp(&b.id));
    data(roles)
}

/// GET /v1/iam/roles/:id
async fn get_role(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<Role> {
    data(state.store.get_role(&id)?)
}

/// GET /v1/iam/scopes
async fn get_scopes(State(state): State<AppState>) -> ApiResult<Vec<Scope>> {
    let mut scopes = state.store.get_scopes();
    scopes.sort_by(|a, b| a.key.cmp(&b.key));
    data(scopes)
}

/// GET /v1/iam/scopes/:key
async fn get_scope(State(state): State<AppState>, Path(key): Path<String>) -> ApiResult<Scope> {
    data(state.store.get_scope(&key)?)
}

/// GET /v1/iam/scopes/:key/mappings
async fn get_role_mappings(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> ApiResult<Vec<RoleMapping>> {
    let mut mappings = state.store.get_role_mappings(&key);
    mappings.sort_by(|a, b| a.role_id.cmp(&b.role_id));
    data(mappings)
}

/// GET /v1/iam/scopes/:key/mappings/:role
async fn get_role_mapping(
    State(state): State<AppState>,
    Path((key, role)): Path<(String, String)>,
) -> ApiResult<RoleMapping> {
    data(state.store.get_role_mapping(&key, &role)?)
}

/// GET /v1/iam/users/:id
async fn get_user(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<User> {
    data(state.resolver.get_user(&id).await?)
}

/// GET /v1/iam/users/:id/access
async fn get_user_access(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(params): Query<Vec<(String, String)>>,
) -> ApiResult<Vec<UserAccess>> {
    let scopes: Vec<String> = params
        .into_iter()
        .filter(|(key, value)| key == "scope" && !value.is_empty())
        .map(|(_, value)| value)
        .collect();

    if scopes.is_empty() {
        return Err(AppError::BadRequest("field scope is invalid".to_string()));
    }

    debug!(user = %id, scopes = ?scopes, "Access check");
    data(state.resolver.resolve_user_access(&id, &scopes).await?)
}

/// GET /health
async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        uptime_seconds: state.start_time.elapsed().as_secs(),
        version: state.version.clone(),
    })
}

/// GET /livez, GET /readyz
async fn ok() -> &'static str {
    "OK"
}

/// Create the admin router
///
/// The policy store is loaded before any listener starts, so a serving
/// process is always ready.
pub fn create_admin_router() -> Router {
    Router::new()
        .route("/livez", get(ok))
        .route("/readyz", get(ok))
}

/// Create the HTTP router with all endpoints
pub fn create_router(state: AppState) -> Router {
    let iam = Router::new()
        .route("/clients", get(get_clients))
        .route("/clients/:id", get(get_client))
        .route("/roles", get(get_roles))
        .route("/roles/:id", get(get_role))
        .route("/scopes", get(get_scopes))
        .route("/scopes/:key", get(get_scope))
        .route("/scopes/:key/mappings", get(get_role_mappings))
        .route("/scopes/:key/mappings/:role", get(get_role_mapping))
        .route("/users/:id", get(get_user))
        .route("/users/:id/access", get(get_user_access));

    let trace = TraceLayer::new_for_http().on_response(DefaultOnResponse::new().level(Level::INFO));

    Router::new()
        .nest("/v1/iam", iam)
        .route("/health", get(health_check))
        .layer(trace)
        .with_state(state)
}
