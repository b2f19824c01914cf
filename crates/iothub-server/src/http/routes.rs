use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use iothub_core::{NodeFilter, RedbStorage, Storage};
use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;

#[derive(Clone)]
pub struct AppState {
    pub storage: Arc<RedbStorage>,
    pub start_time: Instant,
}

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/v1/nodes/:id", get(get_node))
        .route("/v1/nodes", get(list_nodes))
        .route("/v1/stats", get(stats))
        .with_state(state)
}

pub struct AppError(iothub_core::HubError);

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match self.0.kind() {
            iothub_core::ErrorKind::NotFound => StatusCode::NOT_FOUND,
            iothub_core::ErrorKind::Conflict => StatusCode::CONFLICT,
            iothub_core::ErrorKind::Decode | iothub_core::ErrorKind::Invariant => {
                StatusCode::BAD_REQUEST
            }
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, Json(ErrorBody { error: self.0.to_string() })).into_response()
    }
}

impl From<iothub_core::HubError> for AppError {
    fn from(e: iothub_core::HubError) -> Self {
        AppError(e)
    }
}

type AppResult<T> = Result<T, AppError>;

#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

#[derive(Serialize)]
struct HealthResponse {
    healthy: bool,
    version: &'static str,
    uptime_seconds: u64,
    node_count: u64,
    edge_count: u64,
}

async fn healthz(State(state): State<AppState>) -> AppResult<Json<HealthResponse>> {
    let stats = state.storage.stats()?;
    Ok(Json(HealthResponse {
        healthy: true,
        version: env!("CARGO_PKG_VERSION"),
        uptime_seconds: state.start_time.elapsed().as_secs(),
        node_count: stats.node_count,
        edge_count: stats.edge_count,
    }))
}

async fn get_node(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<Json<iothub_core::Node>> {
    let node = state
        .storage
        .get_node(&id)?
        .ok_or_else(|| iothub_core::HubError::NodeNotFound(id.clone()))?;
    Ok(Json(node))
}

async fn list_nodes(State(state): State<AppState>) -> AppResult<Json<Vec<iothub_core::Node>>> {
    let nodes = state.storage.list_nodes(&NodeFilter::new())?;
    Ok(Json(nodes))
}

async fn stats(State(state): State<AppState>) -> AppResult<Json<iothub_core::StorageStats>> {
    Ok(Json(state.storage.stats()?))
}
