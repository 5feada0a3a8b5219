//! Request handlers.
//!
//! Handlers are thin: they parse the request, call one engine operation and
//! let [`super::ApiError`] pick the status code for failures.

use std::time::Duration;

use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use corral::runtime::WaitRequest;
use corral::supervisor::Signal;

use super::AppState;
use super::error::ApiResult;
use super::types::{
    ContainerInspectResponse, ContainerSummary, CreateContainerRequest, CreateContainerResponse,
    KillQuery, RemoveQuery, StopQuery, VersionResponse, WaitQuery, WaitResponse,
};

// ============================================================================
// System
// ============================================================================

/// `GET /_ping`.
pub async fn ping() -> &'static str {
    "OK"
}

/// `GET /version`.
pub async fn version() -> Json<VersionResponse> {
    Json(VersionResponse {
        version: env!("CARGO_PKG_VERSION").to_string(),
        api_version: crate::API_VERSION.to_string(),
        supported_api_versions: crate::SUPPORTED_API_VERSIONS
            .iter()
            .map(|v| v.trim_start_matches('v').to_string())
            .collect(),
        os: std::env::consts::OS.to_string(),
        arch: std::env::consts::ARCH.to_string(),
    })
}

// ============================================================================
// Containers
// ============================================================================

/// `GET /containers/json`.
pub async fn list_containers(State(state): State<AppState>) -> Json<Vec<ContainerSummary>> {
    let containers = state.engine.list().await;
    Json(containers.into_iter().map(ContainerSummary::from).collect())
}

/// `POST /containers/create`.
pub async fn create_container(
    State(state): State<AppState>,
    Json(body): Json<CreateContainerRequest>,
) -> ApiResult<(StatusCode, Json<CreateContainerResponse>)> {
    let config = body.into_config().map_err(state.errors())?;
    let id = state.engine.create(config).await.map_err(state.errors())?;

    Ok((
        StatusCode::CREATED,
        Json(CreateContainerResponse {
            id: id.to_string(),
            warnings: Vec::new(),
        }),
    ))
}

/// `GET /containers/{id}/json`.
pub async fn inspect_container(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<ContainerInspectResponse>> {
    let snapshot = state.engine.inspect(&id).await.map_err(state.errors())?;
    Ok(Json(snapshot.into()))
}

/// `POST /containers/{id}/start`.
pub async fn start_container(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<StatusCode> {
    state.engine.start(&id).await.map_err(state.errors())?;
    Ok(StatusCode::NO_CONTENT)
}

/// `POST /containers/{id}/pause`.
pub async fn pause_container(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<StatusCode> {
    state.engine.pause(&id).await.map_err(state.errors())?;
    Ok(StatusCode::NO_CONTENT)
}

/// `POST /containers/{id}/unpause`.
pub async fn unpause_container(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<StatusCode> {
    state.engine.unpause(&id).await.map_err(state.errors())?;
    Ok(StatusCode::NO_CONTENT)
}

/// `POST /containers/{id}/stop?t=<seconds>`.
pub async fn stop_container(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(pairs): Query<Vec<(String, String)>>,
) -> ApiResult<StatusCode> {
    let query = StopQuery::from_pairs(&pairs).map_err(state.errors())?;
    let timeout = query.t.map(Duration::from_secs);
    state
        .engine
        .stop(&id, timeout)
        .await
        .map_err(state.errors())?;
    Ok(StatusCode::NO_CONTENT)
}

/// `POST /containers/{id}/kill?signal=<name|number>`.
pub async fn kill_container(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(query): Query<KillQuery>,
) -> ApiResult<StatusCode> {
    let signal = match query.signal.as_deref() {
        Some(raw) => raw.parse::<Signal>().map_err(state.errors())?,
        None => Signal::KILL,
    };
    state
        .engine
        .kill(&id, signal)
        .await
        .map_err(state.errors())?;
    Ok(StatusCode::NO_CONTENT)
}

/// `DELETE /containers/{id}?force=<bool>&v=<bool>`.
pub async fn remove_container(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(pairs): Query<Vec<(String, String)>>,
) -> ApiResult<StatusCode> {
    let query = RemoveQuery::from_pairs(&pairs).map_err(state.errors())?;
    if query.v {
        tracing::debug!(container = %id, "no volumes to remove");
    }
    state
        .engine
        .remove(&id, query.force)
        .await
        .map_err(state.errors())?;
    Ok(StatusCode::NO_CONTENT)
}

/// `POST /containers/{id}/wait?condition=<status>&timeout=<seconds>`.
///
/// Blocks until the condition is met. If the client disconnects the handler
/// future is dropped, which unregisters the waiter.
pub async fn wait_container(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(pairs): Query<Vec<(String, String)>>,
) -> ApiResult<Json<WaitResponse>> {
    let query = WaitQuery::from_pairs(&pairs).map_err(state.errors())?;

    let mut request = WaitRequest::until(query.conditions).with_cancel(state.shutdown.child_token());
    if let Some(timeout) = query.timeout {
        request = request.with_timeout(timeout);
    }

    let outcome = state
        .engine
        .wait(&id, request)
        .await
        .map_err(state.errors())?;
    Ok(Json(outcome.into()))
}
