//! HTTP API.
//!
//! Routes are registered once in [`routes`] and mounted both bare and under
//! every prefix in [`crate::SUPPORTED_API_VERSIONS`].

pub mod error;
pub mod handlers;
pub mod types;

use axum::Router;
use axum::routing::{delete, get, post};
use corral::runtime::Engine;
use corral_common::{CorralError, StatusPolicy};
use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;

pub use error::ApiError;

/// Application state shared with handlers.
#[derive(Debug, Clone)]
pub struct AppState {
    /// The lifecycle engine.
    pub engine: Engine,
    /// How engine errors become status codes.
    pub policy: StatusPolicy,
    /// Canceled on daemon shutdown; aborts blocked waits.
    pub shutdown: CancellationToken,
}

impl AppState {
    /// State with the compat status policy.
    #[must_use]
    pub fn new(engine: Engine) -> Self {
        Self {
            engine,
            policy: StatusPolicy::default(),
            shutdown: CancellationToken::new(),
        }
    }

    /// Use a different status policy.
    #[must_use]
    pub const fn with_policy(mut self, policy: StatusPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Use an externally owned shutdown token.
    #[must_use]
    pub fn with_shutdown(mut self, token: CancellationToken) -> Self {
        self.shutdown = token;
        self
    }

    /// Adapter for `map_err` that binds the current status policy.
    pub fn errors(&self) -> impl Fn(CorralError) -> ApiError + use<> {
        let policy = self.policy;
        move |error| ApiError::new(error, policy)
    }
}

/// Build the router with all endpoints.
pub fn create_router(state: AppState) -> Router {
    let mut router = routes();
    for version in crate::SUPPORTED_API_VERSIONS {
        router = router.nest(&format!("/{version}"), routes());
    }

    router.layer(TraceLayer::new_for_http()).with_state(state)
}

fn routes() -> Router<AppState> {
    Router::new()
        // System
        .route("/_ping", get(handlers::ping).head(handlers::ping))
        .route("/version", get(handlers::version))
        // Containers
        .route("/containers/json", get(handlers::list_containers))
        .route("/containers/create", post(handlers::create_container))
        .route("/containers/{id}/json", get(handlers::inspect_container))
        .route("/containers/{id}/start", post(handlers::start_container))
        .route("/containers/{id}/pause", post(handlers::pause_container))
        .route("/containers/{id}/unpause", post(handlers::unpause_container))
        .route("/containers/{id}/stop", post(handlers::stop_container))
        .route("/containers/{id}/kill", post(handlers::kill_container))
        .route("/containers/{id}/wait", post(handlers::wait_container))
        .route("/containers/{id}", delete(handlers::remove_container))
}
