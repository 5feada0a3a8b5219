//! Engine errors as HTTP responses.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use corral_common::{CorralError, ErrorBody, StatusPolicy};

/// Result type for handlers.
pub type ApiResult<T> = Result<T, ApiError>;

/// An engine error bound to the status policy in effect.
#[derive(Debug)]
pub struct ApiError {
    error: CorralError,
    policy: StatusPolicy,
}

impl ApiError {
    /// Wrap an engine error.
    #[must_use]
    pub const fn new(error: CorralError, policy: StatusPolicy) -> Self {
        Self { error, policy }
    }

    /// The HTTP status this error maps to.
    #[must_use]
    pub fn status_code(&self) -> StatusCode {
        StatusCode::from_u16(self.policy.status_code(self.error.kind()))
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::warn!(error = %self.error, status = status.as_u16(), "request failed");
        } else {
            tracing::debug!(error = %self.error, status = status.as_u16(), "request rejected");
        }

        (status, Json(ErrorBody::from_error(&self.error, self.policy))).into_response()
    }
}
