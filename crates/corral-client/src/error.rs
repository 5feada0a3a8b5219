//! Client-side errors.

use corral_common::{ErrorBody, ErrorKind, StatusPolicy};
use miette::Diagnostic;
use thiserror::Error;

/// Result type alias using [`ClientError`].
pub type ClientResult<T> = Result<T, ClientError>;

/// Errors returned by the bindings.
#[derive(Error, Diagnostic, Debug)]
pub enum ClientError {
    /// The request never produced a response.
    #[error("request to {url} failed: {source}")]
    #[diagnostic(
        code(corral_client::transport),
        help("check that corrald is running and listening on this address")
    )]
    Transport {
        /// Target URL.
        url: String,
        /// Underlying error.
        #[source]
        source: reqwest::Error,
    },

    /// The daemon answered with an error status.
    #[error("{} (HTTP {})", body.message, body.response)]
    #[diagnostic(code(corral_client::api))]
    Api {
        /// Error body sent by the daemon.
        body: ErrorBody,
    },

    /// The response body was not what the endpoint promises.
    #[error("unexpected response from {url}: {message}")]
    #[diagnostic(code(corral_client::decode))]
    Decode {
        /// Target URL.
        url: String,
        /// What went wrong.
        message: String,
    },
}

impl ClientError {
    /// Error kind reported by the daemon, if the daemon answered.
    #[must_use]
    pub const fn kind(&self) -> Option<ErrorKind> {
        match self {
            Self::Api { body } => Some(body.cause),
            _ => None,
        }
    }

    /// HTTP status code of the error response, if the daemon answered.
    #[must_use]
    pub const fn status_code(&self) -> Option<u16> {
        match self {
            Self::Api { body } => Some(body.response),
            _ => None,
        }
    }
}

/// Turn a non-success response into [`ClientError::Api`].
///
/// The body's `cause` is authoritative. A body that cannot be parsed (a
/// proxy error page, say) falls back to guessing the kind from the code.
pub(crate) async fn check_response(
    url: &str,
    response: reqwest::Response,
) -> ClientResult<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let code = status.as_u16();
    let text = response.text().await.unwrap_or_default();
    let body = serde_json::from_str::<ErrorBody>(&text).unwrap_or_else(|_| ErrorBody {
        cause: StatusPolicy::Compat
            .kind_for(code)
            .unwrap_or(ErrorKind::Internal),
        message: if text.is_empty() {
            status.to_string()
        } else {
            text
        },
        response: code,
    });

    tracing::debug!(url, code, cause = %body.cause, "daemon returned an error");
    Err(ClientError::Api { body })
}
