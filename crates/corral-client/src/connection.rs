//! Connection to a corrald instance.

use reqwest::{Client, Method, RequestBuilder};
use serde::de::DeserializeOwned;

use crate::error::{ClientError, ClientResult, check_response};
use crate::types::VersionInfo;

/// API version prefix used unless told otherwise.
pub const DEFAULT_API_VERSION: &str = "v1.41";

/// Handle to a daemon. Cheap to clone; clones share the connection pool.
#[derive(Debug, Clone)]
pub struct Connection {
    client: Client,
    base_url: String,
    api_version: Option<String>,
}

impl Connection {
    /// Connect to the daemon at `base_url`, e.g. `http://127.0.0.1:8080`.
    ///
    /// No request is made until the first call.
    pub fn new(base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self {
            client: Client::new(),
            base_url,
            api_version: Some(DEFAULT_API_VERSION.to_string()),
        }
    }

    /// Use another version prefix, or `None` for the bare paths.
    #[must_use]
    pub fn with_api_version(mut self, version: Option<&str>) -> Self {
        self.api_version = version.map(str::to_string);
        self
    }

    /// The daemon address.
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Check that the daemon is up.
    ///
    /// # Errors
    ///
    /// Fails if the daemon cannot be reached.
    pub async fn ping(&self) -> ClientResult<()> {
        self.send(Method::GET, "/_ping", |req| req).await?;
        Ok(())
    }

    /// Daemon version information.
    ///
    /// # Errors
    ///
    /// Fails if the daemon cannot be reached.
    pub async fn version(&self) -> ClientResult<VersionInfo> {
        self.json(Method::GET, "/version", |req| req).await
    }

    pub(crate) fn url(&self, path: &str) -> String {
        match &self.api_version {
            Some(version) => format!("{}/{version}{path}", self.base_url),
            None => format!("{}{path}", self.base_url),
        }
    }

    /// Send a request and fail on any non-success status.
    pub(crate) async fn send(
        &self,
        method: Method,
        path: &str,
        build: impl FnOnce(RequestBuilder) -> RequestBuilder,
    ) -> ClientResult<reqwest::Response> {
        let url = self.url(path);
        tracing::debug!(%method, url = %url, "request");

        let response = build(self.client.request(method, &url))
            .send()
            .await
            .map_err(|source| ClientError::Transport {
                url: url.clone(),
                source,
            })?;
        check_response(&url, response).await
    }

    /// Send a request and decode a JSON reply.
    pub(crate) async fn json<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        build: impl FnOnce(RequestBuilder) -> RequestBuilder,
    ) -> ClientResult<T> {
        let response = self.send(method, path, build).await?;
        let url = response.url().to_string();
        response.json().await.map_err(|e| ClientError::Decode {
            url,
            message: e.to_string(),
        })
    }
}
