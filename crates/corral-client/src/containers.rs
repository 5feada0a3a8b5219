//! Container operations.
//!
//! Every call takes a container ID, unique ID prefix or name.

use std::time::Duration;

use corral_common::ContainerStatus;
use reqwest::Method;

use crate::connection::Connection;
use crate::error::ClientResult;
use crate::types::{ContainerInspect, ContainerSummary, CreateOptions, CreateResponse, WaitResponse};

/// Options for [`Connection::remove`].
#[derive(Debug, Clone, Copy, Default)]
pub struct RemoveOptions {
    /// Stop a running or paused container first.
    pub force: bool,
    /// Remove anonymous volumes.
    pub volumes: bool,
}

/// Options for [`Connection::wait`].
#[derive(Debug, Clone, Default)]
pub struct WaitOptions {
    /// Statuses that end the wait. Empty means `exited`.
    pub conditions: Vec<ContainerStatus>,
    /// Server-side deadline, in whole seconds.
    pub timeout: Option<Duration>,
}

impl WaitOptions {
    /// Wait for any of `conditions`.
    pub fn until(conditions: impl IntoIterator<Item = ContainerStatus>) -> Self {
        Self {
            conditions: conditions.into_iter().collect(),
            timeout: None,
        }
    }

    /// Give up after `timeout`.
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    fn query(&self) -> Vec<(&'static str, String)> {
        let mut query: Vec<_> = self
            .conditions
            .iter()
            .map(|c| ("condition", c.as_str().to_string()))
            .collect();
        if let Some(timeout) = self.timeout {
            query.push(("timeout", timeout.as_secs().to_string()));
        }
        query
    }
}

impl Connection {
    /// Create a container.
    ///
    /// # Errors
    ///
    /// `InvalidArgument` for a bad or taken name.
    pub async fn create(&self, options: &CreateOptions) -> ClientResult<CreateResponse> {
        self.json(Method::POST, "/containers/create", |req| req.json(options))
            .await
    }

    /// Start a created or exited container.
    ///
    /// # Errors
    ///
    /// `NotFound` or `InvalidState`.
    pub async fn start(&self, name: &str) -> ClientResult<()> {
        self.send(Method::POST, &format!("/containers/{name}/start"), |req| req)
            .await?;
        Ok(())
    }

    /// Pause a running container.
    ///
    /// # Errors
    ///
    /// `NotFound`, or `InvalidState` if it is not running.
    pub async fn pause(&self, name: &str) -> ClientResult<()> {
        self.send(Method::POST, &format!("/containers/{name}/pause"), |req| req)
            .await?;
        Ok(())
    }

    /// Resume a paused container.
    ///
    /// # Errors
    ///
    /// `NotFound`, or `InvalidState` if it is not paused.
    pub async fn unpause(&self, name: &str) -> ClientResult<()> {
        self.send(Method::POST, &format!("/containers/{name}/unpause"), |req| {
            req
        })
        .await?;
        Ok(())
    }

    /// Stop a running container, escalating to SIGKILL after `timeout`.
    ///
    /// # Errors
    ///
    /// `NotFound`, or `InvalidState` if it is not running.
    pub async fn stop(&self, name: &str, timeout: Option<Duration>) -> ClientResult<()> {
        self.send(Method::POST, &format!("/containers/{name}/stop"), |req| {
            match timeout {
                Some(t) => req.query(&[("t", t.as_secs())]),
                None => req,
            }
        })
        .await?;
        Ok(())
    }

    /// Send a signal, SIGKILL when `signal` is `None`.
    ///
    /// # Errors
    ///
    /// `NotFound`, `InvalidState`, or `InvalidArgument` for a bad signal.
    pub async fn kill(&self, name: &str, signal: Option<&str>) -> ClientResult<()> {
        self.send(Method::POST, &format!("/containers/{name}/kill"), |req| {
            match signal {
                Some(signal) => req.query(&[("signal", signal)]),
                None => req,
            }
        })
        .await?;
        Ok(())
    }

    /// Remove a container.
    ///
    /// # Errors
    ///
    /// `NotFound`, or `InvalidState` if it is alive and `force` is unset.
    pub async fn remove(&self, name: &str, options: RemoveOptions) -> ClientResult<()> {
        self.send(Method::DELETE, &format!("/containers/{name}"), |req| {
            req.query(&[("force", options.force), ("v", options.volumes)])
        })
        .await?;
        Ok(())
    }

    /// Block until the container reaches one of the requested statuses.
    ///
    /// # Errors
    ///
    /// `NotFound` if the container does not exist or is removed while
    /// waiting, `Timeout` if the server-side deadline passes.
    pub async fn wait(&self, name: &str, options: &WaitOptions) -> ClientResult<WaitResponse> {
        let query = options.query();
        self.json(Method::POST, &format!("/containers/{name}/wait"), |req| {
            req.query(&query)
        })
        .await
    }

    /// Inspect a container.
    ///
    /// # Errors
    ///
    /// `NotFound`.
    pub async fn inspect(&self, name: &str) -> ClientResult<ContainerInspect> {
        self.json(Method::GET, &format!("/containers/{name}/json"), |req| req)
            .await
    }

    /// List all containers, oldest first.
    ///
    /// # Errors
    ///
    /// Fails if the daemon cannot be reached.
    pub async fn list(&self) -> ClientResult<Vec<ContainerSummary>> {
        self.json(Method::GET, "/containers/json", |req| req).await
    }
}
