//! Request and response bodies.

use std::time::Duration;

use chrono::{DateTime, Utc};
use corral::runtime::{ContainerConfig, ContainerSnapshot, WaitOutcome};
use corral_common::{ContainerName, ContainerStatus, CorralError, CorralResult};
use serde::{Deserialize, Serialize};

/// Body of `POST /containers/create`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct CreateContainerRequest {
    /// Container name.
    #[serde(default)]
    pub name: Option<String>,
    /// Program and arguments.
    pub cmd: Vec<String>,
    /// Environment as `KEY=VALUE` strings.
    #[serde(default)]
    pub env: Vec<String>,
    /// Stop timeout in seconds.
    #[serde(default)]
    pub stop_timeout: Option<u64>,
}

impl CreateContainerRequest {
    /// Convert into an engine config, validating the name.
    ///
    /// # Errors
    ///
    /// Returns `InvalidName` for a malformed name.
    pub fn into_config(self) -> CorralResult<ContainerConfig> {
        let mut config = ContainerConfig::new(self.cmd);
        if let Some(name) = self.name {
            config = config.with_name(ContainerName::new(name)?);
        }
        for pair in self.env {
            // A bare KEY sets an empty value
            let (key, value) = pair.split_once('=').unwrap_or((pair.as_str(), ""));
            config = config.with_env(key, value);
        }
        if let Some(secs) = self.stop_timeout {
            config = config.with_stop_timeout(Duration::from_secs(secs));
        }
        Ok(config)
    }
}

/// Response of `POST /containers/create`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct CreateContainerResponse {
    /// ID of the new container.
    pub id: String,
    /// Non-fatal problems.
    pub warnings: Vec<String>,
}

/// State section of an inspect response.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ContainerState {
    /// One of created, running, paused, exited, removing.
    pub status: ContainerStatus,
    /// True while running.
    pub running: bool,
    /// True while paused.
    pub paused: bool,
    /// Exit code of the last run, or -1.
    pub exit_code: i32,
    /// Process ID, 0 when there is none.
    pub pid: u32,
    /// Start of the current or last run.
    pub started_at: Option<DateTime<Utc>>,
    /// End of the last run.
    pub finished_at: Option<DateTime<Utc>>,
}

/// Config section of an inspect response.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ContainerConfigView {
    /// Program and arguments.
    pub cmd: Vec<String>,
}

/// Response of `GET /containers/{id}/json`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ContainerInspectResponse {
    /// Full container ID.
    pub id: String,
    /// Container name.
    pub name: String,
    /// Creation time.
    pub created: DateTime<Utc>,
    /// Runtime state.
    pub state: ContainerState,
    /// Creation parameters.
    pub config: ContainerConfigView,
}

impl From<ContainerSnapshot> for ContainerInspectResponse {
    fn from(snap: ContainerSnapshot) -> Self {
        Self {
            id: snap.id.to_string(),
            name: snap.name.to_string(),
            created: snap.created_at,
            state: ContainerState {
                status: snap.status,
                running: snap.status == ContainerStatus::Running,
                paused: snap.status == ContainerStatus::Paused,
                exit_code: snap.exit_code,
                pid: snap.pid.unwrap_or(0),
                started_at: snap.started_at,
                finished_at: snap.finished_at,
            },
            config: ContainerConfigView { cmd: snap.command },
        }
    }
}

/// Entry of `GET /containers/json`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ContainerSummary {
    /// Full container ID.
    pub id: String,
    /// Names, as a list for compatibility.
    pub names: Vec<String>,
    /// Command line joined with spaces.
    pub command: String,
    /// Creation time as a Unix timestamp.
    pub created: i64,
    /// Current status.
    pub state: ContainerStatus,
    /// Exit code of the last run, or -1.
    pub exit_code: i32,
}

impl From<ContainerSnapshot> for ContainerSummary {
    fn from(snap: ContainerSnapshot) -> Self {
        Self {
            id: snap.id.to_string(),
            names: vec![snap.name.to_string()],
            command: snap.command.join(" "),
            created: snap.created_at.timestamp(),
            state: snap.status,
            exit_code: snap.exit_code,
        }
    }
}

/// Response of `POST /containers/{id}/wait`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct WaitResponse {
    /// Exit code when the wait ended on exited, otherwise -1.
    pub exit_code: i32,
    /// The status that ended the wait.
    pub status: ContainerStatus,
}

impl From<WaitOutcome> for WaitResponse {
    fn from(outcome: WaitOutcome) -> Self {
        Self {
            exit_code: outcome.exit_code,
            status: outcome.status,
        }
    }
}

/// Response of `GET /version`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct VersionResponse {
    /// Daemon version.
    pub version: String,
    /// Current API version.
    pub api_version: String,
    /// All mounted version prefixes.
    pub supported_api_versions: Vec<String>,
    /// Operating system.
    pub os: String,
    /// CPU architecture.
    pub arch: String,
}

/// Query of `POST /containers/{id}/stop`.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct StopQuery {
    /// Seconds to wait before SIGKILL.
    pub t: Option<u64>,
}

impl StopQuery {
    /// Parse the `t` pair, ignoring other keys.
    ///
    /// # Errors
    ///
    /// `InvalidParameter` if `t` is not a whole number of seconds.
    pub fn from_pairs(pairs: &[(String, String)]) -> CorralResult<Self> {
        let mut query = Self::default();
        for (key, value) in pairs {
            if key == "t" {
                query.t = Some(parse_secs("t", value)?);
            }
        }
        Ok(query)
    }
}

/// Query of `POST /containers/{id}/kill`.
#[derive(Debug, Default, Deserialize)]
pub struct KillQuery {
    /// Signal name or number. Defaults to SIGKILL.
    pub signal: Option<String>,
}

/// Query of `DELETE /containers/{id}`.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct RemoveQuery {
    /// Stop a running or paused container first.
    pub force: bool,
    /// Remove volumes. Accepted for compatibility; there are none.
    pub v: bool,
}

impl RemoveQuery {
    /// Parse `force` and `v`, which take `1`/`0` as well as `true`/`false`.
    ///
    /// # Errors
    ///
    /// `InvalidParameter` for any other value.
    pub fn from_pairs(pairs: &[(String, String)]) -> CorralResult<Self> {
        let mut query = Self::default();
        for (key, value) in pairs {
            match key.as_str() {
                "force" => query.force = parse_bool("force", value)?,
                "v" => query.v = parse_bool("v", value)?,
                _ => {}
            }
        }
        Ok(query)
    }
}

/// Parsed query of `POST /containers/{id}/wait`.
///
/// `condition` may repeat, which the plain `Query` extractor cannot express,
/// so this is built from the raw key/value pairs.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct WaitQuery {
    /// Statuses that end the wait.
    pub conditions: Vec<ContainerStatus>,
    /// Give up after this many seconds.
    pub timeout: Option<Duration>,
}

impl WaitQuery {
    /// Parse `condition` and `timeout` pairs, ignoring other keys.
    ///
    /// # Errors
    ///
    /// Returns `UnknownStatus` for a bad condition and `InvalidParameter`
    /// for a timeout that is not a whole number of seconds.
    pub fn from_pairs(pairs: &[(String, String)]) -> CorralResult<Self> {
        let mut query = Self::default();
        for (key, value) in pairs {
            match key.as_str() {
                "condition" => {
                    for condition in value.split(',').filter(|c| !c.is_empty()) {
                        query.conditions.push(condition.parse()?);
                    }
                }
                "timeout" => {
                    query.timeout = Some(Duration::from_secs(parse_secs("timeout", value)?));
                }
                other => tracing::debug!(key = other, "ignoring wait parameter"),
            }
        }
        Ok(query)
    }
}

fn parse_secs(name: &'static str, value: &str) -> CorralResult<u64> {
    value.parse().map_err(|_| CorralError::InvalidParameter {
        name,
        value: value.to_string(),
    })
}

fn parse_bool(name: &'static str, value: &str) -> CorralResult<bool> {
    match value.to_ascii_lowercase().as_str() {
        "1" | "true" => Ok(true),
        "0" | "false" | "" => Ok(false),
        _ => Err(CorralError::InvalidParameter {
            name,
            value: value.to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pairs(raw: &[(&str, &str)]) -> Vec<(String, String)> {
        raw.iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect()
    }

    #[test]
    fn wait_query_accepts_repeated_conditions() {
        let query = WaitQuery::from_pairs(&pairs(&[
            ("condition", "paused"),
            ("condition", "stopped"),
            ("timeout", "5"),
        ]))
        .unwrap();

        assert_eq!(
            query.conditions,
            vec![ContainerStatus::Paused, ContainerStatus::Exited]
        );
        assert_eq!(query.timeout, Some(Duration::from_secs(5)));
    }

    #[test]
    fn wait_query_rejects_unknown_condition() {
        assert!(WaitQuery::from_pairs(&pairs(&[("condition", "frozen")])).is_err());
        assert!(WaitQuery::from_pairs(&pairs(&[("timeout", "soon")])).is_err());
    }

    #[test]
    fn remove_query_accepts_numeric_booleans() {
        let query = RemoveQuery::from_pairs(&pairs(&[("force", "1"), ("v", "0")])).unwrap();
        assert!(query.force);
        assert!(!query.v);

        let query = RemoveQuery::from_pairs(&pairs(&[("force", "TRUE")])).unwrap();
        assert!(query.force);

        let err = RemoveQuery::from_pairs(&pairs(&[("force", "yes")])).unwrap_err();
        assert!(matches!(err, CorralError::InvalidParameter { name: "force", .. }));
    }

    #[test]
    fn stop_query_rejects_non_numeric_timeout() {
        assert_eq!(
            StopQuery::from_pairs(&pairs(&[("t", "7")])).unwrap(),
            StopQuery { t: Some(7) }
        );
        let err = StopQuery::from_pairs(&pairs(&[("t", "abc")])).unwrap_err();
        assert!(matches!(err, CorralError::InvalidParameter { name: "t", .. }));
    }

    #[test]
    fn create_request_builds_config() {
        let req: CreateContainerRequest = serde_json::from_str(
            r#"{"Name":"top","Cmd":["top"],"Env":["A=1","B"],"StopTimeout":3}"#,
        )
        .unwrap();
        let config = req.into_config().unwrap();

        assert_eq!(config.name.unwrap().as_str(), "top");
        assert_eq!(config.env.get("A").map(String::as_str), Some("1"));
        assert_eq!(config.env.get("B").map(String::as_str), Some(""));
        assert_eq!(config.stop_timeout, Some(Duration::from_secs(3)));
    }

    #[test]
    fn create_request_rejects_bad_name() {
        let req = CreateContainerRequest {
            name: Some("-bad".into()),
            cmd: vec!["top".into()],
            ..Default::default()
        };
        assert!(req.into_config().is_err());
    }
}
