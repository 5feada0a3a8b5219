//! Mapping of lifecycle errors onto HTTP status codes.
//!
//! The daemon uses this to build responses and the client bindings use it
//! in reverse to recover the [`ErrorKind`] from a response code.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{CorralError, ErrorKind};

/// Non-standard code for a request the client abandoned.
pub const CLIENT_CLOSED_REQUEST: u16 = 499;

/// How an invalid transition is reported over HTTP.
///
/// `Compat` reproduces the codes existing clients were written against,
/// where a rejected transition is a plain server error. `Conflict` reports
/// it as 409 instead.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StatusPolicy {
    /// `InvalidState` maps to 500.
    #[default]
    Compat,
    /// `InvalidState` maps to 409.
    Conflict,
}

impl StatusPolicy {
    /// Returns the HTTP status code for an error kind.
    #[must_use]
    pub const fn status_code(self, kind: ErrorKind) -> u16 {
        match (kind, self) {
            (ErrorKind::NotFound, _) => 404,
            (ErrorKind::InvalidState, Self::Compat) | (ErrorKind::Internal, _) => 500,
            (ErrorKind::InvalidState, Self::Conflict) => 409,
            (ErrorKind::Timeout, _) => 408,
            (ErrorKind::Canceled, _) => CLIENT_CLOSED_REQUEST,
            (ErrorKind::InvalidArgument, _) => 400,
        }
    }

    /// Recovers the error kind from a status code, if it is an error code.
    ///
    /// Under `Compat`, 500 is ambiguous and resolves to `Internal`; the
    /// `cause` field of the response body disambiguates.
    #[must_use]
    pub const fn kind_for(self, code: u16) -> Option<ErrorKind> {
        match code {
            404 => Some(ErrorKind::NotFound),
            409 => Some(ErrorKind::InvalidState),
            500 => Some(ErrorKind::Internal),
            408 => Some(ErrorKind::Timeout),
            CLIENT_CLOSED_REQUEST => Some(ErrorKind::Canceled),
            400 => Some(ErrorKind::InvalidArgument),
            _ => None,
        }
    }
}

impl fmt::Display for StatusPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Compat => f.write_str("compat"),
            Self::Conflict => f.write_str("conflict"),
        }
    }
}

impl FromStr for StatusPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "compat" => Ok(Self::Compat),
            "conflict" => Ok(Self::Conflict),
            other => Err(format!("unknown status policy: {other}")),
        }
    }
}

/// JSON body of every error response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    /// Stable error kind.
    pub cause: ErrorKind,
    /// Human-readable message.
    pub message: String,
    /// The HTTP status code that carried this body.
    pub response: u16,
}

impl ErrorBody {
    /// Builds the body for an error under the given policy.
    #[must_use]
    pub fn from_error(err: &CorralError, policy: StatusPolicy) -> Self {
        let cause = err.kind();
        Self {
            cause,
            message: err.to_string(),
            response: policy.status_code(cause),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compat_codes() {
        let p = StatusPolicy::Compat;
        assert_eq!(p.status_code(ErrorKind::NotFound), 404);
        assert_eq!(p.status_code(ErrorKind::InvalidState), 500);
        assert_eq!(p.status_code(ErrorKind::Internal), 500);
        assert_eq!(p.status_code(ErrorKind::Timeout), 408);
        assert_eq!(p.status_code(ErrorKind::Canceled), 499);
        assert_eq!(p.status_code(ErrorKind::InvalidArgument), 400);
    }

    #[test]
    fn conflict_policy_only_changes_invalid_state() {
        let compat = StatusPolicy::Compat;
        let conflict = StatusPolicy::Conflict;
        assert_eq!(conflict.status_code(ErrorKind::InvalidState), 409);
        for kind in [
            ErrorKind::NotFound,
            ErrorKind::Internal,
            ErrorKind::Timeout,
            ErrorKind::Canceled,
            ErrorKind::InvalidArgument,
        ] {
            assert_eq!(compat.status_code(kind), conflict.status_code(kind));
        }
    }

    #[test]
    fn body_carries_kind_and_code() {
        let err = CorralError::InvalidState {
            id: "abc".into(),
            status: crate::ContainerStatus::Exited,
            operation: "pause",
        };
        let body = ErrorBody::from_error(&err, StatusPolicy::Compat);
        assert_eq!(body.cause, ErrorKind::InvalidState);
        assert_eq!(body.response, 500);

        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["cause"], "invalid_state");
    }

    #[test]
    fn policy_parsing() {
        assert_eq!("conflict".parse::<StatusPolicy>(), Ok(StatusPolicy::Conflict));
        assert!("teapot".parse::<StatusPolicy>().is_err());
    }
}
