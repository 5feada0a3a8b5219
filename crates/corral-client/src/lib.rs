//! # corral-client
//!
//! Typed HTTP bindings for corrald.
//!
//! ```no_run
//! use corral_client::{Connection, WaitOptions};
//! use corral_common::ContainerStatus;
//!
//! # async fn demo() -> corral_client::ClientResult<()> {
//! let conn = Connection::new("http://127.0.0.1:8080");
//! conn.pause("top").await?;
//! let waited = conn
//!     .wait("top", &WaitOptions::until([ContainerStatus::Running]))
//!     .await?;
//! assert_eq!(waited.exit_code, -1);
//! # Ok(())
//! # }
//! ```
//!
//! Daemon errors come back as [`ClientError::Api`] carrying the daemon's
//! error body, so callers can match on [`ClientError::kind`] regardless of
//! which status policy the daemon runs with.

#![warn(missing_docs)]

pub mod connection;
pub mod containers;
pub mod error;
pub mod types;

pub use connection::{Connection, DEFAULT_API_VERSION};
pub use containers::{RemoveOptions, WaitOptions};
pub use error::{ClientError, ClientResult};
pub use types::{
    ContainerInspect, ContainerState, ContainerSummary, CreateOptions, CreateResponse,
    VersionInfo, WaitResponse,
};
