//! # corrald
//!
//! HTTP daemon for the Corral lifecycle engine.
//!
//! Every route is served both under each supported version prefix and
//! without one, so clients written against the unversioned API keep working:
//!
//! ```text
//! POST /v1.41/containers/top/pause   ─┐
//!                                      ├──► api::handlers::pause_container ──► Engine::pause
//! POST /containers/top/pause         ─┘
//! ```

#![warn(missing_docs)]

pub mod api;
pub mod config;

pub use api::{AppState, create_router};
pub use config::{DaemonConfig, LogFormat, SupervisorKind};

/// Current API version.
pub const API_VERSION: &str = "1.41";

/// Version prefixes the router is mounted under, besides the bare paths.
pub const SUPPORTED_API_VERSIONS: &[&str] = &["v1.0.0", "v1.40", "v1.41"];
