//! # corral-common
//!
//! Shared types for the Corral lifecycle engine.
//!
//! This crate provides the vocabulary every other Corral crate speaks:
//! - Container ID generation and name validation
//! - The container status enum and its transition table
//! - The error taxonomy and its mapping onto HTTP status codes

#![warn(missing_docs)]

pub mod error;
pub mod id;
pub mod response;
pub mod status;

pub use error::{CorralError, CorralResult, ErrorKind};
pub use id::{ContainerId, ContainerName};
pub use response::{ErrorBody, StatusPolicy};
pub use status::{ContainerStatus, EXIT_CODE_UNKNOWN, GRACEFUL_STOP_EXIT_CODE};
