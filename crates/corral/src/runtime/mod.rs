//! Container lifecycle core.
//!
//! The [`Engine`] owns the state store, applies transitions through the
//! process supervisor and wakes waiters when a transition commits.

mod config;
mod engine;
pub mod events;
mod record;
mod store;
mod wait;

pub use config::EngineConfig;
pub use engine::Engine;
pub use events::{EventBus, RuntimeEvent};
pub use record::{ContainerConfig, ContainerSnapshot};
pub use store::StateStore;
pub use wait::{WaitOutcome, WaitRequest};
