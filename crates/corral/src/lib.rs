//! # Corral lifecycle engine
//!
//! Corral tracks container state, enforces the legal transitions between
//! states and lets any number of callers block until a container reaches
//! a state they care about.
//!
//! ## Usage
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use corral::runtime::{ContainerConfig, Engine, EngineConfig, WaitRequest};
//! use corral::supervisor::SimulatedSupervisor;
//!
//! # async fn example() -> corral_common::CorralResult<()> {
//! let engine = Engine::new(Arc::new(SimulatedSupervisor::new()), EngineConfig::default());
//! engine.start_exit_monitor();
//!
//! let id = engine.create(ContainerConfig::new(vec!["top".into()])).await?;
//! engine.start(id.as_str()).await?;
//!
//! // Block until the container exits, from another task
//! let waiter = engine.clone();
//! let wait_id = id.clone();
//! let exit = tokio::spawn(async move { waiter.wait(wait_id.as_str(), WaitRequest::default()).await });
//!
//! engine.stop(id.as_str(), None).await?;
//! # let _ = exit.await;
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]

pub mod runtime;
pub mod supervisor;

pub use runtime::{ContainerConfig, ContainerSnapshot, Engine, EngineConfig, WaitOutcome, WaitRequest};
pub use supervisor::{ExitStatus, ProcessSupervisor, Signal};
