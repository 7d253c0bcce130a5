//! TestRun Worker Library
//!
//! Executes one test task at a time: fetch the source, install its
//! dependencies, run the suite while streaming output, and report a single
//! verdict back to the dispatcher.

pub mod aggregator;
pub mod availability;
pub mod channel;
pub mod collaborators;
pub mod config;
pub mod error;
pub mod executor;
pub mod guard;
pub mod ports;
pub mod repo_config;
pub mod telemetry;
pub mod worker;

#[cfg(test)]
mod test_support;

pub use availability::{AvailabilityLease, WorkerState};
pub use config::WorkerConfig;
pub use error::{ChannelError, CollaboratorError, PipelineError};
pub use executor::{Collaborators, TaskExecutor};
pub use worker::Worker;
