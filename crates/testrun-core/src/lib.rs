//! TestRun Core Domain Types
//!
//! This crate contains pure domain types with no dependencies on:
//! - Network transports
//! - Subprocesses or the filesystem
//! - Runtime specifics
//!
//! All types here describe what the dispatcher and a test worker exchange.

pub mod error;
pub mod ids;
pub mod message;
pub mod status;
pub mod task;

// Re-export commonly used types
pub use error::CoreError;
pub use ids::{TaskId, WorkerId};
pub use message::{failure_extra, StatusMessage, Verdict, END_OF_STREAM};
pub use status::{Outcome, PipelineStage, WorkerAvailability};
pub use task::{parse_env_overrides, SourceRef, TaskDescriptor, TaskMessage};
