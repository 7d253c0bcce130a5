//! Core domain errors.

use thiserror::Error;

/// Core domain errors for TestRun.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Task message could not be decoded.
    #[error("Invalid task message: {0}")]
    InvalidTaskMessage(String),

    /// Task id cannot be used to name a working directory.
    #[error("Invalid task id '{0}': must be a non-empty single path component")]
    InvalidTaskId(String),

    /// Task message carried no repository location.
    #[error("Task '{0}' has no repository location")]
    MissingRepository(String),

    /// Outcome code outside the known set.
    #[error("Unknown outcome code: {0}")]
    InvalidOutcome(u8),
}
