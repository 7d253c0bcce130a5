//! Worker error types.

use std::path::PathBuf;

use testrun_core::CoreError;
use thiserror::Error;

use crate::guard::StageTimeout;

/// Errors reported by an external collaborator (fetcher, installer, runner).
#[derive(Debug, Error)]
pub enum CollaboratorError {
    #[error("Failed to spawn '{command}': {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("'{command}' exited with code {code}: {stderr}")]
    CommandFailed {
        command: String,
        code: i32,
        stderr: String,
    },

    #[error("Failed to capture {0} of child process")]
    MissingPipe(&'static str),

    #[error("{0}")]
    Other(String),
}

/// Errors that abort a task before its test stream starts.
///
/// Every variant is reported through the failure path: one progress
/// message carrying the error text, then a failed terminal message.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    InvalidTask(#[from] CoreError),

    #[error("Failed to prepare working directory '{}': {source}", path.display())]
    Setup {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{0}")]
    FetchTimeout(StageTimeout),

    #[error("Source fetch failed: {0}")]
    Fetch(CollaboratorError),

    #[error("{0}")]
    ProvisionTimeout(StageTimeout),

    #[error("Dependency install failed: {0}")]
    Provision(CollaboratorError),

    #[error("Failed to start test runner: {0}")]
    RunnerStart(CollaboratorError),
}

/// Errors delivering a message to the dispatcher.
#[derive(Debug, Error)]
pub enum ChannelError {
    #[error("Result channel closed")]
    Closed,

    #[error("Failed to encode status message: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("Failed to write status message: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors loading the optional per-repository config file.
#[derive(Debug, Error)]
pub enum RepoConfigError {
    #[error("Failed to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },
}
