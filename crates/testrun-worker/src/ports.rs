//! Interfaces to the collaborators the pipeline drives.
//!
//! The executor only knows these traits. Subprocess-backed implementations
//! live in [`crate::collaborators`]; tests substitute in-memory fakes.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::pin::Pin;

use async_trait::async_trait;
use serde_json::Value;
use testrun_core::{SourceRef, StatusMessage, Verdict};
use tokio_stream::Stream;

use crate::error::{ChannelError, CollaboratorError};

/// Retrieves the source under test.
#[async_trait]
pub trait SourceFetcher: Send + Sync {
    /// Materialize `source` into the (existing, empty) directory `dir`.
    async fn fetch(&self, source: &SourceRef, dir: &Path) -> Result<(), CollaboratorError>;

    /// Describe the revision checked out in `dir`, for the final report.
    async fn latest_revision(&self, dir: &Path) -> Result<String, CollaboratorError>;
}

/// Installs the dependencies of a fetched project.
#[async_trait]
pub trait DependencyInstaller: Send + Sync {
    async fn install(&self, dir: &Path, registry: Option<&str>) -> Result<(), CollaboratorError>;
}

/// One chunk of test-runner output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunnerEvent {
    Stdout(String),
    Stderr(String),
}

impl RunnerEvent {
    pub fn text(&self) -> &str {
        match self {
            Self::Stdout(text) | Self::Stderr(text) => text,
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Self::Stderr(_))
    }
}

/// Live runner output. The end of the stream is the completion signal.
pub type RunnerStream = Pin<Box<dyn Stream<Item = RunnerEvent> + Send>>;

/// How to run a project's test suite.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunnerOptions {
    pub cwd: PathBuf,
    /// Test directory, relative to `cwd`.
    pub directory: String,
    pub env: BTreeMap<String, String>,
    pub colors: bool,
}

/// Starts a project's test suite.
#[async_trait]
pub trait TestRunner: Send + Sync {
    /// Start the suite. Errors here mean the suite never started; failures
    /// while it runs arrive as [`RunnerEvent::Stderr`].
    async fn start(&self, options: RunnerOptions) -> Result<RunnerStream, CollaboratorError>;
}

/// Classifies captured test output.
pub trait OutcomeAnalyzer: Send + Sync {
    fn analyze(&self, output: &str) -> Verdict;
}

/// Delivers status messages to the dispatcher.
///
/// Messages handed to one channel must be delivered in the order `send` was
/// called. `send` returns once the message is queued; it never waits for
/// the dispatcher to acknowledge it.
#[async_trait]
pub trait ResultChannel: Send + Sync {
    async fn send(&self, message: StatusMessage) -> Result<(), ChannelError>;
}

/// Host telemetry attached to every status message.
pub trait Telemetry: Send + Sync {
    /// Take a fresh snapshot. Called once per message.
    fn snapshot(&self) -> Value;
}
