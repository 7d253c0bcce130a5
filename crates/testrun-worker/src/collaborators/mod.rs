//! Subprocess-backed collaborators.
//!
//! Every child is spawned with `kill_on_drop`, so when a stage loses its
//! race against the deadline the abandoned process is killed rather than
//! left running.

mod analyzer;
mod git;
mod npm;
mod runner;

pub use analyzer::SummaryAnalyzer;
pub use git::GitFetcher;
pub use npm::NpmInstaller;
pub use runner::CommandTestRunner;

use std::process::Stdio;

use tokio::process::Command;
use tracing::debug;

use crate::error::CollaboratorError;

/// Run a command to completion and return its stdout.
async fn run_checked(mut cmd: Command, label: &str) -> Result<String, CollaboratorError> {
    cmd.stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    debug!(command = label, "Running command");

    let output = cmd.output().await.map_err(|source| CollaboratorError::Spawn {
        command: label.to_string(),
        source,
    })?;

    if !output.status.success() {
        return Err(CollaboratorError::CommandFailed {
            command: label.to_string(),
            code: output.status.code().unwrap_or(-1),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        });
    }

    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}
