//! Source retrieval with the `git` CLI.

use std::path::Path;

use async_trait::async_trait;
use testrun_core::SourceRef;
use tokio::process::Command;
use tracing::info;

use super::run_checked;
use crate::error::CollaboratorError;
use crate::ports::SourceFetcher;

/// `git log` format for the revision summary: hash, author, subject.
const REVISION_FORMAT: &str = "--pretty=format:%H %an: %s";

/// Clones repositories with the `git` CLI.
#[derive(Debug, Clone)]
pub struct GitFetcher {
    git_path: String,
}

impl GitFetcher {
    pub fn new(git_path: impl Into<String>) -> Self {
        Self {
            git_path: git_path.into(),
        }
    }

    fn clone_command(&self, source: &SourceRef, dir: &Path) -> Command {
        let mut cmd = Command::new(&self.git_path);
        cmd.arg("clone").arg("--depth").arg("1");
        if let Some(branch) = &source.branch {
            cmd.arg("--branch").arg(branch);
        }
        cmd.arg("--").arg(&source.repo).arg(dir);
        cmd
    }
}

impl Default for GitFetcher {
    fn default() -> Self {
        Self::new("git")
    }
}

#[async_trait]
impl SourceFetcher for GitFetcher {
    async fn fetch(&self, source: &SourceRef, dir: &Path) -> Result<(), CollaboratorError> {
        info!(repo = %source.repo, branch = ?source.branch, "Cloning repository");
        run_checked(self.clone_command(source, dir), "git clone").await?;
        Ok(())
    }

    async fn latest_revision(&self, dir: &Path) -> Result<String, CollaboratorError> {
        let mut cmd = Command::new(&self.git_path);
        cmd.arg("-C").arg(dir).arg("log").arg("-1").arg(REVISION_FORMAT);
        let out = run_checked(cmd, "git log").await?;
        Ok(out.trim().to_string())
    }
}
