//! Task execution pipeline.
//!
//! A task moves through fetch, provision and execute, then reports. Fetch
//! and provision each race a deadline. Anything that goes wrong before the
//! test stream starts is a [`PipelineError`] and takes the failure path;
//! once the stream is running, failures are just stderr events and the
//! pipeline always reaches stream completion.
//!
//! Either way the task ends with exactly one terminal message, and the
//! availability lease is released before it is sent.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use testrun_core::{
    failure_extra, Outcome, PipelineStage, StatusMessage, TaskDescriptor, TaskId,
};
use tracing::{debug, error, info, warn};

use crate::aggregator::OutputAggregator;
use crate::availability::AvailabilityLease;
use crate::config::WorkerConfig;
use crate::error::PipelineError;
use crate::guard::race;
use crate::ports::{
    DependencyInstaller, OutcomeAnalyzer, ResultChannel, RunnerOptions, RunnerStream,
    SourceFetcher, Telemetry, TestRunner,
};
use crate::repo_config::RepoConfig;

/// The collaborators a [`TaskExecutor`] drives.
#[derive(Clone)]
pub struct Collaborators {
    pub fetcher: Arc<dyn SourceFetcher>,
    pub installer: Arc<dyn DependencyInstaller>,
    pub runner: Arc<dyn TestRunner>,
    pub analyzer: Arc<dyn OutcomeAnalyzer>,
    pub channel: Arc<dyn ResultChannel>,
    pub telemetry: Arc<dyn Telemetry>,
}

/// Per-task bookkeeping: current stage and what is known for the report.
struct TaskRun {
    task_id: TaskId,
    stage: PipelineStage,
    /// Latest revision of the fetched source; empty until fetch succeeds.
    description: String,
}

impl TaskRun {
    fn new(task_id: TaskId) -> Self {
        Self {
            task_id,
            stage: PipelineStage::Fetching,
            description: String::new(),
        }
    }

    fn advance(&mut self, next: PipelineStage) {
        debug_assert!(
            self.stage.can_advance_to(next),
            "illegal stage transition {:?} -> {:?}",
            self.stage,
            next
        );
        debug!(task_id = %self.task_id, from = ?self.stage, to = ?next, "Stage transition");
        self.stage = next;
    }
}

/// Runs one task at a time through the pipeline.
pub struct TaskExecutor {
    config: Arc<WorkerConfig>,
    collaborators: Collaborators,
}

impl TaskExecutor {
    pub fn new(config: Arc<WorkerConfig>, collaborators: Collaborators) -> Self {
        Self {
            config,
            collaborators,
        }
    }

    pub fn config(&self) -> &WorkerConfig {
        &self.config
    }

    /// Run `task` to completion and return its outcome.
    ///
    /// The caller acquires `lease` before calling; it is released on every
    /// path before the terminal message goes out.
    pub async fn execute(&self, task: TaskDescriptor, mut lease: AvailabilityLease) -> Outcome {
        info!(
            task_id = %task.task_id,
            repo = %task.source.repo,
            branch = ?task.source.branch,
            "Starting task"
        );

        let mut run = TaskRun::new(task.task_id.clone());
        match self.prepare(&task, &mut run).await {
            Ok(events) => self.stream_and_report(&mut run, events, &mut lease).await,
            Err(e) => self.report_failure(&mut run, e, &mut lease).await,
        }
    }

    /// Everything up to and including starting the test runner.
    async fn prepare(
        &self,
        task: &TaskDescriptor,
        run: &mut TaskRun,
    ) -> Result<RunnerStream, PipelineError> {
        task.validate()?;
        let dir = self.prepare_workdir(&task.task_id).await?;

        // Fetch
        let fetcher = &self.collaborators.fetcher;
        let fetch = async {
            fetcher.fetch(&task.source, &dir).await?;
            fetcher.latest_revision(&dir).await
        };
        let timeout = self.config.fetch_timeout;
        let message = format!("Source fetch timed out after {:?}", timeout);
        run.description = race(fetch, timeout, message)
            .await
            .map_err(PipelineError::FetchTimeout)?
            .map_err(PipelineError::Fetch)?;
        info!(task_id = %task.task_id, revision = %run.description, "Source fetched");

        let repo_config = self.load_repo_config(&task.task_id, &dir).await;

        // Provision
        run.advance(PipelineStage::Provisioning);
        let timeout = self.config.install_timeout;
        let install = self
            .collaborators
            .installer
            .install(&dir, self.config.registry.as_deref());
        let message = format!("Dependency install timed out after {:?}", timeout);
        race(install, timeout, message)
            .await
            .map_err(PipelineError::ProvisionTimeout)?
            .map_err(PipelineError::Provision)?;
        info!(task_id = %task.task_id, "Dependencies installed");

        self.send(StatusMessage::progress(
            task.task_id.clone(),
            String::new(),
            self.collaborators.telemetry.snapshot(),
        ))
        .await;

        // Execute
        run.advance(PipelineStage::Executing);
        let options = RunnerOptions {
            cwd: dir,
            directory: repo_config
                .directory
                .clone()
                .unwrap_or_else(|| self.config.test_directory.clone()),
            env: repo_config.resolve_env(&task.env),
            colors: self.config.colors,
        };
        self.collaborators
            .runner
            .start(options)
            .await
            .map_err(PipelineError::RunnerStart)
    }

    /// Create a fresh working area for the task, removing any stale one.
    async fn prepare_workdir(&self, task_id: &TaskId) -> Result<PathBuf, PipelineError> {
        let dir = self.config.work_root.join(task_id.as_str());

        match tokio::fs::remove_dir_all(&dir).await {
            Ok(()) => {
                debug!(task_id = %task_id, dir = %dir.display(), "Removed stale working directory")
            }
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(source) => return Err(PipelineError::Setup { path: dir, source }),
        }

        if let Err(source) = tokio::fs::create_dir_all(&dir).await {
            return Err(PipelineError::Setup { path: dir, source });
        }
        Ok(dir)
    }

    async fn load_repo_config(&self, task_id: &TaskId, dir: &Path) -> RepoConfig {
        match RepoConfig::load(dir).await {
            Ok(Some(config)) => {
                debug!(task_id = %task_id, "Loaded repository config");
                config
            }
            Ok(None) => {
                debug!(task_id = %task_id, "No repository config, using defaults");
                RepoConfig::default()
            }
            Err(e) => {
                warn!(task_id = %task_id, error = %e, "Ignoring unreadable repository config");
                RepoConfig::default()
            }
        }
    }

    async fn stream_and_report(
        &self,
        run: &mut TaskRun,
        events: RunnerStream,
        lease: &mut AvailabilityLease,
    ) -> Outcome {
        let captured = OutputAggregator::new(
            &run.task_id,
            self.collaborators.channel.as_ref(),
            self.collaborators.telemetry.as_ref(),
        )
        .consume(events)
        .await;

        lease.release();
        run.advance(PipelineStage::Reporting);

        let verdict = self.collaborators.analyzer.analyze(&captured.text());
        let outcome = if captured.had_error() {
            Outcome::Failed
        } else {
            verdict.status
        };

        info!(
            task_id = %run.task_id,
            outcome = ?outcome,
            analyzer_status = ?verdict.status,
            had_error = captured.had_error(),
            "Task finished"
        );

        let extra = verdict.into_report_extra(&run.description);
        self.send(StatusMessage::terminal(
            run.task_id.clone(),
            outcome,
            extra,
            self.collaborators.telemetry.snapshot(),
        ))
        .await;

        outcome
    }

    async fn report_failure(
        &self,
        run: &mut TaskRun,
        err: PipelineError,
        lease: &mut AvailabilityLease,
    ) -> Outcome {
        warn!(task_id = %run.task_id, stage = ?run.stage, error = %err, "Task failed");

        lease.release();
        run.advance(PipelineStage::Reporting);

        self.send(StatusMessage::progress(
            run.task_id.clone(),
            err.to_string().trim(),
            self.collaborators.telemetry.snapshot(),
        ))
        .await;

        let delay = self.config.failure_report_delay;
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        self.send_failed_terminal(&run.task_id, &run.description).await;
        Outcome::Failed
    }

    /// Tell the dispatcher a task was not admitted because the worker is busy.
    ///
    /// No terminal message follows: the task never started here.
    pub async fn report_rejected(&self, task_id: &TaskId) {
        self.send(StatusMessage::progress(
            task_id.clone(),
            format!("Worker busy, task {} rejected", task_id),
            self.collaborators.telemetry.snapshot(),
        ))
        .await;
    }

    /// Close out a task whose execution crashed without reporting.
    ///
    /// Mirrors the failure path: the reason as a progress message, then the
    /// failed terminal message. The revision died with the task.
    pub async fn report_crash(&self, task_id: &TaskId, reason: &str) {
        error!(task_id = %task_id, reason, "Task crashed, sending failed result");
        self.send(StatusMessage::progress(
            task_id.clone(),
            format!("Task crashed: {}", reason),
            self.collaborators.telemetry.snapshot(),
        ))
        .await;
        self.send_failed_terminal(task_id, "").await;
    }

    async fn send_failed_terminal(&self, task_id: &TaskId, description: &str) {
        self.send(StatusMessage::terminal(
            task_id.clone(),
            Outcome::Failed,
            failure_extra(description),
            self.collaborators.telemetry.snapshot(),
        ))
        .await;
    }

    async fn send(&self, message: StatusMessage) {
        let terminal = message.is_terminal();
        let task_id = message.task_id.clone();
        if let Err(e) = self.collaborators.channel.send(message).await {
            warn!(task_id = %task_id, terminal, error = %e, "Failed to send status message");
        }
    }
}
