//! In-memory collaborators for unit tests.

use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};
use testrun_core::{Outcome, SourceRef, StatusMessage, Verdict, WorkerAvailability};

use crate::availability::WorkerState;
use crate::error::{ChannelError, CollaboratorError};
use crate::ports::{
    DependencyInstaller, OutcomeAnalyzer, ResultChannel, RunnerEvent, RunnerOptions,
    RunnerStream, SourceFetcher, Telemetry, TestRunner,
};

pub fn events(items: Vec<RunnerEvent>) -> RunnerStream {
    Box::pin(tokio_stream::iter(items))
}

/// Records every message, plus the worker availability at send time.
#[derive(Default)]
pub struct RecordingChannel {
    sent: Mutex<Vec<(StatusMessage, WorkerAvailability)>>,
    state: Option<Arc<WorkerState>>,
}

impl RecordingChannel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn observing(state: Arc<WorkerState>) -> Self {
        Self {
            sent: Mutex::new(Vec::new()),
            state: Some(state),
        }
    }

    pub fn messages(&self) -> Vec<StatusMessage> {
        self.sent.lock().unwrap().iter().map(|(m, _)| m.clone()).collect()
    }

    pub fn availability_at_send(&self) -> Vec<WorkerAvailability> {
        self.sent.lock().unwrap().iter().map(|(_, a)| *a).collect()
    }

    pub fn terminal_count(&self) -> usize {
        self.messages().iter().filter(|m| m.is_terminal()).count()
    }
}

#[async_trait]
impl ResultChannel for RecordingChannel {
    async fn send(&self, message: StatusMessage) -> Result<(), ChannelError> {
        let availability = self
            .state
            .as_ref()
            .map(|s| s.availability())
            .unwrap_or_default();
        self.sent.lock().unwrap().push((message, availability));
        Ok(())
    }
}

pub struct StaticTelemetry;

impl Telemetry for StaticTelemetry {
    fn snapshot(&self) -> Value {
        json!({ "host": "test-host" })
    }
}

/// Fetcher that optionally stalls or fails.
pub struct FakeFetcher {
    pub delay: Duration,
    pub fail_with: Option<String>,
    pub revision: String,
    /// Files written into the working directory on a successful fetch.
    pub files: Vec<(&'static str, &'static str)>,
}

impl Default for FakeFetcher {
    fn default() -> Self {
        Self {
            delay: Duration::ZERO,
            fail_with: None,
            revision: "abc123 add login tests".to_string(),
            files: vec![("package.json", "{}")],
        }
    }
}

#[async_trait]
impl SourceFetcher for FakeFetcher {
    async fn fetch(&self, _source: &SourceRef, dir: &Path) -> Result<(), CollaboratorError> {
        tokio::time::sleep(self.delay).await;
        if let Some(msg) = &self.fail_with {
            return Err(CollaboratorError::Other(msg.clone()));
        }
        for (name, contents) in &self.files {
            std::fs::write(dir.join(name), contents)
                .map_err(|e| CollaboratorError::Other(e.to_string()))?;
        }
        Ok(())
    }

    async fn latest_revision(&self, _dir: &Path) -> Result<String, CollaboratorError> {
        Ok(self.revision.clone())
    }
}

#[derive(Default)]
pub struct FakeInstaller {
    pub delay: Duration,
    pub fail_with: Option<String>,
    pub calls: Mutex<Vec<Option<String>>>,
}

#[async_trait]
impl DependencyInstaller for FakeInstaller {
    async fn install(&self, _dir: &Path, registry: Option<&str>) -> Result<(), CollaboratorError> {
        self.calls.lock().unwrap().push(registry.map(str::to_string));
        tokio::time::sleep(self.delay).await;
        match &self.fail_with {
            Some(msg) => Err(CollaboratorError::Other(msg.clone())),
            None => Ok(()),
        }
    }
}

/// Runner that replays a fixed script of events.
#[derive(Default)]
pub struct ScriptedRunner {
    pub script: Vec<RunnerEvent>,
    pub fail_to_start: bool,
    pub seen: Mutex<Vec<RunnerOptions>>,
}

impl ScriptedRunner {
    pub fn new(script: Vec<RunnerEvent>) -> Self {
        Self {
            script,
            ..Self::default()
        }
    }
}

#[async_trait]
impl TestRunner for ScriptedRunner {
    async fn start(&self, options: RunnerOptions) -> Result<RunnerStream, CollaboratorError> {
        self.seen.lock().unwrap().push(options);
        if self.fail_to_start {
            return Err(CollaboratorError::Other("runner binary missing".into()));
        }
        Ok(events(self.script.clone()))
    }
}

/// Analyzer that always returns the same verdict and remembers its input.
pub struct FixedAnalyzer {
    pub status: Outcome,
    pub inputs: Mutex<Vec<String>>,
}

impl FixedAnalyzer {
    pub fn new(status: Outcome) -> Self {
        Self {
            status,
            inputs: Mutex::new(Vec::new()),
        }
    }
}

impl OutcomeAnalyzer for FixedAnalyzer {
    fn analyze(&self, output: &str) -> Verdict {
        self.inputs.lock().unwrap().push(output.to_string());
        Verdict::new(self.status).with_metadata("passing", 2)
    }
}
