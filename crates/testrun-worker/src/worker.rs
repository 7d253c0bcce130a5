//! Task admission.
//!
//! The worker owns the process-wide [`WorkerState`]. A task is admitted only
//! if the worker is available; the lease acquired on admission travels with
//! the task into the executor.

use std::sync::Arc;

use testrun_core::{Outcome, TaskDescriptor, TaskMessage, WorkerAvailability};
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::availability::WorkerState;
use crate::executor::TaskExecutor;

/// Admits tasks one at a time and runs them on the executor.
pub struct Worker {
    state: Arc<WorkerState>,
    executor: Arc<TaskExecutor>,
}

impl Worker {
    pub fn new(executor: TaskExecutor) -> Self {
        Self::with_state(executor, WorkerState::new())
    }

    pub fn with_state(executor: TaskExecutor, state: Arc<WorkerState>) -> Self {
        Self {
            state,
            executor: Arc::new(executor),
        }
    }

    pub fn availability(&self) -> WorkerAvailability {
        self.state.availability()
    }

    /// Start `msg` in the background if the worker is available.
    ///
    /// Returns `None` (after telling the dispatcher) when a task is already
    /// in flight. The handle resolves to the outcome, or `None` if the task
    /// panicked; a panicked task still gets its failed terminal message.
    pub async fn admit(&self, msg: TaskMessage) -> Option<JoinHandle<Option<Outcome>>> {
        let task = TaskDescriptor::from(msg);

        let Some(lease) = self.state.try_acquire() else {
            warn!(task_id = %task.task_id, "Worker busy, rejecting task");
            self.executor.report_rejected(&task.task_id).await;
            return None;
        };

        info!(task_id = %task.task_id, "Task admitted");
        let executor = self.executor.clone();
        Some(tokio::spawn(async move {
            let task_id = task.task_id.clone();
            let run = tokio::spawn({
                let executor = executor.clone();
                async move { executor.execute(task, lease).await }
            });

            match run.await {
                Ok(outcome) => Some(outcome),
                Err(e) => {
                    error!(task_id = %task_id, error = %e, "Task execution aborted");
                    executor.report_crash(&task_id, &e.to_string()).await;
                    None
                }
            }
        }))
    }

    /// Read task messages, one JSON object per line, until `input` ends.
    ///
    /// Malformed lines are logged and skipped. Returns after every admitted
    /// task has finished.
    pub async fn serve<R>(&self, input: R) -> std::io::Result<()>
    where
        R: AsyncBufRead + Unpin,
    {
        let mut lines = input.lines();
        let mut in_flight: Vec<JoinHandle<Option<Outcome>>> = Vec::new();

        while let Some(line) = lines.next_line().await? {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }

            match TaskMessage::from_json(line) {
                Ok(msg) => {
                    info!(task_id = %msg.task_id, "Received task");
                    if let Some(handle) = self.admit(msg).await {
                        in_flight.push(handle);
                    }
                }
                Err(e) => warn!(error = %e, "Ignoring malformed task message"),
            }

            in_flight.retain(|handle| !handle.is_finished());
        }

        info!(pending = in_flight.len(), "Input closed, waiting for running tasks");
        for handle in in_flight {
            let _ = handle.await;
        }
        Ok(())
    }
}
