//! Runs a test suite as a child process and streams its output.

use std::process::Stdio;

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tracing::{debug, error, info, warn};

use crate::error::CollaboratorError;
use crate::ports::{RunnerEvent, RunnerOptions, RunnerStream, TestRunner};

/// Buffered events between the child's pipes and the pipeline.
const EVENT_BUFFER: usize = 64;

/// Runs `<program> <args...> <directory>` in the repository root.
///
/// Each line on stdout or stderr becomes one event. A non-zero exit adds a
/// final stderr event, so a crashed suite always fails the task.
#[derive(Debug, Clone)]
pub struct CommandTestRunner {
    program: String,
    args: Vec<String>,
}

impl CommandTestRunner {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    pub fn with_arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    fn command(&self, options: &RunnerOptions) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args)
            .arg(&options.directory)
            .current_dir(&options.cwd)
            .envs(&options.env);
        if options.colors {
            cmd.env("FORCE_COLOR", "1");
        }
        cmd
    }
}

impl Default for CommandTestRunner {
    fn default() -> Self {
        Self::new("npx").with_args(["mocha", "--recursive"])
    }
}

#[async_trait]
impl TestRunner for CommandTestRunner {
    async fn start(&self, options: RunnerOptions) -> Result<RunnerStream, CollaboratorError> {
        let mut cmd = self.command(&options);
        cmd.stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        info!(
            program = %self.program,
            cwd = %options.cwd.display(),
            directory = %options.directory,
            "Starting test runner"
        );

        let mut child = cmd.spawn().map_err(|source| CollaboratorError::Spawn {
            command: self.program.clone(),
            source,
        })?;
        let stdout = child
            .stdout
            .take()
            .ok_or(CollaboratorError::MissingPipe("stdout"))?;
        let stderr = child
            .stderr
            .take()
            .ok_or(CollaboratorError::MissingPipe("stderr"))?;

        let (tx, rx) = mpsc::channel(EVENT_BUFFER);
        let stdout_reader = tokio::spawn(forward_lines(stdout, tx.clone(), RunnerEvent::Stdout));
        let stderr_reader = tokio::spawn(forward_lines(stderr, tx.clone(), RunnerEvent::Stderr));

        // Owns the child; the stream ends when this task drops the last sender.
        tokio::spawn(async move {
            let _ = stdout_reader.await;
            let _ = stderr_reader.await;

            match child.wait().await {
                Ok(status) if status.success() => {
                    debug!("Test runner exited successfully");
                }
                Ok(status) => {
                    let code = status.code().unwrap_or(-1);
                    info!(exit_code = code, "Test runner exited with failure");
                    let _ = tx
                        .send(RunnerEvent::Stderr(format!(
                            "Test runner exited with code {}",
                            code
                        )))
                        .await;
                }
                Err(e) => {
                    error!(error = %e, "Failed to wait for test runner");
                    let _ = tx
                        .send(RunnerEvent::Stderr(format!("Test runner failed: {}", e)))
                        .await;
                }
            }
        });

        Ok(Box::pin(ReceiverStream::new(rx)))
    }
}

async fn forward_lines<R>(
    pipe: R,
    tx: mpsc::Sender<RunnerEvent>,
    wrap: fn(String) -> RunnerEvent,
) where
    R: AsyncRead + Unpin,
{
    let mut reader = BufReader::new(pipe);
    let mut buf = Vec::new();
    loop {
        buf.clear();
        match reader.read_until(b'\n', &mut buf).await {
            Ok(0) => break,
            Ok(_) => {
                // Test output is not guaranteed to be UTF-8
                let line = String::from_utf8_lossy(strip_line_ending(&buf)).into_owned();
                if tx.send(wrap(line)).await.is_err() {
                    warn!("Runner output receiver dropped");
                    break;
                }
            }
            Err(e) => {
                let _ = tx
                    .send(RunnerEvent::Stderr(format!("Failed to read runner output: {}", e)))
                    .await;
                break;
            }
        }
    }
}

fn strip_line_ending(line: &[u8]) -> &[u8] {
    let line = line.strip_suffix(b"\n").unwrap_or(line);
    line.strip_suffix(b"\r").unwrap_or(line)
}
