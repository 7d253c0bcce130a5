//! Captures test output while forwarding it live.

use testrun_core::{StatusMessage, TaskId};
use tokio_stream::StreamExt;
use tracing::{debug, trace, warn};

use crate::ports::{ResultChannel, RunnerEvent, RunnerStream, Telemetry};

/// Appended to every chunk, both in the captured text and on the wire.
pub const LINE_SEPARATOR: &str = "\n";

/// Everything a test run printed, in arrival order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CapturedOutput {
    chunks: Vec<String>,
    had_error: bool,
}

impl CapturedOutput {
    fn push(&mut self, event: &RunnerEvent) -> &str {
        if event.is_error() {
            self.had_error = true;
        }
        let mut chunk = String::with_capacity(event.text().len() + LINE_SEPARATOR.len());
        chunk.push_str(event.text());
        chunk.push_str(LINE_SEPARATOR);
        self.chunks.push(chunk);
        self.chunks.last().map(String::as_str).unwrap_or_default()
    }

    /// The whole output as one blob.
    pub fn text(&self) -> String {
        self.chunks.concat()
    }

    /// True if any chunk arrived on the error channel.
    pub fn had_error(&self) -> bool {
        self.had_error
    }

    pub fn chunk_count(&self) -> usize {
        self.chunks.len()
    }
}

/// Drains a runner stream, forwarding each chunk as a progress message.
pub struct OutputAggregator<'a> {
    task_id: &'a TaskId,
    channel: &'a dyn ResultChannel,
    telemetry: &'a dyn Telemetry,
    captured: CapturedOutput,
}

impl<'a> OutputAggregator<'a> {
    pub fn new(
        task_id: &'a TaskId,
        channel: &'a dyn ResultChannel,
        telemetry: &'a dyn Telemetry,
    ) -> Self {
        Self {
            task_id,
            channel,
            telemetry,
            captured: CapturedOutput::default(),
        }
    }

    /// Consume the stream until it ends and return what it produced.
    ///
    /// Each chunk is sent before the next one is read, so delivery order is
    /// arrival order and at most one chunk is in flight.
    pub async fn consume(mut self, mut events: RunnerStream) -> CapturedOutput {
        while let Some(event) = events.next().await {
            if event.is_error() {
                debug!(task_id = %self.task_id, "Forwarding error output");
            } else {
                trace!(task_id = %self.task_id, "Forwarding output");
            }

            let body = self.captured.push(&event).to_string();
            let message =
                StatusMessage::progress(self.task_id.clone(), body, self.telemetry.snapshot());
            if let Err(e) = self.channel.send(message).await {
                warn!(task_id = %self.task_id, error = %e, "Failed to forward output chunk");
            }
        }

        debug!(
            task_id = %self.task_id,
            chunks = self.captured.chunk_count(),
            had_error = self.captured.had_error(),
            "Test output stream completed"
        );
        self.captured
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{events, RecordingChannel, StaticTelemetry};

    #[tokio::test]
    async fn test_forwards_and_captures_in_arrival_order() {
        let task_id = TaskId::new("t1");
        let channel = RecordingChannel::new();
        let telemetry = StaticTelemetry;

        let stream = events(vec![
            RunnerEvent::Stdout("one".into()),
            RunnerEvent::Stderr("two".into()),
            RunnerEvent::Stdout("three".into()),
        ]);
        let captured = OutputAggregator::new(&task_id, &channel, &telemetry)
            .consume(stream)
            .await;

        assert_eq!(captured.text(), "one\ntwo\nthree\n");
        assert!(captured.had_error());

        let bodies: Vec<String> = channel.messages().into_iter().map(|m| m.body).collect();
        assert_eq!(bodies, vec!["one\n", "two\n", "three\n"]);
        assert!(channel.messages().iter().all(|m| !m.is_terminal()));
    }

    #[tokio::test]
    async fn test_clean_stream_has_no_error_flag() {
        let task_id = TaskId::new("t1");
        let channel = RecordingChannel::new();

        let captured = OutputAggregator::new(&task_id, &channel, &StaticTelemetry)
            .consume(events(vec![RunnerEvent::Stdout("ok".into())]))
            .await;

        assert!(!captured.had_error());
        assert_eq!(captured.chunk_count(), 1);
        assert_eq!(channel.messages()[0].sys_info["host"], "test-host");
    }

    #[tokio::test]
    async fn test_empty_stream() {
        let task_id = TaskId::new("t1");
        let channel = RecordingChannel::new();

        let captured = OutputAggregator::new(&task_id, &channel, &StaticTelemetry)
            .consume(events(Vec::new()))
            .await;

        assert_eq!(captured.text(), "");
        assert!(channel.messages().is_empty());
    }
}
