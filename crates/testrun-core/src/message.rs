//! Status messages sent from the worker back to the dispatcher.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::{Outcome, TaskId, WorkerAvailability};

/// Body of the terminal message, marking that no further output follows.
pub const END_OF_STREAM: &str = "false";

/// The unit pushed over the result channel.
///
/// A task produces any number of `Busy` progress messages followed by
/// exactly one `Available` terminal message carrying the outcome.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusMessage {
    pub task_id: TaskId,

    pub worker_state: WorkerAvailability,

    /// Present on the terminal message only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub outcome: Option<Outcome>,

    /// A chunk of live output, or [`END_OF_STREAM`] on the terminal message.
    pub body: String,

    /// Analyzer metadata merged with the source description; terminal only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extra: Option<Map<String, Value>>,

    /// Host telemetry captured when the message was built.
    #[serde(default)]
    pub sys_info: Value,
}

impl StatusMessage {
    /// Build a progress message carrying one chunk of output.
    pub fn progress(task_id: TaskId, body: impl Into<String>, sys_info: Value) -> Self {
        Self {
            task_id,
            worker_state: WorkerAvailability::Busy,
            outcome: None,
            body: body.into(),
            extra: None,
            sys_info,
        }
    }

    /// Build the terminal message for a task.
    pub fn terminal(
        task_id: TaskId,
        outcome: Outcome,
        extra: Map<String, Value>,
        sys_info: Value,
    ) -> Self {
        Self {
            task_id,
            worker_state: WorkerAvailability::Available,
            outcome: Some(outcome),
            body: END_OF_STREAM.to_string(),
            extra: Some(extra),
            sys_info,
        }
    }

    /// Returns true if this is the task's final message.
    pub fn is_terminal(&self) -> bool {
        self.worker_state == WorkerAvailability::Available
    }

    /// Encode as a single JSON line.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

/// Structured result of analysing a task's captured output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Verdict {
    pub status: Outcome,

    /// Analyzer-specific details (test counts and the like).
    #[serde(default)]
    pub metadata: Map<String, Value>,
}

impl Verdict {
    pub fn new(status: Outcome) -> Self {
        Self {
            status,
            metadata: Map::new(),
        }
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// Merge the verdict with the source description into a report `extra`.
    ///
    /// The analyzer's metadata is copied verbatim, then `status` and
    /// `description` are set on top of it.
    pub fn into_report_extra(self, description: &str) -> Map<String, Value> {
        let mut extra = self.metadata;
        extra.insert("status".to_string(), Value::from(self.status.code()));
        extra.insert("description".to_string(), Value::from(description));
        extra
    }
}

/// `extra` for a task that failed before producing a verdict.
pub fn failure_extra(description: &str) -> Map<String, Value> {
    let mut extra = Map::new();
    extra.insert("description".to_string(), Value::from(description));
    extra
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_progress_message_wire_shape() {
        let msg = StatusMessage::progress(TaskId::new("t1"), "ok 1\n", json!({"host": "h"}));
        let value: Value = serde_json::from_str(&msg.to_json().unwrap()).unwrap();

        assert_eq!(value["taskId"], "t1");
        assert_eq!(value["workerState"], "busy");
        assert_eq!(value["body"], "ok 1\n");
        assert_eq!(value["sysInfo"]["host"], "h");
        assert!(value.get("outcome").is_none());
        assert!(value.get("extra").is_none());
        assert!(!msg.is_terminal());
    }

    #[test]
    fn test_terminal_message_wire_shape() {
        let extra = Verdict::new(Outcome::Success)
            .with_metadata("passing", 4)
            .into_report_extra("abc123 fix tests");
        let msg = StatusMessage::terminal(TaskId::new("t1"), Outcome::Failed, extra, Value::Null);
        let value: Value = serde_json::from_str(&msg.to_json().unwrap()).unwrap();

        assert_eq!(value["workerState"], "available");
        assert_eq!(value["outcome"], 3);
        assert_eq!(value["body"], END_OF_STREAM);
        assert_eq!(value["extra"]["passing"], 4);
        assert_eq!(value["extra"]["status"], 2);
        assert_eq!(value["extra"]["description"], "abc123 fix tests");
        assert!(msg.is_terminal());
    }

    #[test]
    fn test_failure_extra_only_carries_description() {
        let extra = failure_extra("");
        assert_eq!(extra.len(), 1);
        assert_eq!(extra["description"], "");
    }
}
