//! Task ingress types.
//!
//! The dispatcher packs a task's parameters into one string,
//! `"<repo>#<branch>#<KEY=VALUE,KEY=VALUE,...>"`. It is parsed exactly once,
//! here, into a [`TaskDescriptor`]. The packed format has no escaping, so a
//! repository location, branch or variable value containing `#` (or a value
//! containing `,`) cannot be represented faithfully.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::{CoreError, TaskId};

const SEGMENT_DELIMITER: char = '#';
const ENV_DELIMITER: char = ',';

/// A task as it arrives from the dispatcher.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskMessage {
    pub task_id: TaskId,
    pub body: String,
}

impl TaskMessage {
    /// Decode a task message from its JSON wire form.
    pub fn from_json(line: &str) -> Result<Self, CoreError> {
        serde_json::from_str(line).map_err(|e| CoreError::InvalidTaskMessage(e.to_string()))
    }
}

/// Where to fetch the source under test.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceRef {
    /// Repository location, passed verbatim to the fetcher.
    pub repo: String,

    /// Branch to check out; `None` means the repository default.
    pub branch: Option<String>,
}

/// Identity and parameters of one unit of work. Immutable once parsed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskDescriptor {
    pub task_id: TaskId,
    pub source: SourceRef,
    pub env: BTreeMap<String, String>,
}

impl TaskDescriptor {
    /// Parse the packed task body.
    ///
    /// Missing segments are tolerated: `"repo"` has no branch and no
    /// environment overrides. Parsing never fails; use
    /// [`TaskDescriptor::validate`] before acting on the result.
    pub fn parse(task_id: TaskId, body: &str) -> Self {
        let mut segments = body.trim().split(SEGMENT_DELIMITER);

        let repo = segments.next().unwrap_or_default().to_string();
        let branch = segments
            .next()
            .filter(|b| !b.is_empty())
            .map(str::to_string);
        let env = segments.next().map(parse_env_overrides).unwrap_or_default();

        Self {
            task_id,
            source: SourceRef { repo, branch },
            env,
        }
    }

    /// Check that the descriptor can be executed.
    pub fn validate(&self) -> Result<(), CoreError> {
        if !self.task_id.is_path_safe() {
            return Err(CoreError::InvalidTaskId(self.task_id.to_string()));
        }
        if self.source.repo.is_empty() {
            return Err(CoreError::MissingRepository(self.task_id.to_string()));
        }
        Ok(())
    }
}

impl From<TaskMessage> for TaskDescriptor {
    fn from(msg: TaskMessage) -> Self {
        Self::parse(msg.task_id, &msg.body)
    }
}

/// Parse `KEY=VALUE,KEY=VALUE` pairs.
///
/// Entries without `=` or with an empty key are dropped. Everything after
/// the first `=` is the value, so `A=b=c` maps `A` to `b=c`.
pub fn parse_env_overrides(raw: &str) -> BTreeMap<String, String> {
    raw.split(ENV_DELIMITER)
        .filter_map(|entry| {
            let (key, value) = entry.split_once('=')?;
            if key.is_empty() {
                return None;
            }
            Some((key.to_string(), value.to_string()))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_full_body() {
        let task = TaskDescriptor::parse(TaskId::new("t1"), "repoA#branchB#K1=V1,K2=V2");

        assert_eq!(task.source.repo, "repoA");
        assert_eq!(task.source.branch.as_deref(), Some("branchB"));
        assert_eq!(task.env.len(), 2);
        assert_eq!(task.env["K1"], "V1");
        assert_eq!(task.env["K2"], "V2");
    }

    #[test]
    fn test_parse_repo_only() {
        let task = TaskDescriptor::parse(TaskId::new("t1"), "repoA");

        assert_eq!(task.source.repo, "repoA");
        assert_eq!(task.source.branch, None);
        assert!(task.env.is_empty());
    }

    #[test]
    fn test_parse_trims_and_treats_empty_branch_as_default() {
        let task = TaskDescriptor::parse(
            TaskId::new("t1"),
            "  https://example.com/app.git##CI=1\n",
        );

        assert_eq!(task.source.repo, "https://example.com/app.git");
        assert_eq!(task.source.branch, None);
        assert_eq!(task.env["CI"], "1");
    }

    #[test]
    fn test_malformed_env_entries_are_dropped() {
        let env = parse_env_overrides("GOOD=1,bare,=nokey,,URL=a=b");

        assert_eq!(env.len(), 2);
        assert_eq!(env["GOOD"], "1");
        assert_eq!(env["URL"], "a=b");
    }

    #[test]
    fn test_validate() {
        let ok = TaskDescriptor::parse(TaskId::new("t1"), "repoA");
        assert!(ok.validate().is_ok());

        let no_repo = TaskDescriptor::parse(TaskId::new("t1"), "#main");
        assert!(matches!(
            no_repo.validate(),
            Err(CoreError::MissingRepository(_))
        ));

        let bad_id = TaskDescriptor::parse(TaskId::new("../x"), "repoA");
        assert!(matches!(bad_id.validate(), Err(CoreError::InvalidTaskId(_))));
    }

    #[test]
    fn test_task_message_from_json() {
        let msg = TaskMessage::from_json(r#"{"taskId":"abc","body":"repoA#dev"}"#).unwrap();
        assert_eq!(msg.task_id.as_str(), "abc");

        let task = TaskDescriptor::from(msg);
        assert_eq!(task.source.branch.as_deref(), Some("dev"));

        assert!(TaskMessage::from_json("not json").is_err());
    }
}
