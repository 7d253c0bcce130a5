//! Status enums for workers, pipeline stages and task outcomes.

use serde::{Deserialize, Serialize};

use crate::CoreError;

/// Whether the worker may accept a new task.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WorkerAvailability {
    /// Worker is idle and ready to accept a task.
    #[default]
    Available,
    /// A task is in flight.
    Busy,
}

impl WorkerAvailability {
    /// Returns true if the worker can accept a new task.
    pub fn can_accept_tasks(&self) -> bool {
        matches!(self, Self::Available)
    }
}

/// Final pass/fail classification of a task.
///
/// On the wire this is an integer code: `2` for success, `3` for failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "u8", try_from = "u8")]
pub enum Outcome {
    Success,
    Failed,
}

impl Outcome {
    /// Wire code for this outcome.
    pub fn code(&self) -> u8 {
        match self {
            Self::Success => 2,
            Self::Failed => 3,
        }
    }
}

impl From<Outcome> for u8 {
    fn from(outcome: Outcome) -> Self {
        outcome.code()
    }
}

impl TryFrom<u8> for Outcome {
    type Error = CoreError;

    fn try_from(code: u8) -> Result<Self, Self::Error> {
        match code {
            2 => Ok(Self::Success),
            3 => Ok(Self::Failed),
            other => Err(CoreError::InvalidOutcome(other)),
        }
    }
}

/// Phase of the task pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineStage {
    Fetching,
    Provisioning,
    Executing,
    Reporting,
}

impl PipelineStage {
    /// Returns true if a task in `self` may move to `next`.
    ///
    /// Stages only move forward one step at a time, except that any stage
    /// may jump straight to `Reporting` when it fails.
    pub fn can_advance_to(&self, next: PipelineStage) -> bool {
        match (self, next) {
            (Self::Reporting, _) => false,
            (_, Self::Reporting) => true,
            (Self::Fetching, Self::Provisioning) => true,
            (Self::Provisioning, Self::Executing) => true,
            _ => false,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Reporting)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_outcome_wire_codes() {
        assert_eq!(serde_json::to_string(&Outcome::Success).unwrap(), "2");
        assert_eq!(serde_json::to_string(&Outcome::Failed).unwrap(), "3");
        let parsed: Outcome = serde_json::from_str("3").unwrap();
        assert_eq!(parsed, Outcome::Failed);
        assert!(serde_json::from_str::<Outcome>("1").is_err());
    }

    #[test]
    fn test_availability_wire_names() {
        assert_eq!(
            serde_json::to_string(&WorkerAvailability::Busy).unwrap(),
            "\"busy\""
        );
        assert!(WorkerAvailability::Available.can_accept_tasks());
        assert!(!WorkerAvailability::Busy.can_accept_tasks());
    }

    #[test]
    fn test_stage_transitions() {
        use PipelineStage::*;

        assert!(Fetching.can_advance_to(Provisioning));
        assert!(Provisioning.can_advance_to(Executing));
        assert!(Executing.can_advance_to(Reporting));
        assert!(Fetching.can_advance_to(Reporting));

        assert!(!Fetching.can_advance_to(Executing));
        assert!(!Executing.can_advance_to(Provisioning));
        assert!(!Reporting.can_advance_to(Reporting));
        assert!(Reporting.is_terminal());
    }
}
