//! Stage, pipeline, and failure-policy enums.

use serde::{Deserialize, Serialize};
use std::fmt;

/// How a stage's failure affects the rest of the run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    /// A failure aborts every remaining main-phase stage (e.g. build, test).
    Fatal,
    /// A failure is recorded and the run continues (e.g. scanners run with `|| true`).
    BestEffort,
}

impl Default for FailurePolicy {
    fn default() -> Self {
        Self::Fatal
    }
}

impl fmt::Display for FailurePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Fatal => write!(f, "fatal"),
            Self::BestEffort => write!(f, "best_effort"),
        }
    }
}

/// The execution status of a stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageStatus {
    /// Stage is waiting to run.
    Pending,
    /// Stage is currently running.
    Running,
    /// Stage completed successfully.
    Success,
    /// Stage failed.
    Failed,
    /// Stage completed but reported findings or warnings.
    Unstable,
    /// Stage never started (guard was false or the run was aborted).
    Skipped,
    /// Stage was interrupted by run cancellation.
    Cancelled,
}

impl Default for StageStatus {
    fn default() -> Self {
        Self::Pending
    }
}

impl fmt::Display for StageStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Running => write!(f, "running"),
            Self::Success => write!(f, "success"),
            Self::Failed => write!(f, "failed"),
            Self::Unstable => write!(f, "unstable"),
            Self::Skipped => write!(f, "skipped"),
            Self::Cancelled => write!(f, "cancelled"),
        }
    }
}

impl StageStatus {
    /// Returns true if the status represents a terminal state.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Pending | Self::Running)
    }

    /// Returns true if the stage finished without failing.
    ///
    /// Unstable counts as completed: findings are reported, not fatal.
    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success | Self::Unstable | Self::Skipped)
    }

    /// Returns true if the status indicates failure.
    #[must_use]
    pub fn is_failure(&self) -> bool {
        matches!(self, Self::Failed | Self::Cancelled)
    }

    /// Returns the event type emitted when a stage reaches this status.
    #[must_use]
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::Pending | Self::Running => "stage.started",
            Self::Success => "stage.completed",
            Self::Failed => "stage.failed",
            Self::Unstable => "stage.unstable",
            Self::Skipped => "stage.skipped",
            Self::Cancelled => "stage.cancelled",
        }
    }
}

/// The overall status of a pipeline run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineStatus {
    /// The run is in progress.
    Running,
    /// No fatal stage failed.
    Success,
    /// A fatal stage failed and the main phase was aborted.
    Failed,
    /// The run was cancelled from outside.
    Cancelled,
}

impl Default for PipelineStatus {
    fn default() -> Self {
        Self::Running
    }
}

impl fmt::Display for PipelineStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Running => write!(f, "running"),
            Self::Success => write!(f, "success"),
            Self::Failed => write!(f, "failed"),
            Self::Cancelled => write!(f, "cancelled"),
        }
    }
}

impl PipelineStatus {
    /// Returns true if the run finished successfully.
    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failure_policy_default_is_fatal() {
        assert_eq!(FailurePolicy::default(), FailurePolicy::Fatal);
        assert_eq!(FailurePolicy::BestEffort.to_string(), "best_effort");
    }

    #[test]
    fn test_stage_status_display() {
        assert_eq!(StageStatus::Success.to_string(), "success");
        assert_eq!(StageStatus::Failed.to_string(), "failed");
        assert_eq!(StageStatus::Unstable.to_string(), "unstable");
        assert_eq!(StageStatus::Skipped.to_string(), "skipped");
    }

    #[test]
    fn test_stage_status_is_terminal() {
        assert!(StageStatus::Success.is_terminal());
        assert!(StageStatus::Unstable.is_terminal());
        assert!(StageStatus::Failed.is_terminal());
        assert!(!StageStatus::Pending.is_terminal());
        assert!(!StageStatus::Running.is_terminal());
    }

    #[test]
    fn test_unstable_is_not_failure() {
        assert!(StageStatus::Unstable.is_success());
        assert!(!StageStatus::Unstable.is_failure());
        assert!(StageStatus::Cancelled.is_failure());
    }

    #[test]
    fn test_event_types() {
        assert_eq!(StageStatus::Failed.event_type(), "stage.failed");
        assert_eq!(StageStatus::Unstable.event_type(), "stage.unstable");
    }

    #[test]
    fn test_status_serialize() {
        let json = serde_json::to_string(&StageStatus::Unstable).unwrap();
        assert_eq!(json, r#""unstable""#);

        let policy: FailurePolicy = serde_json::from_str(r#""best_effort""#).unwrap();
        assert_eq!(policy, FailurePolicy::BestEffort);

        let status: PipelineStatus = serde_json::from_str(r#""failed""#).unwrap();
        assert_eq!(status, PipelineStatus::Failed);
    }
}
