//! Failure bookkeeping for a run.
//!
//! Best-effort failures are recorded and the run continues. The first fatal
//! failure sets the abort reason; from then on every remaining main-phase
//! stage is skipped.

use crate::core::{FailurePolicy, StageStatus};
use serde::{Deserialize, Serialize};

/// Record of a stage failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailureRecord {
    /// Stage name.
    pub stage: String,
    /// Error message.
    pub error: String,
    /// Policy of the failed stage.
    pub policy: FailurePolicy,
    /// Exit code, when a command failed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exit_code: Option<i32>,
    /// When the failure was recorded (ISO 8601).
    pub timestamp: String,
}

impl FailureRecord {
    /// Creates a new failure record.
    #[must_use]
    pub fn new(stage: impl Into<String>, error: impl Into<String>, policy: FailurePolicy) -> Self {
        Self {
            stage: stage.into(),
            error: error.into(),
            policy,
            exit_code: None,
            timestamp: crate::utils::iso_timestamp(),
        }
    }

    /// Sets the exit code.
    #[must_use]
    pub fn with_exit_code(mut self, code: Option<i32>) -> Self {
        self.exit_code = code;
        self
    }
}

/// Summary of failures during a run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailureSummary {
    /// Number of failed fatal stages.
    pub fatal: usize,
    /// Number of failed best-effort stages.
    pub best_effort: usize,
    /// Why the main phase was aborted, if it was.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub abort_reason: Option<String>,
    /// Every failure, in the order recorded.
    pub failures: Vec<FailureRecord>,
}

impl FailureSummary {
    /// Returns true if any failures occurred.
    #[must_use]
    pub fn has_failures(&self) -> bool {
        !self.failures.is_empty()
    }
}

/// Collects failures and decides when the main phase must stop.
#[derive(Debug, Default)]
pub struct FailureCollector {
    failures: Vec<FailureRecord>,
    abort_reason: Option<String>,
}

impl FailureCollector {
    /// Creates a new failure collector.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a finished stage. Only failed stages leave a record.
    pub fn record(
        &mut self,
        stage: &str,
        policy: FailurePolicy,
        status: StageStatus,
        error: Option<&str>,
        exit_code: Option<i32>,
    ) {
        if status != StageStatus::Failed {
            return;
        }
        let error = error.unwrap_or("stage failed");
        self.failures
            .push(FailureRecord::new(stage, error, policy).with_exit_code(exit_code));
        if policy == FailurePolicy::Fatal && self.abort_reason.is_none() {
            self.abort_reason = Some(format!("fatal stage '{stage}' failed: {error}"));
        }
    }

    /// Returns true once a fatal stage has failed.
    #[must_use]
    pub fn should_stop(&self) -> bool {
        self.abort_reason.is_some()
    }

    /// Returns the abort reason.
    #[must_use]
    pub fn abort_reason(&self) -> Option<&str> {
        self.abort_reason.as_deref()
    }

    /// Returns all failures.
    #[must_use]
    pub fn failures(&self) -> &[FailureRecord] {
        &self.failures
    }

    /// Creates a summary.
    #[must_use]
    pub fn summary(&self) -> FailureSummary {
        FailureSummary {
            fatal: self
                .failures
                .iter()
                .filter(|f| f.policy == FailurePolicy::Fatal)
                .count(),
            best_effort: self
                .failures
                .iter()
                .filter(|f| f.policy == FailurePolicy::BestEffort)
                .count(),
            abort_reason: self.abort_reason.clone(),
            failures: self.failures.clone(),
        }
    }
}
