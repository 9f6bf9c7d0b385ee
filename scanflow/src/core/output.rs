//! Stage output type with factory methods.

use super::{Artifact, GateResult, StageStatus};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// The output of a stage execution.
///
/// Stages build their output through the factory methods and refine it with
/// the `with_*` builders. The executor combines it with timing information
/// into a stage record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageOutput {
    /// The status of the stage execution.
    pub status: StageStatus,

    /// Exit code of the last command the stage ran, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exit_code: Option<i32>,

    /// Captured standard output.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub stdout: String,

    /// Captured standard error.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub stderr: String,

    /// Artifacts produced by the stage beyond the ones it declared.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub artifacts: Vec<Artifact>,

    /// Gate verdict, for gate stages.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gate: Option<GateResult>,

    /// Additional metadata.
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub metadata: HashMap<String, serde_json::Value>,

    /// Error message (for failed executions) or warning (for unstable ones).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    /// Skip or cancel reason.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub skip_reason: Option<String>,
}

impl Default for StageOutput {
    fn default() -> Self {
        Self::success()
    }
}

impl StageOutput {
    fn with_status(status: StageStatus) -> Self {
        Self {
            status,
            exit_code: None,
            stdout: String::new(),
            stderr: String::new(),
            artifacts: Vec::new(),
            gate: None,
            metadata: HashMap::new(),
            error: None,
            skip_reason: None,
        }
    }

    /// Creates a successful output.
    #[must_use]
    pub fn success() -> Self {
        Self::with_status(StageStatus::Success)
    }

    /// Creates an unstable output: the stage completed but reported findings.
    #[must_use]
    pub fn unstable(warning: impl Into<String>) -> Self {
        let mut output = Self::with_status(StageStatus::Unstable);
        output.error = Some(warning.into());
        output
    }

    /// Creates a failure output with an error message.
    #[must_use]
    pub fn fail(error: impl Into<String>) -> Self {
        let mut output = Self::with_status(StageStatus::Failed);
        output.error = Some(error.into());
        output
    }

    /// Creates a skip output with a reason.
    #[must_use]
    pub fn skip(reason: impl Into<String>) -> Self {
        let mut output = Self::with_status(StageStatus::Skipped);
        output.skip_reason = Some(reason.into());
        output
    }

    /// Creates a cancel output with a reason.
    #[must_use]
    pub fn cancel(reason: impl Into<String>) -> Self {
        let mut output = Self::with_status(StageStatus::Cancelled);
        output.skip_reason = Some(reason.into());
        output
    }

    /// Sets the exit code.
    #[must_use]
    pub fn with_exit_code(mut self, code: i32) -> Self {
        self.exit_code = Some(code);
        self
    }

    /// Sets captured stdout and stderr.
    #[must_use]
    pub fn with_streams(mut self, stdout: impl Into<String>, stderr: impl Into<String>) -> Self {
        self.stdout = stdout.into();
        self.stderr = stderr.into();
        self
    }

    /// Adds an artifact.
    #[must_use]
    pub fn with_artifact(mut self, artifact: Artifact) -> Self {
        self.artifacts.push(artifact);
        self
    }

    /// Attaches a gate verdict.
    #[must_use]
    pub fn with_gate(mut self, gate: GateResult) -> Self {
        self.gate = Some(gate);
        self
    }

    /// Adds a single metadata entry.
    #[must_use]
    pub fn add_metadata(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }

    /// Returns true if the output indicates the stage completed.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }

    /// Returns true if the output indicates failure.
    #[must_use]
    pub fn is_failure(&self) -> bool {
        self.status.is_failure()
    }

    /// Gets a metadata value.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&serde_json::Value> {
        self.metadata.get(key)
    }
}
