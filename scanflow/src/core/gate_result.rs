//! Gate verdict record.

use serde::{Deserialize, Serialize};

/// The outcome of waiting on an external gate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GateResult {
    /// Whether the gate passed.
    pub passed: bool,
    /// Identifier of the tool or server that produced the verdict.
    pub source: String,
    /// Whether the wait ran out of time before a verdict arrived.
    pub timed_out: bool,
    /// Whether this result aborts the pipeline under the configured policy.
    pub aborts: bool,
    /// Number of polls made before resolving.
    pub polls: u32,
    /// Free-form detail from the source (e.g. the quality gate status string).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl GateResult {
    /// Creates a passing result.
    #[must_use]
    pub fn passed(source: impl Into<String>, polls: u32) -> Self {
        Self {
            passed: true,
            source: source.into(),
            timed_out: false,
            aborts: false,
            polls,
            detail: None,
        }
    }

    /// Creates a failing result.
    #[must_use]
    pub fn failed(source: impl Into<String>, polls: u32, aborts: bool) -> Self {
        Self {
            passed: false,
            source: source.into(),
            timed_out: false,
            aborts,
            polls,
            detail: None,
        }
    }

    /// Creates a timed-out result.
    #[must_use]
    pub fn timed_out(source: impl Into<String>, polls: u32, aborts: bool) -> Self {
        Self {
            passed: false,
            source: source.into(),
            timed_out: true,
            aborts,
            polls,
            detail: None,
        }
    }

    /// Attaches a detail string.
    #[must_use]
    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }
}
