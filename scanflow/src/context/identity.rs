//! Run identity for tracking pipeline executions.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Identifies a pipeline run for correlation and reporting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunIdentity {
    /// The unique ID for this run.
    pub run_id: Uuid,

    /// Build number assigned by the triggering CI system.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub build_number: Option<u64>,

    /// Who or what triggered the run.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub triggered_by: Option<String>,

    /// Link to the full run in the CI system.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub run_url: Option<String>,
}

impl Default for RunIdentity {
    fn default() -> Self {
        Self::new()
    }
}

impl RunIdentity {
    /// Creates a new run identity with a generated run ID.
    #[must_use]
    pub fn new() -> Self {
        Self::with_run_id(Uuid::new_v4())
    }

    /// Creates a run identity with a specific run ID.
    #[must_use]
    pub fn with_run_id(run_id: Uuid) -> Self {
        Self {
            run_id,
            build_number: None,
            triggered_by: None,
            run_url: None,
        }
    }

    /// Sets the build number.
    #[must_use]
    pub fn with_build_number(mut self, build_number: u64) -> Self {
        self.build_number = Some(build_number);
        self
    }

    /// Sets the triggering user.
    #[must_use]
    pub fn with_triggered_by(mut self, user: impl Into<String>) -> Self {
        self.triggered_by = Some(user.into());
        self
    }

    /// Sets the link to the run.
    #[must_use]
    pub fn with_run_url(mut self, url: impl Into<String>) -> Self {
        self.run_url = Some(url.into());
        self
    }

    /// Returns a short label, preferring the build number.
    #[must_use]
    pub fn label(&self) -> String {
        match self.build_number {
            Some(n) => format!("#{n}"),
            None => self.run_id.to_string(),
        }
    }
}
