//! Per-stage and per-run result records.

use super::ArchiveManifest;
use crate::context::{EnvironmentSnapshot, RunIdentity};
use crate::core::{Artifact, FailurePolicy, GateResult, PipelineStatus, StageOutput, StageStatus};
use crate::pipeline::{FailureSummary, Phase, PostCondition};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;

/// The outcome of one per-stage post action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostActionRecord {
    /// Name of the action's stage.
    pub name: String,
    /// The condition that triggered it.
    pub condition: PostCondition,
    /// Its result.
    pub status: StageStatus,
    /// Error or warning, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Everything recorded about one stage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageRecord {
    /// Stage name.
    pub name: String,
    /// Failure policy.
    pub policy: FailurePolicy,
    /// Phase the stage ran in.
    pub phase: Phase,
    /// Parallel group label.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group: Option<String>,
    /// Final status.
    pub status: StageStatus,
    /// Exit code of the last command.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exit_code: Option<i32>,
    /// Captured standard output, credentials masked.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub stdout: String,
    /// Captured standard error, credentials masked.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub stderr: String,
    /// Error (failed) or warning (unstable).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Why the stage did not run or was interrupted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub skip_reason: Option<String>,
    /// Declared and produced artifacts.
    #[serde(default)]
    pub artifacts: Vec<Artifact>,
    /// Gate verdict, for gate stages.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gate: Option<GateResult>,
    /// Per-stage post actions that ran.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub post_actions: Vec<PostActionRecord>,
    /// Extra data from the stage.
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub metadata: HashMap<String, serde_json::Value>,
    /// Start time (ISO 8601); absent for stages that never started.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<String>,
    /// Wall-clock duration.
    #[serde(default)]
    pub duration_ms: f64,
}

impl StageRecord {
    /// Creates a record for a stage that never started.
    #[must_use]
    pub fn skipped(
        name: impl Into<String>,
        policy: FailurePolicy,
        phase: Phase,
        reason: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            policy,
            phase,
            group: None,
            status: StageStatus::Skipped,
            exit_code: None,
            stdout: String::new(),
            stderr: String::new(),
            error: None,
            skip_reason: Some(reason.into()),
            artifacts: Vec::new(),
            gate: None,
            post_actions: Vec::new(),
            metadata: HashMap::new(),
            started_at: None,
            duration_ms: 0.0,
        }
    }

    /// Creates a record from a stage's output.
    #[must_use]
    pub fn from_output(
        name: impl Into<String>,
        policy: FailurePolicy,
        phase: Phase,
        output: StageOutput,
    ) -> Self {
        Self {
            name: name.into(),
            policy,
            phase,
            group: None,
            status: output.status,
            exit_code: output.exit_code,
            stdout: output.stdout,
            stderr: output.stderr,
            error: output.error,
            skip_reason: output.skip_reason,
            artifacts: output.artifacts,
            gate: output.gate,
            post_actions: Vec::new(),
            metadata: output.metadata,
            started_at: None,
            duration_ms: 0.0,
        }
    }

    /// Sets the parallel group.
    #[must_use]
    pub fn in_group(mut self, group: Option<&str>) -> Self {
        self.group = group.map(String::from);
        self
    }

    /// Sets timing.
    #[must_use]
    pub fn with_timing(mut self, started_at: String, duration_ms: f64) -> Self {
        self.started_at = Some(started_at);
        self.duration_ms = duration_ms;
        self
    }

    /// Adds artifacts, skipping paths already present.
    pub fn add_artifacts(&mut self, artifacts: impl IntoIterator<Item = Artifact>) {
        for artifact in artifacts {
            if !self.artifacts.iter().any(|a| a.path == artifact.path) {
                self.artifacts.push(artifact);
            }
        }
    }
}

/// The complete record of a pipeline run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineRun {
    /// Pipeline name.
    pub pipeline: String,
    /// Run identity.
    pub identity: RunIdentity,
    /// Overall status.
    pub status: PipelineStatus,
    /// Start time (ISO 8601).
    pub started_at: String,
    /// End time (ISO 8601).
    pub finished_at: String,
    /// Wall-clock duration.
    pub duration_ms: f64,
    /// Main-phase stage records in plan order.
    pub stages: Vec<StageRecord>,
    /// Post-phase stage records.
    #[serde(default)]
    pub post: Vec<StageRecord>,
    /// Failures and abort reason.
    #[serde(default)]
    pub failures: FailureSummary,
    /// Workspace, credential names, and captured variables.
    pub environment: EnvironmentSnapshot,
    /// Archival manifest, once the post phase has archived.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub manifest: Option<ArchiveManifest>,
    /// Compressed report bundle, when packaging succeeded.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bundle: Option<PathBuf>,
    /// Names of notifiers that accepted the final notification.
    #[serde(default)]
    pub notified: Vec<String>,
}

impl PipelineRun {
    /// Looks up a stage record in either phase.
    #[must_use]
    pub fn stage(&self, name: &str) -> Option<&StageRecord> {
        self.stages.iter().chain(self.post.iter()).find(|r| r.name == name)
    }

    /// Returns the status of a stage.
    #[must_use]
    pub fn stage_status(&self, name: &str) -> Option<StageStatus> {
        self.stage(name).map(|r| r.status)
    }

    /// Returns names of stages with the given status, in order.
    #[must_use]
    pub fn stages_with_status(&self, status: StageStatus) -> Vec<&str> {
        self.stages
            .iter()
            .chain(self.post.iter())
            .filter(|r| r.status == status)
            .map(|r| r.name.as_str())
            .collect()
    }

    /// Returns every artifact from every stage.
    #[must_use]
    pub fn artifacts(&self) -> Vec<Artifact> {
        self.stages
            .iter()
            .chain(self.post.iter())
            .flat_map(|r| r.artifacts.iter().cloned())
            .collect()
    }

    /// Counts stages by status.
    #[must_use]
    pub fn status_counts(&self) -> BTreeMap<String, usize> {
        let mut counts = BTreeMap::new();
        for record in self.stages.iter().chain(self.post.iter()) {
            *counts.entry(record.status.to_string()).or_insert(0) += 1;
        }
        counts
    }
}
