//! Collects stage records into a run record.

use super::{PipelineRun, StageRecord};
use crate::context::{EnvironmentSnapshot, RunContext, RunIdentity};
use crate::core::{Artifact, PipelineStatus};
use crate::pipeline::FailureSummary;
use std::collections::BTreeMap;
use std::time::Instant;

/// Accumulates stage records while a run executes.
#[derive(Debug)]
pub struct ResultAggregator {
    pipeline: String,
    identity: RunIdentity,
    environment: EnvironmentSnapshot,
    started_at: String,
    start: Instant,
    stages: Vec<StageRecord>,
    post: Vec<StageRecord>,
}

impl ResultAggregator {
    /// Starts aggregating for a run.
    #[must_use]
    pub fn new(run: &RunContext) -> Self {
        Self {
            pipeline: run.pipeline_name().to_string(),
            identity: run.identity().clone(),
            environment: run.snapshot(),
            started_at: crate::utils::iso_timestamp(),
            start: Instant::now(),
            stages: Vec::new(),
            post: Vec::new(),
        }
    }

    /// Records a main-phase stage.
    pub fn record(&mut self, record: StageRecord) {
        self.stages.push(record);
    }

    /// Records a post-phase stage.
    pub fn record_post(&mut self, record: StageRecord) {
        self.post.push(record);
    }

    /// Returns the records so far, main phase first.
    #[must_use]
    pub fn records(&self) -> Vec<StageRecord> {
        self.stages.iter().chain(self.post.iter()).cloned().collect()
    }

    /// Returns every artifact recorded so far, in stage order.
    #[must_use]
    pub fn artifacts(&self) -> Vec<Artifact> {
        self.stages
            .iter()
            .chain(self.post.iter())
            .flat_map(|r| r.artifacts.iter().cloned())
            .collect()
    }

    /// Returns artifacts grouped by producing stage.
    #[must_use]
    pub fn artifacts_by_stage(&self) -> BTreeMap<String, Vec<Artifact>> {
        let mut grouped: BTreeMap<String, Vec<Artifact>> = BTreeMap::new();
        for artifact in self.artifacts() {
            grouped.entry(artifact.stage.clone()).or_default().push(artifact);
        }
        grouped
    }

    /// Produces the run record.
    #[must_use]
    pub fn finish(self, status: PipelineStatus, failures: FailureSummary) -> PipelineRun {
        PipelineRun {
            pipeline: self.pipeline,
            identity: self.identity,
            status,
            started_at: self.started_at,
            finished_at: crate::utils::iso_timestamp(),
            duration_ms: crate::utils::elapsed_ms(self.start),
            stages: self.stages,
            post: self.post,
            failures,
            environment: self.environment,
            manifest: None,
            bundle: None,
            notified: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{FailurePolicy, StageOutput, StageStatus};
    use crate::pipeline::Phase;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_aggregates_records_and_artifacts() {
        let run = RunContext::builder("security")
            .workspace("/ws")
            .credential("SONAR_TOKEN", "s3cret")
            .var("BUILD_NUMBER", "42")
            .build();
        let mut aggregator = ResultAggregator::new(&run);

        aggregator.record(StageRecord::from_output(
            "sast",
            FailurePolicy::BestEffort,
            Phase::Main,
            StageOutput::unstable("findings")
                .with_artifact(Artifact::new("semgrep.json", "semgrep.json", "sast")),
        ));
        aggregator.record(StageRecord::skipped(
            "deploy",
            FailurePolicy::Fatal,
            Phase::Main,
            "aborted",
        ));

        assert_eq!(aggregator.artifacts().len(), 1);
        assert_eq!(aggregator.artifacts_by_stage().keys().collect::<Vec<_>>(), vec!["sast"]);

        let record = aggregator.finish(PipelineStatus::Success, FailureSummary::default());
        assert_eq!(record.pipeline, "security");
        assert_eq!(record.stage_status("sast"), Some(StageStatus::Unstable));
        assert_eq!(record.stages_with_status(StageStatus::Skipped), vec!["deploy"]);
        assert_eq!(record.environment.credential_names, vec!["SONAR_TOKEN"]);
        assert_eq!(record.status_counts().get("unstable"), Some(&1));
    }

    #[test]
    fn test_run_record_never_serializes_credential_values() {
        let run = RunContext::builder("p").credential("TOKEN", "hunter2").build();
        let record = ResultAggregator::new(&run)
            .finish(PipelineStatus::Success, FailureSummary::default());
        let json = serde_json::to_string(&record).unwrap();

        assert!(json.contains("TOKEN"));
        assert!(!json.contains("hunter2"));
    }
}
