//! Wide event payloads summarizing stages and runs.

use crate::aggregate::{PipelineRun, StageRecord};
use crate::core::PipelineEvent;
use crate::pipeline::FailureSummary;

/// Builds the wide payloads attached to `stage.*` and `pipeline.completed` events.
#[derive(Debug, Default, Clone, Copy)]
pub struct WideEventEmitter;

impl WideEventEmitter {
    /// Builds a stage payload.
    #[must_use]
    pub fn build_stage_payload(run_id: &str, record: &StageRecord) -> serde_json::Value {
        let mut payload = serde_json::json!({
            "run_id": run_id,
            "stage": record.name,
            "policy": record.policy.to_string(),
            "phase": record.phase,
            "status": record.status.to_string(),
            "duration_ms": record.duration_ms,
            "artifact_count": record.artifacts.len(),
        });

        if let serde_json::Value::Object(ref mut map) = payload {
            if let Some(ref group) = record.group {
                map.insert("group".to_string(), serde_json::json!(group));
            }
            if let Some(code) = record.exit_code {
                map.insert("exit_code".to_string(), serde_json::json!(code));
            }
            if let Some(ref err) = record.error {
                map.insert("error".to_string(), serde_json::json!(err));
            }
            if let Some(ref reason) = record.skip_reason {
                map.insert("reason".to_string(), serde_json::json!(reason));
            }
            if let Some(ref gate) = record.gate {
                map.insert("gate".to_string(), serde_json::json!(gate));
            }
        }
        payload
    }

    /// Builds a pipeline payload.
    #[must_use]
    pub fn build_pipeline_payload(run: &PipelineRun) -> serde_json::Value {
        let FailureSummary {
            fatal,
            best_effort,
            abort_reason,
            ..
        } = &run.failures;

        serde_json::json!({
            "run_id": run.identity.run_id.to_string(),
            "run": run.identity.label(),
            "pipeline": run.pipeline,
            "status": run.status.to_string(),
            "duration_ms": run.duration_ms,
            "stage_counts": run.status_counts(),
            "fatal_failures": fatal,
            "best_effort_failures": best_effort,
            "abort_reason": abort_reason,
            "artifacts_archived": run.manifest.as_ref().map_or(0, |m| m.archived_count()),
            "artifacts_missing": run.manifest.as_ref().map_or(0, |m| m.missing_count()),
            "bundle": run.bundle,
            "notified": run.notified,
        })
    }

    /// Builds the terminal event for a stage record.
    #[must_use]
    pub fn stage_event(run_id: &str, record: &StageRecord) -> PipelineEvent {
        Self::with_payload(
            PipelineEvent::new(record.status.event_type()),
            Self::build_stage_payload(run_id, record),
        )
    }

    /// Builds the `pipeline.completed` event.
    #[must_use]
    pub fn pipeline_event(run: &PipelineRun) -> PipelineEvent {
        Self::with_payload(
            PipelineEvent::new("pipeline.completed"),
            Self::build_pipeline_payload(run),
        )
    }

    fn with_payload(mut event: PipelineEvent, payload: serde_json::Value) -> PipelineEvent {
        if let serde_json::Value::Object(map) = payload {
            event.data.extend(map);
        }
        event
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::RunContext;
    use crate::core::{FailurePolicy, PipelineStatus, StageOutput};
    use crate::aggregate::ResultAggregator;
    use crate::pipeline::Phase;

    #[test]
    fn test_build_stage_payload() {
        let record = StageRecord::from_output(
            "dast",
            FailurePolicy::BestEffort,
            Phase::Main,
            StageOutput::unstable("zap findings").with_exit_code(2),
        )
        .with_timing(crate::utils::iso_timestamp(), 1000.0);

        let payload = WideEventEmitter::build_stage_payload("r-1", &record);

        assert_eq!(payload["stage"], "dast");
        assert_eq!(payload["status"], "unstable");
        assert_eq!(payload["policy"], "best_effort");
        assert_eq!(payload["exit_code"], 2);
        assert_eq!(payload["duration_ms"], 1000.0);
        assert!(payload.get("group").is_none());
    }

    #[test]
    fn test_stage_event_type_follows_status() {
        let record = StageRecord::skipped("deploy", FailurePolicy::Fatal, Phase::Main, "aborted");
        let event = WideEventEmitter::stage_event("r-1", &record);

        assert_eq!(event.event_type, "stage.skipped");
        assert_eq!(event.data.get("reason"), Some(&serde_json::json!("aborted")));
    }

    #[test]
    fn test_build_pipeline_payload() {
        let run = RunContext::builder("security").build();
        let mut aggregator = ResultAggregator::new(&run);
        aggregator.record(StageRecord::from_output(
            "build",
            FailurePolicy::Fatal,
            Phase::Main,
            StageOutput::success(),
        ));
        let record = aggregator.finish(PipelineStatus::Success, FailureSummary::default());

        let event = WideEventEmitter::pipeline_event(&record);
        let payload = event.payload();

        assert_eq!(event.event_type, "pipeline.completed");
        assert_eq!(payload["pipeline"], "security");
        assert_eq!(payload["status"], "success");
        assert_eq!(payload["stage_counts"]["success"], 1);
        assert_eq!(payload["artifacts_missing"], 0);
    }
}
