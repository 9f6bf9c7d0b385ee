//! The final notification payload.

use crate::aggregate::PipelineRun;
use crate::core::{PipelineStatus, StageStatus};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

/// A one-line summary of a stage for the notification body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageLine {
    /// Stage name.
    pub name: String,
    /// Final status.
    pub status: StageStatus,
    /// Error, warning, or skip reason.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

/// What a notifier receives once the run is over.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    /// Pipeline name.
    pub pipeline: String,
    /// Run label (`#<build>` or the run id).
    pub run: String,
    /// Overall status.
    pub status: PipelineStatus,
    /// Who or what triggered the run.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub triggered_by: Option<String>,
    /// Link to the full run.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub run_url: Option<String>,
    /// Why the main phase stopped early.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub abort_reason: Option<String>,
    /// Stage counts by status.
    pub counts: BTreeMap<String, usize>,
    /// Every stage in plan order.
    pub stages: Vec<StageLine>,
    /// Files to attach: the bundle if one was produced, otherwise archived artifacts.
    pub attachments: Vec<PathBuf>,
    /// Wall-clock duration.
    pub duration_ms: f64,
}

impl Notification {
    /// Builds the notification for a finished run.
    #[must_use]
    pub fn from_run(run: &PipelineRun) -> Self {
        let attachments = match (&run.bundle, &run.manifest) {
            (Some(bundle), _) => vec![bundle.clone()],
            (None, Some(manifest)) => manifest.archived_paths(),
            (None, None) => Vec::new(),
        };

        Self {
            pipeline: run.pipeline.clone(),
            run: run.identity.label(),
            status: run.status,
            triggered_by: run.identity.triggered_by.clone(),
            run_url: run.identity.run_url.clone(),
            abort_reason: run.failures.abort_reason.clone(),
            counts: run.status_counts(),
            stages: run
                .stages
                .iter()
                .chain(run.post.iter())
                .map(|r| StageLine {
                    name: r.name.clone(),
                    status: r.status,
                    detail: r.error.clone().or_else(|| r.skip_reason.clone()),
                })
                .collect(),
            attachments,
            duration_ms: run.duration_ms,
        }
    }

    /// Returns the subject line, e.g. `[FAILED] security #42`.
    #[must_use]
    pub fn subject(&self) -> String {
        format!(
            "[{}] {} {}",
            self.status.to_string().to_uppercase(),
            self.pipeline,
            self.run
        )
    }
}
