//! The ordered execution plan produced by the builder.

use super::StageSpec;
use crate::core::FailurePolicy;
use serde::{Deserialize, Serialize};

/// One entry of the main phase.
#[derive(Debug, Clone)]
pub enum PlanEntry {
    /// A single stage.
    Single(StageSpec),
    /// Stages started together; the entry completes when all of them have.
    Parallel {
        /// Group label.
        name: String,
        /// Members in declaration order.
        stages: Vec<StageSpec>,
    },
}

impl PlanEntry {
    /// Returns the stages of this entry in declaration order.
    #[must_use]
    pub fn stages(&self) -> &[StageSpec] {
        match self {
            Self::Single(spec) => std::slice::from_ref(spec),
            Self::Parallel { stages, .. } => stages,
        }
    }

    /// Returns the group label for parallel entries.
    #[must_use]
    pub fn group(&self) -> Option<&str> {
        match self {
            Self::Single(_) => None,
            Self::Parallel { name, .. } => Some(name),
        }
    }
}

/// Which phase a stage belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    /// Ordinary stages, subject to abort.
    Main,
    /// Always-run stages after the main phase.
    Post,
}

/// A flat, serializable description of one planned stage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlannedStage {
    /// Stage name.
    pub name: String,
    /// Failure policy.
    pub policy: FailurePolicy,
    /// Phase.
    pub phase: Phase,
    /// Position of the entry in its phase.
    pub position: usize,
    /// Parallel group label, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub group: Option<String>,
}

/// A validated, ordered execution plan.
#[derive(Debug, Clone)]
pub struct ExecutionPlan {
    name: String,
    entries: Vec<PlanEntry>,
    post: Vec<StageSpec>,
}

impl ExecutionPlan {
    pub(super) fn new(name: String, entries: Vec<PlanEntry>, post: Vec<StageSpec>) -> Self {
        Self {
            name,
            entries,
            post,
        }
    }

    /// Returns the pipeline name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the main-phase entries in order.
    #[must_use]
    pub fn entries(&self) -> &[PlanEntry] {
        &self.entries
    }

    /// Returns the post-phase stages in order.
    #[must_use]
    pub fn post_stages(&self) -> &[StageSpec] {
        &self.post
    }

    /// Returns the number of main-phase stages.
    #[must_use]
    pub fn stage_count(&self) -> usize {
        self.entries.iter().map(|e| e.stages().len()).sum()
    }

    /// Returns main-phase stage names in plan order.
    #[must_use]
    pub fn stage_names(&self) -> Vec<&str> {
        self.entries
            .iter()
            .flat_map(|e| e.stages().iter().map(|s| s.name.as_str()))
            .collect()
    }

    /// Looks up a stage in either phase.
    #[must_use]
    pub fn stage(&self, name: &str) -> Option<&StageSpec> {
        self.entries
            .iter()
            .flat_map(PlanEntry::stages)
            .chain(self.post.iter())
            .find(|s| s.name == name)
    }

    /// Flattens the plan into a serializable listing.
    #[must_use]
    pub fn describe(&self) -> Vec<PlannedStage> {
        let main = self.entries.iter().enumerate().flat_map(|(position, entry)| {
            entry.stages().iter().map(move |spec| PlannedStage {
                name: spec.name.clone(),
                policy: spec.policy,
                phase: Phase::Main,
                position,
                group: entry.group().map(String::from),
            })
        });
        let post = self.post.iter().enumerate().map(|(position, spec)| PlannedStage {
            name: spec.name.clone(),
            policy: spec.policy,
            phase: Phase::Post,
            position,
            group: None,
        });
        main.chain(post).collect()
    }
}
