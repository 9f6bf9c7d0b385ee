//! Stage specifications: what to run and under which rules.

use crate::adapters::ToolAdapter;
use crate::aggregate::StageRecord;
use crate::context::RunContext;
use crate::core::{FailurePolicy, StageStatus};
use crate::process::ScopedResource;
use crate::stages::{Stage, ToolStage};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

/// A guard deciding whether a stage runs.
///
/// Guards see the immutable run context and the records of stages that have
/// already finished.
pub type GuardFn = Arc<dyn Fn(&RunContext, &[StageRecord]) -> bool + Send + Sync>;

/// A named guard condition.
#[derive(Clone)]
pub struct Guard {
    description: String,
    check: GuardFn,
}

impl Guard {
    /// Creates a guard.
    pub fn new<F>(description: impl Into<String>, check: F) -> Self
    where
        F: Fn(&RunContext, &[StageRecord]) -> bool + Send + Sync + 'static,
    {
        Self {
            description: description.into(),
            check: Arc::new(check),
        }
    }

    /// Runs only when a captured environment variable equals `value`.
    #[must_use]
    pub fn var_equals(name: impl Into<String>, value: impl Into<String>) -> Self {
        let name = name.into();
        let value = value.into();
        Self::new(format!("{name} == {value}"), move |run, _| {
            run.var(&name) == Some(value.as_str())
        })
    }

    /// Runs only when the named stage finished without failing.
    #[must_use]
    pub fn stage_succeeded(stage: impl Into<String>) -> Self {
        let stage = stage.into();
        Self::new(format!("stage '{stage}' succeeded"), move |_, records| {
            records
                .iter()
                .any(|r| r.name == stage && matches!(r.status, StageStatus::Success | StageStatus::Unstable))
        })
    }

    /// Returns the description.
    #[must_use]
    pub fn description(&self) -> &str {
        &self.description
    }

    /// Evaluates the guard.
    #[must_use]
    pub fn allows(&self, run: &RunContext, records: &[StageRecord]) -> bool {
        (self.check)(run, records)
    }
}

impl fmt::Debug for Guard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Guard").field(&self.description).finish()
    }
}

/// When a per-stage post action runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PostCondition {
    /// Whatever the stage result.
    Always,
    /// The stage succeeded.
    Success,
    /// The stage failed or was cancelled.
    Failure,
    /// The stage was unstable.
    Unstable,
}

impl PostCondition {
    /// Returns true if the action should run after a stage ending in `status`.
    #[must_use]
    pub fn matches(self, status: StageStatus) -> bool {
        match self {
            Self::Always => true,
            Self::Success => status == StageStatus::Success,
            Self::Failure => status.is_failure(),
            Self::Unstable => status == StageStatus::Unstable,
        }
    }
}

impl fmt::Display for PostCondition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Always => write!(f, "always"),
            Self::Success => write!(f, "success"),
            Self::Failure => write!(f, "failure"),
            Self::Unstable => write!(f, "unstable"),
        }
    }
}

/// An action run after its stage, in declaration order, when its condition matches.
#[derive(Debug, Clone)]
pub struct PostAction {
    /// When the action runs.
    pub condition: PostCondition,
    /// What it runs.
    pub runner: Arc<dyn Stage>,
}

/// Specification for a single stage in a pipeline.
#[derive(Clone)]
pub struct StageSpec {
    /// The unique name of the stage.
    pub name: String,
    /// The stage implementation.
    pub runner: Arc<dyn Stage>,
    /// How a failure of this stage affects the run.
    pub policy: FailurePolicy,
    /// Optional guard; a false guard skips the stage.
    pub guard: Option<Guard>,
    /// Per-stage post actions.
    pub post: Vec<PostAction>,
    /// Resources held for the duration of the stage.
    pub resources: Vec<Arc<dyn ScopedResource>>,
    /// Files the stage is expected to produce, relative to the workspace.
    pub artifacts: Vec<PathBuf>,
}

impl StageSpec {
    /// Creates a fatal stage specification.
    #[must_use]
    pub fn new(name: impl Into<String>, runner: Arc<dyn Stage>) -> Self {
        Self {
            name: name.into(),
            runner,
            policy: FailurePolicy::Fatal,
            guard: None,
            post: Vec::new(),
            resources: Vec::new(),
            artifacts: Vec::new(),
        }
    }

    /// Creates a specification named after the stage.
    #[must_use]
    pub fn of(stage: impl Stage + 'static) -> Self {
        let name = stage.name().to_string();
        Self::new(name, Arc::new(stage))
    }

    /// Creates a specification for a tool stage, with the tool kind's default policy.
    #[must_use]
    pub fn tool(name: impl Into<String>, adapter: impl ToolAdapter + 'static) -> Self {
        let name = name.into();
        let policy = adapter.kind().default_policy();
        Self::new(name.clone(), Arc::new(ToolStage::new(name, adapter))).with_policy(policy)
    }

    /// Sets the failure policy.
    #[must_use]
    pub fn with_policy(mut self, policy: FailurePolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Marks the stage fatal.
    #[must_use]
    pub fn fatal(self) -> Self {
        self.with_policy(FailurePolicy::Fatal)
    }

    /// Marks the stage best-effort.
    #[must_use]
    pub fn best_effort(self) -> Self {
        self.with_policy(FailurePolicy::BestEffort)
    }

    /// Sets the guard.
    #[must_use]
    pub fn when(mut self, guard: Guard) -> Self {
        self.guard = Some(guard);
        self
    }

    /// Adds a post action.
    #[must_use]
    pub fn with_post(mut self, condition: PostCondition, runner: impl Stage + 'static) -> Self {
        self.post.push(PostAction {
            condition,
            runner: Arc::new(runner),
        });
        self
    }

    /// Attaches a scoped resource.
    #[must_use]
    pub fn with_resource(mut self, resource: impl ScopedResource + 'static) -> Self {
        self.resources.push(Arc::new(resource));
        self
    }

    /// Declares an expected artifact.
    #[must_use]
    pub fn with_artifact(mut self, path: impl Into<PathBuf>) -> Self {
        self.artifacts.push(path.into());
        self
    }
}

impl fmt::Debug for StageSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StageSpec")
            .field("name", &self.name)
            .field("policy", &self.policy)
            .field("guard", &self.guard)
            .field("post", &self.post.len())
            .field(
                "resources",
                &self.resources.iter().map(|r| r.name()).collect::<Vec<_>>(),
            )
            .field("artifacts", &self.artifacts)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stages::NoOpStage;

    #[test]
    fn test_stage_spec_defaults_to_fatal() {
        let spec = StageSpec::of(NoOpStage::new("build"));
        assert_eq!(spec.name, "build");
        assert_eq!(spec.policy, FailurePolicy::Fatal);
        assert!(spec.guard.is_none());
    }

    #[test]
    fn test_stage_spec_builders() {
        let spec = StageSpec::of(NoOpStage::new("sast"))
            .best_effort()
            .with_post(PostCondition::Always, NoOpStage::new("collect"))
            .with_artifact("semgrep.json");

        assert_eq!(spec.policy, FailurePolicy::BestEffort);
        assert_eq!(spec.post.len(), 1);
        assert_eq!(spec.artifacts, vec![PathBuf::from("semgrep.json")]);
    }

    #[test]
    fn test_tool_spec_takes_kind_policy() {
        use crate::adapters::Tool;
        use crate::process::CommandSpec;

        let sast = StageSpec::tool("sast", Tool::static_analysis(CommandSpec::new("semgrep")));
        let dast = StageSpec::tool("dast", Tool::dynamic_scan(CommandSpec::new("zap")));
        assert_eq!(sast.policy, FailurePolicy::BestEffort);
        assert_eq!(dast.policy, FailurePolicy::Fatal);
        assert_eq!(dast.runner.name(), "dast");
    }

    #[test]
    fn test_post_conditions() {
        assert!(PostCondition::Always.matches(StageStatus::Failed));
        assert!(PostCondition::Success.matches(StageStatus::Success));
        assert!(!PostCondition::Success.matches(StageStatus::Unstable));
        assert!(PostCondition::Failure.matches(StageStatus::Cancelled));
        assert!(PostCondition::Unstable.matches(StageStatus::Unstable));
        assert!(!PostCondition::Failure.matches(StageStatus::Unstable));
    }

    #[test]
    fn test_var_guard() {
        let run = RunContext::builder("p").var("BRANCH_NAME", "main").build();
        assert!(Guard::var_equals("BRANCH_NAME", "main").allows(&run, &[]));
        assert!(!Guard::var_equals("BRANCH_NAME", "develop").allows(&run, &[]));
        assert_eq!(
            Guard::var_equals("BRANCH_NAME", "main").description(),
            "BRANCH_NAME == main"
        );
    }
}
