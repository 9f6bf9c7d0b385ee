//! Pipeline builder with validation.

use super::{ExecutionPlan, PlanEntry, StageSpec};
use crate::errors::{ContractErrorInfo, PipelineValidationError};
use std::collections::HashSet;

/// Builder for validated execution plans.
///
/// Stages are planned in declaration order. Validation runs once, in
/// [`PipelineBuilder::build`].
#[derive(Debug, Clone)]
pub struct PipelineBuilder {
    name: String,
    entries: Vec<PlanEntry>,
    post: Vec<StageSpec>,
}

impl PipelineBuilder {
    /// Creates a new pipeline builder.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            entries: Vec::new(),
            post: Vec::new(),
        }
    }

    /// Appends a stage to the main phase.
    #[must_use]
    pub fn stage(mut self, spec: StageSpec) -> Self {
        self.entries.push(PlanEntry::Single(spec));
        self
    }

    /// Appends a parallel group to the main phase.
    #[must_use]
    pub fn parallel(mut self, name: impl Into<String>, stages: Vec<StageSpec>) -> Self {
        self.entries.push(PlanEntry::Parallel {
            name: name.into(),
            stages,
        });
        self
    }

    /// Appends a stage to the always-run post phase.
    #[must_use]
    pub fn post(mut self, spec: StageSpec) -> Self {
        self.post.push(spec);
        self
    }

    /// Returns the pipeline name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the number of stages declared so far, in both phases.
    #[must_use]
    pub fn stage_count(&self) -> usize {
        self.entries.iter().map(|e| e.stages().len()).sum::<usize>() + self.post.len()
    }

    /// Validates and builds the plan.
    ///
    /// # Errors
    ///
    /// Returns a [`PipelineValidationError`] carrying a contract code when the
    /// name is blank, there is no main stage, a parallel group is empty, or a
    /// stage name is used twice.
    pub fn build(self) -> Result<ExecutionPlan, PipelineValidationError> {
        if self.name.trim().is_empty() {
            return Err(PipelineValidationError::new(
                "Pipeline name cannot be empty or whitespace-only",
            )
            .with_error_info(
                ContractErrorInfo::new("CONTRACT-004-NAME", "Blank pipeline name").with_default_hint(),
            ));
        }

        for entry in &self.entries {
            if let PlanEntry::Parallel { name, stages } = entry {
                if stages.is_empty() {
                    return Err(PipelineValidationError::new(format!(
                        "Parallel group '{name}' has no stages"
                    ))
                    .with_error_info(
                        ContractErrorInfo::new("CONTRACT-004-EMPTY_GROUP", "Empty parallel group")
                            .with_context_entry("group", name.clone())
                            .with_default_hint(),
                    ));
                }
            }
        }

        if self.entries.is_empty() {
            return Err(PipelineValidationError::new("Pipeline has no stages").with_error_info(
                ContractErrorInfo::new("CONTRACT-004-EMPTY", "Cannot build an empty pipeline")
                    .with_default_hint(),
            ));
        }

        let mut seen = HashSet::new();
        let all = self
            .entries
            .iter()
            .flat_map(PlanEntry::stages)
            .chain(self.post.iter());
        for spec in all {
            if !seen.insert(spec.name.as_str()) {
                return Err(PipelineValidationError::new(format!(
                    "Stage '{}' is declared more than once",
                    spec.name
                ))
                .with_stages(vec![spec.name.clone()])
                .with_error_info(
                    ContractErrorInfo::new(
                        "CONTRACT-004-DUPLICATE",
                        format!("Duplicate stage name '{}'", spec.name),
                    )
                    .with_context_entry("stage", spec.name.clone())
                    .with_default_hint(),
                ));
            }
        }

        Ok(ExecutionPlan::new(self.name, self.entries, self.post))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::FailurePolicy;
    use crate::pipeline::Phase;
    use crate::stages::NoOpStage;

    fn noop(name: &str) -> StageSpec {
        StageSpec::of(NoOpStage::new(name))
    }

    #[test]
    fn test_plan_preserves_declaration_order() {
        let plan = PipelineBuilder::new("security")
            .stage(noop("checkout"))
            .stage(noop("build"))
            .parallel("scans", vec![noop("sast").best_effort(), noop("secrets").best_effort()])
            .stage(noop("deploy"))
            .post(noop("cleanup"))
            .build()
            .unwrap();

        assert_eq!(plan.name(), "security");
        assert_eq!(plan.entries().len(), 4);
        assert_eq!(plan.stage_count(), 5);
        assert_eq!(
            plan.stage_names(),
            vec!["checkout", "build", "sast", "secrets", "deploy"]
        );

        let described = plan.describe();
        assert_eq!(described[2].group.as_deref(), Some("scans"));
        assert_eq!(described[2].policy, FailurePolicy::BestEffort);
        assert_eq!(described[2].position, 2);
        assert_eq!(described[1].policy, FailurePolicy::Fatal);
        assert_eq!(described[5].phase, Phase::Post);
    }

    #[test]
    fn test_blank_name_rejected() {
        let err = PipelineBuilder::new("  ").stage(noop("a")).build().unwrap_err();
        assert_eq!(err.code(), Some("CONTRACT-004-NAME"));
    }

    #[test]
    fn test_empty_pipeline_rejected() {
        let err = PipelineBuilder::new("p").post(noop("notify")).build().unwrap_err();
        assert_eq!(err.code(), Some("CONTRACT-004-EMPTY"));
        assert!(err.error_info.unwrap().fix_hint.is_some());
    }

    #[test]
    fn test_empty_group_rejected() {
        let err = PipelineBuilder::new("p")
            .stage(noop("a"))
            .parallel("scans", Vec::new())
            .build()
            .unwrap_err();
        assert_eq!(err.code(), Some("CONTRACT-004-EMPTY_GROUP"));
    }

    #[test]
    fn test_duplicate_across_phases_rejected() {
        let err = PipelineBuilder::new("p")
            .stage(noop("archive"))
            .post(noop("archive"))
            .build()
            .unwrap_err();
        assert_eq!(err.code(), Some("CONTRACT-004-DUPLICATE"));
        assert_eq!(err.stages, vec!["archive".to_string()]);
    }

    #[test]
    fn test_builder_counts() {
        let builder = PipelineBuilder::new("p")
            .stage(noop("a"))
            .parallel("g", vec![noop("b"), noop("c")])
            .post(noop("d"));
        assert_eq!(builder.stage_count(), 4);
        assert_eq!(builder.name(), "p");
    }
}
