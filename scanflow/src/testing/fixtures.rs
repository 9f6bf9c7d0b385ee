//! Context fixtures.

use super::ScriptedRunner;
use crate::cancellation::CancellationToken;
use crate::context::{RunContext, StageContext};
use crate::events::{EventSink, NoOpEventSink};
use crate::process::CommandRunner;
use std::path::PathBuf;
use std::sync::Arc;

/// Creates a stage context over an empty run, with a scripted runner where every command succeeds.
#[must_use]
pub fn stage_context(stage_name: &str) -> StageContext {
    stage_context_with_runner(stage_name, Arc::new(ScriptedRunner::new()))
}

/// Creates a stage context over an empty run using `runner`.
#[must_use]
pub fn stage_context_with_runner<R>(stage_name: &str, runner: Arc<R>) -> StageContext
where
    R: CommandRunner + 'static,
{
    TestRun::new().stage_context(stage_name, runner)
}

/// Builder for run contexts used in tests.
#[derive(Debug, Clone)]
pub struct TestRun {
    pipeline: String,
    workspace: PathBuf,
    credentials: Vec<(String, String)>,
    vars: Vec<(String, String)>,
}

impl Default for TestRun {
    fn default() -> Self {
        Self::new()
    }
}

impl TestRun {
    /// Creates a run named `test-pipeline` in the system temp directory.
    #[must_use]
    pub fn new() -> Self {
        Self {
            pipeline: "test-pipeline".to_string(),
            workspace: std::env::temp_dir(),
            credentials: Vec::new(),
            vars: Vec::new(),
        }
    }

    /// Sets the pipeline name.
    #[must_use]
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.pipeline = name.into();
        self
    }

    /// Sets the workspace.
    #[must_use]
    pub fn workspace(mut self, workspace: impl Into<PathBuf>) -> Self {
        self.workspace = workspace.into();
        self
    }

    /// Adds a credential.
    #[must_use]
    pub fn credential(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.credentials.push((name.into(), value.into()));
        self
    }

    /// Adds a captured variable.
    #[must_use]
    pub fn var(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.vars.push((name.into(), value.into()));
        self
    }

    /// Builds the run context.
    #[must_use]
    pub fn build(&self) -> Arc<RunContext> {
        let mut builder = RunContext::builder(&self.pipeline).workspace(&self.workspace);
        for (name, value) in &self.credentials {
            builder = builder.credential(name, value);
        }
        for (name, value) in &self.vars {
            builder = builder.var(name, value);
        }
        Arc::new(builder.build())
    }

    /// Builds a stage context over this run.
    #[must_use]
    pub fn stage_context<R>(&self, stage_name: &str, runner: Arc<R>) -> StageContext
    where
        R: CommandRunner + 'static,
    {
        let events: Arc<dyn EventSink> = Arc::new(NoOpEventSink);
        StageContext::new(
            self.build(),
            stage_name,
            runner,
            events,
            Arc::new(CancellationToken::new()),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_context_fixture() {
        let ctx = stage_context("build");
        assert_eq!(ctx.stage_name(), "build");
        assert_eq!(ctx.run().pipeline_name(), "test-pipeline");
        assert!(!ctx.is_cancelled());
    }

    #[test]
    fn test_test_run_builder() {
        let run = TestRun::new()
            .named("security")
            .workspace("/ws")
            .credential("TOKEN", "abc")
            .var("BRANCH_NAME", "main")
            .build();

        assert_eq!(run.pipeline_name(), "security");
        assert_eq!(run.workspace(), std::path::Path::new("/ws"));
        assert_eq!(run.var("BRANCH_NAME"), Some("main"));
        assert_eq!(run.credentials().names(), vec!["TOKEN"]);
    }
}
