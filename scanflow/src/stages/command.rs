//! A stage made of sequential command steps.

use super::Stage;
use crate::context::StageContext;
use crate::core::StageOutput;
use crate::errors::ProcessError;
use crate::process::CommandSpec;
use async_trait::async_trait;
use tracing::{debug, warn};

/// Runs its steps in order and fails on the first step that exits non-zero.
///
/// Steps marked `allow_failure` may exit non-zero without failing the stage.
/// Output of every step is concatenated into the stage's captured streams.
#[derive(Debug, Clone)]
pub struct CommandStage {
    name: String,
    steps: Vec<CommandSpec>,
}

impl CommandStage {
    /// Creates a stage with no steps.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            steps: Vec::new(),
        }
    }

    /// Creates a single-step stage.
    #[must_use]
    pub fn single(name: impl Into<String>, step: CommandSpec) -> Self {
        Self::new(name).step(step)
    }

    /// Appends a step.
    #[must_use]
    pub fn step(mut self, step: CommandSpec) -> Self {
        self.steps.push(step);
        self
    }

    /// Appends a `sh -c` step.
    #[must_use]
    pub fn sh(self, script: impl Into<String>) -> Self {
        self.step(CommandSpec::shell(script))
    }

    /// Returns the steps.
    #[must_use]
    pub fn steps(&self) -> &[CommandSpec] {
        &self.steps
    }
}

#[async_trait]
impl Stage for CommandStage {
    fn name(&self) -> &str {
        &self.name
    }

    async fn execute(&self, ctx: &StageContext) -> StageOutput {
        let mut stdout = String::new();
        let mut stderr = String::new();
        let mut last_code = None;
        let mut tolerated = Vec::new();

        for (index, step) in self.steps.iter().enumerate() {
            let shown = ctx.run().redact(&step.to_string());
            debug!(stage = %self.name, step = index + 1, command = %shown, "Running step");
            let output = match ctx.run_command(step).await {
                Ok(output) => output,
                Err(ProcessError::Cancelled { .. }) => {
                    return StageOutput::cancel(format!("step {} `{shown}` interrupted", index + 1))
                        .with_streams(stdout, stderr);
                }
                Err(e) => {
                    let error = ctx.run().redact(&e.to_string());
                    return StageOutput::fail(format!("step {}: {error}", index + 1))
                        .with_streams(stdout, stderr);
                }
            };

            stdout.push_str(&output.stdout);
            stderr.push_str(&output.stderr);
            last_code = output.exit_code;

            if !output.success() {
                if step.allow_failure {
                    warn!(
                        stage = %self.name,
                        command = %shown,
                        exit_code = ?output.exit_code,
                        "Step failed, continuing"
                    );
                    tolerated.push(index + 1);
                    continue;
                }
                let mut failed = StageOutput::fail(format!(
                    "step {} `{shown}` exited with {}",
                    index + 1,
                    output.code()
                ))
                .with_streams(stdout, stderr);
                failed.exit_code = output.exit_code;
                return failed;
            }
        }

        let mut output = StageOutput::success().with_streams(stdout, stderr);
        output.exit_code = last_code;
        if !tolerated.is_empty() {
            output = output.add_metadata("tolerated_failures", serde_json::json!(tolerated));
        }
        output
    }
}
