//! A stage wrapping a tool adapter.

use super::Stage;
use crate::adapters::{ToolAdapter, ToolOutcome};
use crate::context::StageContext;
use crate::core::{Artifact, StageOutput};
use crate::errors::ProcessError;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::info;

/// Runs a tool once and classifies its exit code through the adapter's table.
///
/// The adapter's report files are attached as artifacts whatever the outcome;
/// archiving decides later whether they exist.
#[derive(Clone)]
pub struct ToolStage {
    name: String,
    adapter: Arc<dyn ToolAdapter>,
}

impl ToolStage {
    /// Creates a tool stage.
    #[must_use]
    pub fn new(name: impl Into<String>, adapter: impl ToolAdapter + 'static) -> Self {
        Self {
            name: name.into(),
            adapter: Arc::new(adapter),
        }
    }

    /// Returns the adapter.
    #[must_use]
    pub fn adapter(&self) -> &Arc<dyn ToolAdapter> {
        &self.adapter
    }

    fn attach_reports(&self, mut output: StageOutput) -> StageOutput {
        for path in self.adapter.reports() {
            let name = path
                .file_name()
                .map_or_else(|| self.name.clone(), |f| f.to_string_lossy().into_owned());
            output = output.with_artifact(Artifact::new(name, path, &self.name));
        }
        output
    }
}

impl std::fmt::Debug for ToolStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolStage")
            .field("name", &self.name)
            .field("kind", &self.adapter.kind())
            .finish()
    }
}

#[async_trait]
impl Stage for ToolStage {
    fn name(&self) -> &str {
        &self.name
    }

    async fn execute(&self, ctx: &StageContext) -> StageOutput {
        let kind = self.adapter.kind();
        let command = self.adapter.command(ctx.run());

        let result = match ctx.run_command(&command).await {
            Ok(result) => result,
            Err(ProcessError::Cancelled { .. }) => {
                return self.attach_reports(StageOutput::cancel(format!("{kind} interrupted")));
            }
            Err(e) => {
                return self.attach_reports(StageOutput::fail(format!("{kind} could not run: {e}")));
            }
        };

        let code = result.code();
        let outcome = self.adapter.exit_codes().classify(code);
        info!(stage = %self.name, tool = %kind, exit_code = code, %outcome, "Tool finished");

        let output = match outcome {
            ToolOutcome::Clean => StageOutput::success(),
            ToolOutcome::Findings => {
                StageOutput::unstable(format!("{kind} reported findings (exit {code})"))
            }
            ToolOutcome::Fatal => StageOutput::fail(format!("{kind} failed (exit {code})")),
        };

        self.attach_reports(
            output
                .with_exit_code(code)
                .with_streams(result.stdout, result.stderr)
                .add_metadata("tool", serde_json::json!(kind))
                .add_metadata("outcome", serde_json::json!(outcome)),
        )
    }
}
