//! Per-stage execution context.

use super::RunContext;
use crate::cancellation::CancellationToken;
use crate::core::PipelineEvent;
use crate::errors::ProcessError;
use crate::events::EventSink;
use crate::process::{CommandOutput, CommandRunner, CommandSpec};
use std::sync::Arc;

/// The context handed to a stage invocation. Cheap to clone.
#[derive(Clone)]
pub struct StageContext {
    run: Arc<RunContext>,
    stage_name: String,
    runner: Arc<dyn CommandRunner>,
    events: Arc<dyn EventSink>,
    cancel: Arc<CancellationToken>,
}

impl StageContext {
    /// Creates a new stage context.
    #[must_use]
    pub fn new(
        run: Arc<RunContext>,
        stage_name: impl Into<String>,
        runner: Arc<dyn CommandRunner>,
        events: Arc<dyn EventSink>,
        cancel: Arc<CancellationToken>,
    ) -> Self {
        Self {
            run,
            stage_name: stage_name.into(),
            runner,
            events,
            cancel,
        }
    }

    /// Returns the run context.
    #[must_use]
    pub fn run(&self) -> &Arc<RunContext> {
        &self.run
    }

    /// Returns the stage name.
    #[must_use]
    pub fn stage_name(&self) -> &str {
        &self.stage_name
    }

    /// Returns the command runner.
    #[must_use]
    pub fn runner(&self) -> &Arc<dyn CommandRunner> {
        &self.runner
    }

    /// Returns the run cancellation token.
    #[must_use]
    pub fn cancellation(&self) -> &Arc<CancellationToken> {
        &self.cancel
    }

    /// Returns whether the run has been cancelled.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Emits an event tagged with this stage's name.
    pub fn emit(&self, event: PipelineEvent) {
        let event = if event.data.contains_key("stage") {
            event
        } else {
            event.add_data("stage", serde_json::json!(self.stage_name))
        };
        self.events.try_emit(event);
    }

    /// Returns a context for another stage sharing this run.
    #[must_use]
    pub fn for_stage(&self, stage_name: impl Into<String>) -> Self {
        Self {
            stage_name: stage_name.into(),
            ..self.clone()
        }
    }

    /// Returns a copy bound to a fresh cancellation token.
    ///
    /// Used for work that must finish even after the run is cancelled, such
    /// as post actions and resource cleanup.
    #[must_use]
    pub fn detached(&self) -> Self {
        Self {
            cancel: Arc::new(CancellationToken::new()),
            ..self.clone()
        }
    }

    /// Prepares a command for launch: anchors its working directory to the
    /// workspace and moves bound credentials into its environment.
    pub fn resolve_command(&self, spec: &CommandSpec) -> Result<CommandSpec, ProcessError> {
        let mut resolved = spec.clone().resolve_cwd(self.run.workspace());
        for (var, name) in std::mem::take(&mut resolved.credential_env) {
            let secret = self.run.credentials().get(&name).ok_or_else(|| {
                ProcessError::MissingCredential {
                    program: spec.program.clone(),
                    credential: name.clone(),
                }
            })?;
            resolved.env.insert(var, secret.expose().to_string());
        }
        Ok(resolved)
    }

    /// Runs a command in the run workspace and masks credentials in its output.
    ///
    /// A command without a working directory runs in the workspace; relative
    /// directories resolve against it.
    pub async fn run_command(&self, spec: &CommandSpec) -> Result<CommandOutput, ProcessError> {
        let resolved = self.resolve_command(spec)?;
        let mut output = self.runner.run(&resolved, &self.cancel).await?;
        if !self.run.credentials().is_empty() {
            output.stdout = self.run.redact(&output.stdout);
            output.stderr = self.run.redact(&output.stderr);
        }
        Ok(output)
    }
}

impl std::fmt::Debug for StageContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StageContext")
            .field("stage_name", &self.stage_name)
            .field("pipeline", &self.run.pipeline_name())
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}
