//! A scripted command runner.

use crate::cancellation::CancellationToken;
use crate::errors::ProcessError;
use crate::process::{CommandOutput, CommandRunner, CommandSpec};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::time::Duration;

#[derive(Debug, Clone)]
enum Scripted {
    Output(CommandOutput),
    Delayed(Duration, CommandOutput),
    SpawnError,
    Hang,
}

/// A [`CommandRunner`] that replays scripted results per program.
///
/// Results queued for a program are consumed in order; the last one repeats.
/// Programs without a script exit 0 with empty output.
#[derive(Debug, Default)]
pub struct ScriptedRunner {
    scripts: Mutex<HashMap<String, VecDeque<Scripted>>>,
    invocations: Mutex<Vec<CommandSpec>>,
}

impl ScriptedRunner {
    /// Creates a runner where every program succeeds.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn push(self, program: impl Into<String>, scripted: Scripted) -> Self {
        self.scripts
            .lock()
            .entry(program.into())
            .or_default()
            .push_back(scripted);
        self
    }

    /// Queues an output for `program`.
    #[must_use]
    pub fn on(self, program: impl Into<String>, output: CommandOutput) -> Self {
        self.push(program, Scripted::Output(output))
    }

    /// Queues an exit code for `program`.
    #[must_use]
    pub fn exit(self, program: impl Into<String>, code: i32) -> Self {
        self.on(program, CommandOutput::with_code(code))
    }

    /// Queues an output delivered after `delay`, unless cancelled first.
    #[must_use]
    pub fn delayed(self, program: impl Into<String>, delay: Duration, output: CommandOutput) -> Self {
        self.push(program, Scripted::Delayed(delay, output))
    }

    /// Makes `program` fail to launch.
    #[must_use]
    pub fn spawn_error(self, program: impl Into<String>) -> Self {
        self.push(program, Scripted::SpawnError)
    }

    /// Makes `program` run until the run is cancelled.
    #[must_use]
    pub fn hang(self, program: impl Into<String>) -> Self {
        self.push(program, Scripted::Hang)
    }

    /// Returns every command run so far, formatted as `program args`.
    #[must_use]
    pub fn invocations(&self) -> Vec<String> {
        self.invocations.lock().iter().map(ToString::to_string).collect()
    }

    /// Returns every command run so far.
    #[must_use]
    pub fn specs(&self) -> Vec<CommandSpec> {
        self.invocations.lock().clone()
    }

    /// Returns how many times `program` was run.
    #[must_use]
    pub fn count(&self, program: &str) -> usize {
        self.invocations
            .lock()
            .iter()
            .filter(|s| s.program == program)
            .count()
    }

    fn next(&self, program: &str) -> Option<Scripted> {
        let mut scripts = self.scripts.lock();
        let queue = scripts.get_mut(program)?;
        if queue.len() > 1 {
            queue.pop_front()
        } else {
            queue.front().cloned()
        }
    }
}

#[async_trait]
impl CommandRunner for ScriptedRunner {
    async fn run(
        &self,
        spec: &CommandSpec,
        cancel: &CancellationToken,
    ) -> Result<CommandOutput, ProcessError> {
        self.invocations.lock().push(spec.clone());
        let program = spec.program.clone();
        if cancel.is_cancelled() {
            return Err(ProcessError::Cancelled { program });
        }

        match self.next(&program) {
            None => Ok(CommandOutput::with_code(0)),
            Some(Scripted::Output(output)) => Ok(output),
            Some(Scripted::Delayed(delay, output)) => {
                tokio::select! {
                    () = tokio::time::sleep(delay) => Ok(output),
                    () = cancel.cancelled() => Err(ProcessError::Cancelled { program }),
                }
            }
            Some(Scripted::SpawnError) => Err(ProcessError::Spawn {
                program,
                source: std::io::Error::new(std::io::ErrorKind::NotFound, "No such file or directory"),
            }),
            Some(Scripted::Hang) => {
                cancel.cancelled().await;
                Err(ProcessError::Cancelled { program })
            }
        }
    }
}
