//! The command runner seam and its tokio implementation.

use super::{CommandOutput, CommandSpec};
use crate::cancellation::CancellationToken;
use crate::errors::ProcessError;
use async_trait::async_trait;
use std::process::Stdio;
use std::time::Instant;
use tokio::process::Command;
use tracing::debug;

/// Runs external commands to completion.
#[async_trait]
pub trait CommandRunner: Send + Sync {
    /// Runs `spec`, capturing its output.
    ///
    /// A non-zero exit is not an error: it is reported through
    /// [`CommandOutput::exit_code`]. Errors mean the command could not be run,
    /// ran out of time, or was cancelled.
    async fn run(
        &self,
        spec: &CommandSpec,
        cancel: &CancellationToken,
    ) -> Result<CommandOutput, ProcessError>;
}

/// Runs commands as tokio child processes.
///
/// Children are spawned with `kill_on_drop`, so a timeout, a cancellation, or
/// a dropped future terminates the process.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioCommandRunner;

impl TokioCommandRunner {
    /// Creates a new runner.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl CommandRunner for TokioCommandRunner {
    async fn run(
        &self,
        spec: &CommandSpec,
        cancel: &CancellationToken,
    ) -> Result<CommandOutput, ProcessError> {
        let program = spec.program.clone();
        if cancel.is_cancelled() {
            return Err(ProcessError::Cancelled { program });
        }

        let started = Instant::now();
        let mut command = Command::new(&spec.program);
        command
            .args(&spec.args)
            .envs(&spec.env)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(cwd) = &spec.cwd {
            command.current_dir(cwd);
        }

        debug!(command = %spec, "Spawning command");
        let child = command.spawn().map_err(|source| ProcessError::Spawn {
            program: program.clone(),
            source,
        })?;

        let wait = async {
            let waited = match spec.timeout {
                Some(limit) => match tokio::time::timeout(limit, child.wait_with_output()).await {
                    Ok(waited) => waited,
                    Err(_) => {
                        return Err(ProcessError::Timeout {
                            program: program.clone(),
                            timeout: limit,
                        })
                    }
                },
                None => child.wait_with_output().await,
            };
            waited.map_err(|source| ProcessError::Io {
                program: program.clone(),
                source,
            })
        };

        let output = tokio::select! {
            result = wait => result?,
            () = cancel.cancelled() => {
                return Err(ProcessError::Cancelled { program: program.clone() });
            }
        };

        let result = CommandOutput {
            exit_code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            duration_ms: crate::utils::elapsed_ms(started),
        };
        debug!(
            command = %spec,
            exit_code = ?result.exit_code,
            duration_ms = result.duration_ms,
            "Command finished"
        );
        Ok(result)
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    #[tokio::test]
    async fn test_runs_and_captures_output() {
        let runner = TokioCommandRunner::new();
        let spec = CommandSpec::shell("echo out; echo err 1>&2; exit 3");
        let output = runner.run(&spec, &CancellationToken::new()).await.unwrap();

        assert_eq!(output.exit_code, Some(3));
        assert_eq!(output.stdout.trim(), "out");
        assert_eq!(output.stderr.trim(), "err");
    }

    #[tokio::test]
    async fn test_env_and_cwd() {
        let dir = tempfile::tempdir().unwrap();
        let spec = CommandSpec::shell("echo \"$GREETING\"; pwd")
            .env("GREETING", "hello")
            .cwd(dir.path());
        let output = TokioCommandRunner
            .run(&spec, &CancellationToken::new())
            .await
            .unwrap();

        let mut lines = output.stdout.lines();
        assert_eq!(lines.next(), Some("hello"));
        let pwd = std::fs::canonicalize(lines.next().unwrap()).unwrap();
        assert_eq!(pwd, std::fs::canonicalize(dir.path()).unwrap());
    }

    #[tokio::test]
    async fn test_spawn_failure() {
        let spec = CommandSpec::new("definitely-not-a-real-binary-4711");
        let err = TokioCommandRunner
            .run(&spec, &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, ProcessError::Spawn { .. }));
    }

    #[tokio::test]
    async fn test_timeout_kills_command() {
        let spec = CommandSpec::new("sleep")
            .arg("5")
            .timeout(Duration::from_millis(50));
        let started = Instant::now();
        let err = TokioCommandRunner
            .run(&spec, &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, ProcessError::Timeout { .. }));
        assert!(started.elapsed() < Duration::from_secs(2));
    }

    #[tokio::test]
    async fn test_cancellation_interrupts_command() {
        let token = Arc::new(CancellationToken::new());
        let canceller = token.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            canceller.cancel("user abort");
        });

        let err = TokioCommandRunner
            .run(&CommandSpec::new("sleep").arg("5"), &token)
            .await
            .unwrap_err();
        assert!(matches!(err, ProcessError::Cancelled { .. }));
    }
}
