//! Long-lived background processes scoped to a stage.

use super::{CommandSpec, ResourceHandle, ScopedResource};
use crate::context::StageContext;
use crate::errors::{ProcessError, Result, ScanflowError};
use async_trait::async_trait;
use std::process::Stdio;
use std::time::{Duration, Instant};
use tokio::net::TcpStream;
use tokio::process::{Child, Command};
use tracing::{debug, info};

/// How to decide that a background process is ready to serve.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Readiness {
    /// Ready as soon as it is spawned.
    Immediate,
    /// Ready after a fixed delay.
    Delay(Duration),
    /// Ready once a TCP connection to `addr` succeeds.
    Tcp {
        /// Address to probe, e.g. `127.0.0.1:8080`.
        addr: String,
        /// Give up after this long.
        timeout: Duration,
        /// Wait this long between probes.
        interval: Duration,
    },
}

impl Readiness {
    /// TCP readiness with a 30s timeout and 250ms probe interval.
    #[must_use]
    pub fn tcp(addr: impl Into<String>) -> Self {
        Self::Tcp {
            addr: addr.into(),
            timeout: Duration::from_secs(30),
            interval: Duration::from_millis(250),
        }
    }
}

/// A process started before its stage and killed when the stage completes.
///
/// Typical use is the application under test for a dynamic scan. The child is
/// spawned with `kill_on_drop`, so even a dropped handle terminates it.
#[derive(Debug, Clone)]
pub struct BackgroundProcess {
    name: String,
    command: CommandSpec,
    readiness: Readiness,
}

impl BackgroundProcess {
    /// Creates a background process resource.
    #[must_use]
    pub fn new(name: impl Into<String>, command: CommandSpec) -> Self {
        Self {
            name: name.into(),
            command,
            readiness: Readiness::Immediate,
        }
    }

    /// Sets the readiness probe.
    #[must_use]
    pub fn with_readiness(mut self, readiness: Readiness) -> Self {
        self.readiness = readiness;
        self
    }

    /// Returns the command.
    #[must_use]
    pub fn command(&self) -> &CommandSpec {
        &self.command
    }

    fn spawn(&self, ctx: &StageContext) -> std::result::Result<Child, ProcessError> {
        let spec = ctx.resolve_command(&self.command)?;
        let mut command = Command::new(&spec.program);
        command
            .args(&spec.args)
            .envs(&spec.env)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true);
        if let Some(cwd) = &spec.cwd {
            command.current_dir(cwd);
        }
        command.spawn().map_err(|source| ProcessError::Spawn {
            program: spec.program.clone(),
            source,
        })
    }

    async fn wait_ready(&self, child: &mut Child, ctx: &StageContext) -> Result<()> {
        match &self.readiness {
            Readiness::Immediate => Ok(()),
            Readiness::Delay(delay) => {
                tokio::time::sleep(*delay).await;
                self.ensure_running(child)
            }
            Readiness::Tcp {
                addr,
                timeout,
                interval,
            } => {
                let started = Instant::now();
                loop {
                    self.ensure_running(child)?;
                    if TcpStream::connect(addr.as_str()).await.is_ok() {
                        debug!(resource = %self.name, %addr, "Readiness probe succeeded");
                        return Ok(());
                    }
                    if ctx.is_cancelled() {
                        return Err(ScanflowError::cancelled(ctx.cancellation().reason()));
                    }
                    if started.elapsed() >= *timeout {
                        return Err(ScanflowError::resource(
                            &self.name,
                            format!("not listening on {addr} after {timeout:?}"),
                        ));
                    }
                    tokio::time::sleep(*interval).await;
                }
            }
        }
    }

    fn ensure_running(&self, child: &mut Child) -> Result<()> {
        match child.try_wait()? {
            Some(status) => Err(ScanflowError::resource(
                &self.name,
                format!("exited before becoming ready ({status})"),
            )),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl ScopedResource for BackgroundProcess {
    fn name(&self) -> &str {
        &self.name
    }

    async fn acquire(&self, ctx: &StageContext) -> Result<Box<dyn ResourceHandle>> {
        let mut child = self.spawn(ctx)?;
        let pid = child.id();
        let shown = ctx.run().redact(&self.command.to_string());
        info!(resource = %self.name, pid = ?pid, command = %shown, "Started background process");

        if let Err(e) = self.wait_ready(&mut child, ctx).await {
            // Child is killed when dropped.
            let _ = child.start_kill();
            return Err(e);
        }

        Ok(Box::new(BackgroundHandle {
            name: self.name.clone(),
            child,
        }))
    }
}

struct BackgroundHandle {
    name: String,
    child: Child,
}

#[async_trait]
impl ResourceHandle for BackgroundHandle {
    async fn release(self: Box<Self>) -> anyhow::Result<()> {
        let BackgroundHandle { name, mut child } = *self;
        if child.try_wait()?.is_none() {
            child.start_kill()?;
        }
        let status = child.wait().await?;
        info!(resource = %name, %status, "Stopped background process");
        Ok(())
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::testing::{stage_context, ScriptedRunner, TestRun};
    use std::sync::Arc;

    fn pid_alive(pid: u32) -> bool {
        std::process::Command::new("kill")
            .args(["-0", &pid.to_string()])
            .status()
            .map(|s| s.success())
            .unwrap_or(false)
    }

    #[tokio::test]
    async fn test_release_terminates_process() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = TestRun::new()
            .workspace(dir.path())
            .stage_context("dast", Arc::new(ScriptedRunner::new()));
        let app = BackgroundProcess::new(
            "app",
            CommandSpec::shell("echo $$ > app.pid; exec sleep 30"),
        )
        .with_readiness(Readiness::Delay(Duration::from_millis(200)));

        let handle = app.acquire(&ctx).await.unwrap();
        let pid: u32 = std::fs::read_to_string(dir.path().join("app.pid"))
            .unwrap()
            .trim()
            .parse()
            .unwrap();
        assert!(pid_alive(pid));

        handle.release().await.unwrap();
        assert!(!pid_alive(pid));
    }

    #[tokio::test]
    async fn test_process_exiting_early_is_not_ready() {
        let app = BackgroundProcess::new("app", CommandSpec::new("true"))
            .with_readiness(Readiness::Delay(Duration::from_millis(200)));

        let err = app.acquire(&stage_context("dast")).await.err().unwrap();
        assert!(err.to_string().contains("exited before becoming ready"));
    }

    #[tokio::test]
    async fn test_missing_program_fails_to_spawn() {
        let app = BackgroundProcess::new("app", CommandSpec::new("scanflow-no-such-binary"));

        let err = app.acquire(&stage_context("dast")).await.err().unwrap();
        assert!(matches!(err, ScanflowError::Process(ProcessError::Spawn { .. })));
    }

    #[tokio::test]
    async fn test_tcp_readiness_times_out() {
        let app = BackgroundProcess::new("app", CommandSpec::new("sleep").arg("30")).with_readiness(
            Readiness::Tcp {
                addr: "127.0.0.1:1".to_string(),
                timeout: Duration::from_millis(200),
                interval: Duration::from_millis(50),
            },
        );

        let err = app.acquire(&stage_context("dast")).await.err().unwrap();
        assert!(err.to_string().contains("not listening on 127.0.0.1:1"));
    }

    #[tokio::test]
    async fn test_cancelled_readiness_wait_reports_cancellation() {
        let ctx = stage_context("dast");
        ctx.cancellation().cancel("user abort");
        let app = BackgroundProcess::new("app", CommandSpec::new("sleep").arg("30"))
            .with_readiness(Readiness::tcp("127.0.0.1:1"));

        let err = app.acquire(&ctx).await.err().unwrap();
        assert!(matches!(err, ScanflowError::Cancelled(ref reason) if reason == "user abort"));
    }

    #[tokio::test]
    async fn test_bound_credential_reaches_process_env() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = TestRun::new()
            .workspace(dir.path())
            .credential("APP_SECRET", "s3cr3t")
            .stage_context("dast", Arc::new(ScriptedRunner::new()));
        let app = BackgroundProcess::new(
            "app",
            CommandSpec::shell("printf %s \"$APP_KEY\" > key.txt; exec sleep 30")
                .env_credential("APP_KEY", "APP_SECRET"),
        )
        .with_readiness(Readiness::Delay(Duration::from_millis(200)));

        let handle = app.acquire(&ctx).await.unwrap();
        handle.release().await.unwrap();

        assert_eq!(std::fs::read_to_string(dir.path().join("key.txt")).unwrap(), "s3cr3t");
    }
}
