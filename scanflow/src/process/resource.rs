//! Scoped resources attached to a stage.
//!
//! A resource is acquired right before its stage runs and released right
//! after, whatever the stage's outcome. The executor registers each handle in a
//! [`CleanupRegistry`](crate::cancellation::CleanupRegistry) so release happens
//! in LIFO order under a timeout.

use super::CommandSpec;
use crate::context::StageContext;
use crate::errors::{Result, ScanflowError};
use async_trait::async_trait;
use tracing::{debug, warn};

/// A resource that lives exactly as long as one stage invocation.
#[async_trait]
pub trait ScopedResource: Send + Sync {
    /// Resource name used in logs, events, and errors.
    fn name(&self) -> &str;

    /// Acquires the resource. Failing here fails the stage without running it.
    async fn acquire(&self, ctx: &StageContext) -> Result<Box<dyn ResourceHandle>>;
}

/// A live resource, released exactly once.
#[async_trait]
pub trait ResourceHandle: Send {
    /// Releases the resource.
    async fn release(self: Box<Self>) -> anyhow::Result<()>;
}

/// An auxiliary container (or any external service) driven by commands.
///
/// The cleanup command must be idempotent: it runs before `start` to clear
/// leftovers of an earlier run, and again at release. Its failures are logged
/// only.
#[derive(Debug, Clone)]
pub struct AuxiliaryContainer {
    name: String,
    start: CommandSpec,
    cleanup: CommandSpec,
}

impl AuxiliaryContainer {
    /// Creates a container resource from explicit start and cleanup commands.
    #[must_use]
    pub fn new(name: impl Into<String>, start: CommandSpec, cleanup: CommandSpec) -> Self {
        Self {
            name: name.into(),
            start,
            cleanup,
        }
    }

    /// Creates a detached `docker run` container removed with `docker rm -f`.
    #[must_use]
    pub fn docker<I, S>(name: impl Into<String>, image: impl Into<String>, run_args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let name = name.into();
        let start = CommandSpec::new("docker")
            .args(["run", "-d", "--name"])
            .arg(name.clone())
            .args(run_args)
            .arg(image);
        let cleanup = CommandSpec::new("docker").args(["rm", "-f"]).arg(name.clone());
        Self::new(name, start, cleanup)
    }

    /// Returns the start command.
    #[must_use]
    pub fn start_command(&self) -> &CommandSpec {
        &self.start
    }

    /// Returns the cleanup command.
    #[must_use]
    pub fn cleanup_command(&self) -> &CommandSpec {
        &self.cleanup
    }
}

async fn run_cleanup(ctx: &StageContext, resource: &str, cleanup: &CommandSpec) {
    match ctx.run_command(cleanup).await {
        Ok(out) if out.success() => debug!(resource, "Cleanup command succeeded"),
        Ok(out) => debug!(
            resource,
            exit_code = ?out.exit_code,
            "Cleanup command exited non-zero (nothing to clean?)"
        ),
        Err(e) => warn!(resource, error = %e, "Cleanup command failed"),
    }
}

#[async_trait]
impl ScopedResource for AuxiliaryContainer {
    fn name(&self) -> &str {
        &self.name
    }

    async fn acquire(&self, ctx: &StageContext) -> Result<Box<dyn ResourceHandle>> {
        run_cleanup(ctx, &self.name, &self.cleanup).await;

        let output = ctx.run_command(&self.start).await?;
        if !output.success() {
            return Err(ScanflowError::resource(
                &self.name,
                format!(
                    "start command exited with {:?}: {}",
                    output.exit_code,
                    output.stderr.trim()
                ),
            ));
        }

        Ok(Box::new(ContainerHandle {
            name: self.name.clone(),
            cleanup: self.cleanup.clone(),
            ctx: ctx.detached(),
        }))
    }
}

struct ContainerHandle {
    name: String,
    cleanup: CommandSpec,
    ctx: StageContext,
}

#[async_trait]
impl ResourceHandle for ContainerHandle {
    async fn release(self: Box<Self>) -> anyhow::Result<()> {
        run_cleanup(&self.ctx, &self.name, &self.cleanup).await;
        Ok(())
    }
}
