//! Stage trait and implementations.
//!
//! A stage is one named unit of work in a pipeline: a list of commands, a
//! wrapped tool, a gate wait, or arbitrary code.

mod command;
mod tool;

pub use command::CommandStage;
pub use tool::ToolStage;

use crate::context::StageContext;
use crate::core::StageOutput;
use async_trait::async_trait;
use std::fmt::Debug;

/// Trait for pipeline stages.
///
/// A stage reports its outcome through [`StageOutput`]; it never decides
/// whether the run continues. That is the job of the stage's failure policy.
#[async_trait]
pub trait Stage: Send + Sync + Debug {
    /// Returns the name of the stage.
    fn name(&self) -> &str;

    /// Executes the stage.
    async fn execute(&self, ctx: &StageContext) -> StageOutput;
}

/// A simple function-based stage.
pub struct FnStage<F>
where
    F: Fn(&StageContext) -> StageOutput + Send + Sync,
{
    name: String,
    func: F,
}

impl<F> FnStage<F>
where
    F: Fn(&StageContext) -> StageOutput + Send + Sync,
{
    /// Creates a new function-based stage.
    pub fn new(name: impl Into<String>, func: F) -> Self {
        Self {
            name: name.into(),
            func,
        }
    }
}

impl<F> Debug for FnStage<F>
where
    F: Fn(&StageContext) -> StageOutput + Send + Sync,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FnStage").field("name", &self.name).finish()
    }
}

#[async_trait]
impl<F> Stage for FnStage<F>
where
    F: Fn(&StageContext) -> StageOutput + Send + Sync,
{
    fn name(&self) -> &str {
        &self.name
    }

    async fn execute(&self, ctx: &StageContext) -> StageOutput {
        (self.func)(ctx)
    }
}

/// A stage that does nothing and succeeds.
#[derive(Debug, Clone)]
pub struct NoOpStage {
    name: String,
}

impl NoOpStage {
    /// Creates a new no-op stage.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

#[async_trait]
impl Stage for NoOpStage {
    fn name(&self) -> &str {
        &self.name
    }

    async fn execute(&self, _ctx: &StageContext) -> StageOutput {
        StageOutput::success()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::stage_context;

    #[tokio::test]
    async fn test_fn_stage() {
        let stage = FnStage::new("lint", |ctx| {
            StageOutput::success().add_metadata("stage", serde_json::json!(ctx.stage_name()))
        });
        assert_eq!(stage.name(), "lint");

        let output = stage.execute(&stage_context("lint")).await;
        assert!(output.is_success());
        assert_eq!(output.get("stage"), Some(&serde_json::json!("lint")));
    }

    #[tokio::test]
    async fn test_noop_stage() {
        let stage = NoOpStage::new("noop");
        let output = stage.execute(&stage_context("noop")).await;
        assert!(output.is_success());
    }
}
