//! A stage that waits on a gate.

use super::{GateEvaluator, GatePolicy, GateSource};
use crate::context::StageContext;
use crate::core::StageOutput;
use crate::stages::Stage;
use async_trait::async_trait;
use std::sync::Arc;

/// Waits on a gate source and turns the verdict into a stage result.
///
/// A pass is a success. A failure or timeout is a failure when the policy
/// aborts, and an unstable warning otherwise, so a non-aborting gate never
/// changes the run's final status.
#[derive(Clone)]
pub struct GateStage {
    name: String,
    source: Arc<dyn GateSource>,
    evaluator: GateEvaluator,
}

impl GateStage {
    /// Creates a gate stage.
    #[must_use]
    pub fn new(name: impl Into<String>, source: impl GateSource + 'static, policy: GatePolicy) -> Self {
        Self::from_arc(name, Arc::new(source), policy)
    }

    /// Creates a gate stage from a shared source.
    #[must_use]
    pub fn from_arc(name: impl Into<String>, source: Arc<dyn GateSource>, policy: GatePolicy) -> Self {
        Self {
            name: name.into(),
            source,
            evaluator: GateEvaluator::new(policy),
        }
    }
}

impl std::fmt::Debug for GateStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GateStage")
            .field("name", &self.name)
            .field("source", &self.source.name())
            .field("policy", self.evaluator.policy())
            .finish()
    }
}

#[async_trait]
impl Stage for GateStage {
    fn name(&self) -> &str {
        &self.name
    }

    async fn execute(&self, ctx: &StageContext) -> StageOutput {
        let result = self.evaluator.evaluate(self.source.as_ref(), ctx).await;

        if ctx.is_cancelled() && !result.passed {
            return StageOutput::cancel("gate wait interrupted").with_gate(result);
        }

        if result.passed {
            return StageOutput::success().with_gate(result);
        }

        let what = if result.timed_out {
            format!("gate '{}' gave no verdict within {:?}", result.source, self.evaluator.policy().timeout)
        } else {
            format!(
                "gate '{}' failed ({})",
                result.source,
                result.detail.as_deref().unwrap_or("no detail")
            )
        };

        if result.aborts {
            StageOutput::fail(what).with_gate(result)
        } else {
            StageOutput::unstable(format!("{what}; continuing")).with_gate(result)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::StageStatus;
    use crate::gate::{GateVerdict, SequenceGateSource};
    use crate::testing::stage_context;
    use std::time::Duration;

    fn policy(abort: bool) -> GatePolicy {
        GatePolicy::default()
            .with_timeout(Duration::from_millis(30))
            .with_poll_interval(Duration::from_millis(10))
            .aborting(abort)
    }

    #[tokio::test]
    async fn test_timeout_without_abort_is_unstable() {
        let stage = GateStage::new("quality-gate", SequenceGateSource::never("sonar"), policy(false));
        let output = stage.execute(&stage_context("quality-gate")).await;

        assert_eq!(output.status, StageStatus::Unstable);
        assert!(output.gate.as_ref().unwrap().timed_out);
        assert!(output.error.unwrap().contains("continuing"));
    }

    #[tokio::test]
    async fn test_timeout_with_abort_fails() {
        let stage = GateStage::new("quality-gate", SequenceGateSource::never("sonar"), policy(true));
        let output = stage.execute(&stage_context("quality-gate")).await;

        assert_eq!(output.status, StageStatus::Failed);
        assert!(output.gate.unwrap().aborts);
    }

    #[tokio::test]
    async fn test_pass() {
        let source = SequenceGateSource::new("sonar", vec![GateVerdict::Passed]);
        let stage = GateStage::new("quality-gate", source, policy(true));
        let output = stage.execute(&stage_context("quality-gate")).await;
        assert_eq!(output.status, StageStatus::Success);
    }
}
