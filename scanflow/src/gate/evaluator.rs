//! Poll-with-timeout evaluation of a gate source.

use super::{GateSource, GateVerdict};
use crate::config::GateConfig;
use crate::context::StageContext;
use crate::core::{GateResult, PipelineEvent};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::time::Instant;
use tracing::{info, warn};

/// How long to wait on a gate and what an unresolved or failed gate means.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GatePolicy {
    /// Total time to wait for a verdict.
    pub timeout: Duration,
    /// Delay between polls.
    pub poll_interval: Duration,
    /// Whether a timeout aborts the run. A failed verdict follows the same rule.
    pub abort_on_timeout: bool,
}

impl Default for GatePolicy {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(60),
            poll_interval: Duration::from_secs(5),
            abort_on_timeout: false,
        }
    }
}

impl GatePolicy {
    /// Sets the timeout.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Sets the poll interval.
    #[must_use]
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Sets whether an unresolved or failed gate aborts the run.
    #[must_use]
    pub fn aborting(mut self, abort: bool) -> Self {
        self.abort_on_timeout = abort;
        self
    }
}

impl From<&GateConfig> for GatePolicy {
    fn from(config: &GateConfig) -> Self {
        Self {
            timeout: Duration::from_secs(config.timeout_seconds),
            poll_interval: Duration::from_secs(config.poll_interval_seconds),
            abort_on_timeout: config.abort_on_timeout,
        }
    }
}

/// Polls a gate source until it resolves or the policy's timeout elapses.
#[derive(Debug, Clone, Copy, Default)]
pub struct GateEvaluator {
    policy: GatePolicy,
}

impl GateEvaluator {
    /// Creates an evaluator.
    #[must_use]
    pub fn new(policy: GatePolicy) -> Self {
        Self { policy }
    }

    /// Returns the policy.
    #[must_use]
    pub fn policy(&self) -> &GatePolicy {
        &self.policy
    }

    /// Waits for a verdict.
    ///
    /// Poll errors are logged and treated as pending. Cancellation ends the
    /// wait early with a timed-out result; callers check the token.
    pub async fn evaluate(&self, source: &dyn GateSource, ctx: &StageContext) -> GateResult {
        let name = source.name().to_string();
        let aborts = self.policy.abort_on_timeout;
        let deadline = Instant::now() + self.policy.timeout;
        let mut polls = 0_u32;
        let mut last_error: Option<String> = None;

        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            polls += 1;

            let verdict = match tokio::time::timeout(remaining, source.poll()).await {
                Ok(Ok(verdict)) => verdict,
                Ok(Err(e)) => {
                    warn!(gate = %name, error = %e, "Gate poll failed, treating as pending");
                    last_error = Some(e.to_string());
                    GateVerdict::Pending
                }
                Err(_) => GateVerdict::Pending,
            };

            ctx.emit(
                PipelineEvent::new("gate.polled")
                    .add_data("gate", serde_json::json!(name))
                    .add_data("poll", serde_json::json!(polls))
                    .add_data("verdict", serde_json::json!(verdict.to_string())),
            );

            match verdict {
                GateVerdict::Passed => {
                    info!(gate = %name, polls, "Gate passed");
                    return GateResult::passed(name, polls);
                }
                GateVerdict::Failed(detail) => {
                    warn!(gate = %name, polls, %detail, aborts, "Gate failed");
                    return GateResult::failed(name, polls, aborts).with_detail(detail);
                }
                GateVerdict::Pending => {}
            }

            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() || ctx.is_cancelled() {
                break;
            }

            let pause = self.policy.poll_interval.min(remaining);
            tokio::select! {
                () = tokio::time::sleep(pause) => {}
                () = ctx.cancellation().cancelled() => break,
            }
        }

        warn!(
            gate = %name,
            polls,
            timeout = ?self.policy.timeout,
            aborts,
            "Gate wait timed out"
        );
        ctx.emit(
            PipelineEvent::new("gate.timeout")
                .add_data("gate", serde_json::json!(name))
                .add_data("polls", serde_json::json!(polls))
                .add_data("aborts", serde_json::json!(aborts)),
        );
        let result = GateResult::timed_out(name, polls, aborts);
        match last_error {
            Some(error) => result.with_detail(error),
            None => result,
        }
    }
}
