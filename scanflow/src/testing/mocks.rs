//! Stages with scripted behavior for tests.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::context::StageContext;
use crate::core::{Artifact, StageOutput};
use crate::stages::Stage;

/// A stage that returns a configurable output and counts calls.
#[derive(Debug)]
pub struct MockStage {
    name: String,
    output: Mutex<StageOutput>,
    call_count: AtomicUsize,
}

impl MockStage {
    /// Creates a mock stage that succeeds.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self::returning(name, StageOutput::success())
    }

    /// Creates a mock stage returning `output`.
    #[must_use]
    pub fn returning(name: impl Into<String>, output: StageOutput) -> Self {
        Self {
            name: name.into(),
            output: Mutex::new(output),
            call_count: AtomicUsize::new(0),
        }
    }

    /// Creates a mock stage that fails with `error`.
    #[must_use]
    pub fn failing(name: impl Into<String>, error: impl Into<String>) -> Self {
        Self::returning(name, StageOutput::fail(error).with_exit_code(1))
    }

    /// Creates a mock stage that ends unstable with `warning`.
    #[must_use]
    pub fn unstable(name: impl Into<String>, warning: impl Into<String>) -> Self {
        Self::returning(name, StageOutput::unstable(warning))
    }

    /// Sets the output to return.
    pub fn set_output(&self, output: StageOutput) {
        *self.output.lock() = output;
    }

    /// Returns the number of times the stage was called.
    #[must_use]
    pub fn call_count(&self) -> usize {
        self.call_count.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Stage for MockStage {
    fn name(&self) -> &str {
        &self.name
    }

    async fn execute(&self, _ctx: &StageContext) -> StageOutput {
        self.call_count.fetch_add(1, Ordering::SeqCst);
        self.output.lock().clone()
    }
}

/// A stage that sleeps, then succeeds. Cancellation interrupts the sleep.
#[derive(Debug)]
pub struct SlowStage {
    name: String,
    delay: Duration,
}

impl SlowStage {
    /// Creates a new slow stage.
    #[must_use]
    pub fn new(name: impl Into<String>, delay: Duration) -> Self {
        Self {
            name: name.into(),
            delay,
        }
    }

    /// Creates a slow stage with delay in milliseconds.
    #[must_use]
    pub fn with_delay_ms(name: impl Into<String>, ms: u64) -> Self {
        Self::new(name, Duration::from_millis(ms))
    }
}

#[async_trait]
impl Stage for SlowStage {
    fn name(&self) -> &str {
        &self.name
    }

    async fn execute(&self, ctx: &StageContext) -> StageOutput {
        tokio::select! {
            () = tokio::time::sleep(self.delay) => StageOutput::success(),
            () = ctx.cancellation().cancelled() => StageOutput::cancel("interrupted"),
        }
    }
}

/// A stage that panics.
#[derive(Debug)]
pub struct PanickingStage {
    name: String,
}

impl PanickingStage {
    /// Creates a new panicking stage.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

#[async_trait]
impl Stage for PanickingStage {
    fn name(&self) -> &str {
        &self.name
    }

    async fn execute(&self, _ctx: &StageContext) -> StageOutput {
        panic!("stage '{}' blew up", self.name)
    }
}

/// A stage that writes a file into the workspace, then returns a fixed output.
#[derive(Debug)]
pub struct FileWritingStage {
    name: String,
    path: String,
    contents: String,
    output: StageOutput,
}

impl FileWritingStage {
    /// Creates a stage writing `contents` to `path` (relative to the workspace).
    #[must_use]
    pub fn new(name: impl Into<String>, path: impl Into<String>, contents: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
            contents: contents.into(),
            output: StageOutput::success(),
        }
    }

    /// Sets the output returned after writing.
    #[must_use]
    pub fn returning(mut self, output: StageOutput) -> Self {
        self.output = output;
        self
    }
}

#[async_trait]
impl Stage for FileWritingStage {
    fn name(&self) -> &str {
        &self.name
    }

    async fn execute(&self, ctx: &StageContext) -> StageOutput {
        let target = ctx.run().workspace().join(&self.path);
        if let Some(parent) = target.parent() {
            if let Err(e) = tokio::fs::create_dir_all(parent).await {
                return StageOutput::fail(e.to_string());
            }
        }
        match tokio::fs::write(&target, &self.contents).await {
            Ok(()) => self
                .output
                .clone()
                .with_artifact(Artifact::new(&self.path, &self.path, &self.name)),
            Err(e) => StageOutput::fail(e.to_string()),
        }
    }
}

/// A stage that records each invocation into a shared journal.
///
/// Several recording stages can share one journal to assert execution order.
#[derive(Debug)]
pub struct RecordingStage {
    name: String,
    journal: Arc<Mutex<Vec<String>>>,
    output: StageOutput,
}

impl RecordingStage {
    /// Creates a recording stage with its own journal.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self::with_journal(name, Arc::new(Mutex::new(Vec::new())))
    }

    /// Creates a recording stage writing into `journal`.
    #[must_use]
    pub fn with_journal(name: impl Into<String>, journal: Arc<Mutex<Vec<String>>>) -> Self {
        Self {
            name: name.into(),
            journal,
            output: StageOutput::success(),
        }
    }

    /// Sets the output returned on each invocation.
    #[must_use]
    pub fn returning(mut self, output: StageOutput) -> Self {
        self.output = output;
        self
    }

    /// Returns the journal.
    #[must_use]
    pub fn journal(&self) -> Arc<Mutex<Vec<String>>> {
        self.journal.clone()
    }

    /// Returns how many times this stage ran.
    #[must_use]
    pub fn execution_count(&self) -> usize {
        self.journal.lock().iter().filter(|n| **n == self.name).count()
    }
}

#[async_trait]
impl Stage for RecordingStage {
    fn name(&self) -> &str {
        &self.name
    }

    async fn execute(&self, _ctx: &StageContext) -> StageOutput {
        self.journal.lock().push(self.name.clone());
        self.output.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::StageStatus;
    use crate::testing::stage_context;

    #[tokio::test]
    async fn test_mock_stage() {
        let stage = MockStage::failing("build", "compile error");
        let output = stage.execute(&stage_context("build")).await;

        assert_eq!(output.status, StageStatus::Failed);
        assert_eq!(output.exit_code, Some(1));
        assert_eq!(stage.call_count(), 1);

        stage.set_output(StageOutput::success());
        assert!(stage.execute(&stage_context("build")).await.is_success());
    }

    #[tokio::test]
    async fn test_recording_stages_share_journal() {
        let journal = Arc::new(Mutex::new(Vec::new()));
        let a = RecordingStage::with_journal("a", journal.clone());
        let b = RecordingStage::with_journal("b", journal.clone());

        a.execute(&stage_context("a")).await;
        b.execute(&stage_context("b")).await;
        a.execute(&stage_context("a")).await;

        assert_eq!(*journal.lock(), vec!["a", "b", "a"]);
        assert_eq!(a.execution_count(), 2);
    }

    #[tokio::test]
    async fn test_slow_stage_observes_cancellation() {
        let ctx = stage_context("slow");
        ctx.cancellation().cancel("stop");
        let output = SlowStage::with_delay_ms("slow", 5_000).execute(&ctx).await;
        assert_eq!(output.status, StageStatus::Cancelled);
    }
}
