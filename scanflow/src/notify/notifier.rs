//! Notifier trait and built-in notifiers.

use super::Notification;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::path::PathBuf;
use tracing::{info, warn};

/// File name used by [`JsonFileNotifier`].
pub const NOTIFICATION_FILE: &str = "notification.json";

/// A channel that receives the final run notification.
///
/// Errors are opaque: the executor logs them and records a `notify.failed`
/// event, and never lets them change the run status.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Returns the notifier name.
    fn name(&self) -> &str;

    /// Delivers the notification.
    async fn send(&self, notification: &Notification) -> anyhow::Result<()>;
}

/// Writes the notification to the log.
#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingNotifier;

#[async_trait]
impl Notifier for LoggingNotifier {
    fn name(&self) -> &str {
        "log"
    }

    async fn send(&self, notification: &Notification) -> anyhow::Result<()> {
        if notification.status.is_success() {
            info!(
                subject = %notification.subject(),
                attachments = notification.attachments.len(),
                url = notification.run_url.as_deref().unwrap_or(""),
                "Pipeline finished"
            );
        } else {
            warn!(
                subject = %notification.subject(),
                reason = notification.abort_reason.as_deref().unwrap_or(""),
                attachments = notification.attachments.len(),
                url = notification.run_url.as_deref().unwrap_or(""),
                "Pipeline finished"
            );
        }
        Ok(())
    }
}

/// Writes the notification as JSON into a directory.
#[derive(Debug, Clone)]
pub struct JsonFileNotifier {
    dir: PathBuf,
}

impl JsonFileNotifier {
    /// Creates a notifier writing `notification.json` into `dir`.
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Returns the file the notification is written to.
    #[must_use]
    pub fn path(&self) -> PathBuf {
        self.dir.join(NOTIFICATION_FILE)
    }
}

#[async_trait]
impl Notifier for JsonFileNotifier {
    fn name(&self) -> &str {
        "json-file"
    }

    async fn send(&self, notification: &Notification) -> anyhow::Result<()> {
        tokio::fs::create_dir_all(&self.dir).await?;
        let json = serde_json::to_vec_pretty(notification)?;
        tokio::fs::write(self.path(), json).await?;
        Ok(())
    }
}

/// Keeps every notification in memory.
#[derive(Debug, Default)]
pub struct CollectingNotifier {
    received: Mutex<Vec<Notification>>,
}

impl CollectingNotifier {
    /// Creates an empty collector.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the notifications received so far.
    #[must_use]
    pub fn received(&self) -> Vec<Notification> {
        self.received.lock().clone()
    }

    /// Returns how many notifications were received.
    #[must_use]
    pub fn count(&self) -> usize {
        self.received.lock().len()
    }
}

#[async_trait]
impl Notifier for CollectingNotifier {
    fn name(&self) -> &str {
        "collecting"
    }

    async fn send(&self, notification: &Notification) -> anyhow::Result<()> {
        self.received.lock().push(notification.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregate::ResultAggregator;
    use crate::context::{RunContext, RunIdentity};
    use crate::core::PipelineStatus;
    use crate::pipeline::FailureSummary;
    use pretty_assertions::assert_eq;

    fn notification(status: PipelineStatus) -> Notification {
        let run = RunContext::builder("security")
            .identity(
                RunIdentity::new()
                    .with_build_number(42)
                    .with_triggered_by("alice")
                    .with_run_url("https://ci.example/job/42"),
            )
            .build();
        Notification::from_run(&ResultAggregator::new(&run).finish(status, FailureSummary::default()))
    }

    #[test]
    fn test_subject_and_fields() {
        let n = notification(PipelineStatus::Failed);
        assert_eq!(n.subject(), "[FAILED] security #42");
        assert_eq!(n.triggered_by.as_deref(), Some("alice"));
        assert_eq!(n.run_url.as_deref(), Some("https://ci.example/job/42"));
        assert!(n.attachments.is_empty());
    }

    #[tokio::test]
    async fn test_json_file_notifier_writes_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let notifier = JsonFileNotifier::new(dir.path().join("reports"));

        notifier.send(&notification(PipelineStatus::Success)).await.unwrap();

        let written: Notification =
            serde_json::from_slice(&std::fs::read(notifier.path()).unwrap()).unwrap();
        assert_eq!(written.status, PipelineStatus::Success);
        assert_eq!(written.run, "#42");
    }

    #[tokio::test]
    async fn test_collecting_and_logging_notifiers() {
        let collector = CollectingNotifier::new();
        collector.send(&notification(PipelineStatus::Cancelled)).await.unwrap();
        LoggingNotifier.send(&notification(PipelineStatus::Cancelled)).await.unwrap();

        assert_eq!(collector.count(), 1);
        assert_eq!(collector.received()[0].status, PipelineStatus::Cancelled);
    }

    #[tokio::test]
    async fn test_mock_notifier() {
        let mut mock = MockNotifier::new();
        mock.expect_name().return_const("mock".to_string());
        mock.expect_send()
            .times(1)
            .returning(|_| Err(anyhow::anyhow!("smtp down")));

        let err = mock.send(&notification(PipelineStatus::Success)).await.unwrap_err();
        assert_eq!(err.to_string(), "smtp down");
        assert_eq!(mock.name(), "mock");
    }
}
