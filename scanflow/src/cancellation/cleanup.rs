//! LIFO release registry for scoped resources.

use parking_lot::Mutex;
use std::future::Future;
use std::pin::Pin;
use std::time::Duration;
use tracing::{debug, warn};

/// A boxed async release callback.
pub type ReleaseCallback =
    Box<dyn FnOnce() -> Pin<Box<dyn Future<Output = anyhow::Result<()>> + Send>> + Send>;

/// Outcome of running a registry.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CleanupReport {
    /// Names of callbacks that completed, in execution order.
    pub completed: Vec<String>,
    /// Names and reasons of callbacks that failed or timed out.
    pub failed: Vec<(String, String)>,
}

impl CleanupReport {
    /// Returns true if every callback completed.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Registry of release callbacks executed in LIFO order.
///
/// Resources acquired first are released last, so a stage that starts a
/// container and then a server inside it tears them down server-first.
#[derive(Default)]
pub struct CleanupRegistry {
    callbacks: Mutex<Vec<(String, ReleaseCallback)>>,
}

impl CleanupRegistry {
    /// Creates a new cleanup registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a release callback.
    pub fn register<F, Fut>(&self, name: impl Into<String>, callback: F)
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        let boxed: ReleaseCallback = Box::new(move || Box::pin(callback()));
        self.callbacks.lock().push((name.into(), boxed));
    }

    /// Returns the number of pending callbacks.
    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.callbacks.lock().len()
    }

    /// Runs all callbacks in LIFO order, each bounded by `per_callback`.
    ///
    /// Failures are collected and never stop later callbacks. The registry is
    /// empty afterwards.
    pub async fn run_all(&self, per_callback: Duration) -> CleanupReport {
        let callbacks: Vec<_> = std::mem::take(&mut *self.callbacks.lock());
        let mut report = CleanupReport::default();

        for (name, callback) in callbacks.into_iter().rev() {
            match tokio::time::timeout(per_callback, callback()).await {
                Ok(Ok(())) => {
                    debug!(resource = %name, "Released");
                    report.completed.push(name);
                }
                Ok(Err(e)) => {
                    warn!(resource = %name, error = %e, "Release failed");
                    report.failed.push((name, e.to_string()));
                }
                Err(_) => {
                    warn!(resource = %name, timeout = ?per_callback, "Release timed out");
                    report.failed.push((name, "Timeout".to_string()));
                }
            }
        }

        report
    }
}

impl std::fmt::Debug for CleanupRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CleanupRegistry")
            .field("pending_count", &self.pending_count())
            .finish()
    }
}
