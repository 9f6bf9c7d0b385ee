//! Gate sources: external systems that deliver an asynchronous verdict.

use crate::errors::GateError;
use async_trait::async_trait;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::fmt;

/// What a single poll of a gate source returned.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "verdict", content = "detail")]
pub enum GateVerdict {
    /// Analysis still running; poll again.
    Pending,
    /// The gate passed.
    Passed,
    /// The gate failed, with the source's status string.
    Failed(String),
}

impl fmt::Display for GateVerdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Passed => write!(f, "passed"),
            Self::Failed(detail) => write!(f, "failed ({detail})"),
        }
    }
}

/// An external system polled for a pass/fail verdict.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait GateSource: Send + Sync {
    /// Identifier of the tool or server, recorded in the gate result.
    fn name(&self) -> &str;

    /// Polls once.
    async fn poll(&self) -> Result<GateVerdict, GateError>;
}

/// A gate source backed by a closure, for embedding custom checks.
pub struct FnGateSource<F>
where
    F: Fn() -> Result<GateVerdict, GateError> + Send + Sync,
{
    name: String,
    func: F,
}

impl<F> FnGateSource<F>
where
    F: Fn() -> Result<GateVerdict, GateError> + Send + Sync,
{
    /// Creates a closure-backed source.
    pub fn new(name: impl Into<String>, func: F) -> Self {
        Self {
            name: name.into(),
            func,
        }
    }
}

#[async_trait]
impl<F> GateSource for FnGateSource<F>
where
    F: Fn() -> Result<GateVerdict, GateError> + Send + Sync,
{
    fn name(&self) -> &str {
        &self.name
    }

    async fn poll(&self) -> Result<GateVerdict, GateError> {
        (self.func)()
    }
}

/// A source that replays a fixed sequence of verdicts, then repeats the last.
#[derive(Debug)]
pub struct SequenceGateSource {
    name: String,
    verdicts: Mutex<Vec<GateVerdict>>,
    last: Mutex<GateVerdict>,
}

impl SequenceGateSource {
    /// Creates a source returning `verdicts` in order.
    #[must_use]
    pub fn new(name: impl Into<String>, verdicts: Vec<GateVerdict>) -> Self {
        let mut verdicts = verdicts;
        verdicts.reverse();
        Self {
            name: name.into(),
            verdicts: Mutex::new(verdicts),
            last: Mutex::new(GateVerdict::Pending),
        }
    }

    /// A source that never resolves.
    #[must_use]
    pub fn never(name: impl Into<String>) -> Self {
        Self::new(name, Vec::new())
    }
}

#[async_trait]
impl GateSource for SequenceGateSource {
    fn name(&self) -> &str {
        &self.name
    }

    async fn poll(&self) -> Result<GateVerdict, GateError> {
        let next = self.verdicts.lock().pop();
        match next {
            Some(verdict) => {
                *self.last.lock() = verdict.clone();
                Ok(verdict)
            }
            None => Ok(self.last.lock().clone()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_sequence_source_repeats_last() {
        let source = SequenceGateSource::new(
            "sonar",
            vec![GateVerdict::Pending, GateVerdict::Failed("ERROR".into())],
        );
        assert_eq!(source.poll().await.unwrap(), GateVerdict::Pending);
        assert_eq!(source.poll().await.unwrap(), GateVerdict::Failed("ERROR".into()));
        assert_eq!(source.poll().await.unwrap(), GateVerdict::Failed("ERROR".into()));
    }

    #[test]
    fn test_fn_source() {
        let source = FnGateSource::new("custom", || Ok(GateVerdict::Passed));
        assert_eq!(source.name(), "custom");
        let verdict = tokio_test::block_on(source.poll());
        assert_eq!(tokio_test::assert_ok!(verdict), GateVerdict::Passed);
    }

    #[test]
    fn test_verdict_display() {
        assert_eq!(GateVerdict::Failed("ERROR".into()).to_string(), "failed (ERROR)");
    }
}
