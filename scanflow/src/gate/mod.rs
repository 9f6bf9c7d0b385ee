//! External gate evaluation.
//!
//! A gate is an asynchronous verdict from an external system (typically a
//! code-quality server). The [`GateEvaluator`] polls a [`GateSource`] until it
//! resolves or a timeout elapses; the [`GatePolicy`] decides whether an
//! unresolved or failed gate aborts the run.

mod evaluator;
#[cfg(feature = "http-gate")]
mod http;
mod source;
mod stage;

pub use evaluator::{GateEvaluator, GatePolicy};
#[cfg(feature = "http-gate")]
pub use http::HttpGateSource;
#[cfg(test)]
pub use source::MockGateSource;
pub use source::{FnGateSource, GateSource, GateVerdict, SequenceGateSource};
pub use stage::GateStage;
