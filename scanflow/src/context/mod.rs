//! Run and stage contexts.
//!
//! This module provides:
//! - [`RunIdentity`] for correlating a run with the CI system
//! - [`RunContext`], the immutable run-wide environment shared as `Arc`
//! - [`StageContext`], the per-invocation handle stages execute against

mod identity;
mod run;
mod stage;

pub use identity::RunIdentity;
pub use run::{
    Credentials, EnvironmentSnapshot, RunContext, RunContextBuilder, Secret, REDACTED,
};
pub use stage::StageContext;
