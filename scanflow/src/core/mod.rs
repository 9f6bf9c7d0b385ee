//! Core domain model types for scanflow.
//!
//! This module contains the fundamental types used throughout the engine:
//! - Stage status, pipeline status, and failure policy enums
//! - Stage output type with factory methods
//! - Artifacts, gate results, and events

mod artifact;
mod event;
mod gate_result;
mod output;
#[cfg(test)]
mod output_tests;
mod status;

pub use artifact::Artifact;
pub use event::PipelineEvent;
pub use gate_result::GateResult;
pub use output::StageOutput;
pub use status::{FailurePolicy, PipelineStatus, StageStatus};
