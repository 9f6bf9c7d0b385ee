//! Testing utilities for scanflow pipelines.
//!
//! This module provides:
//! - A scripted command runner standing in for real processes
//! - Stages with scripted behavior
//! - Context fixtures
//! - Assertions for stage outputs and run records
//!
//! Scripted gate sources and the collecting notifier live with their traits:
//! [`SequenceGateSource`](crate::gate::SequenceGateSource) and
//! [`CollectingNotifier`](crate::notify::CollectingNotifier).

mod assertions;
mod fixtures;
mod mocks;
mod runner;

pub use assertions::{
    assert_output_failed, assert_output_status, assert_run_status, assert_stage_status,
    assert_stages_skipped, assert_subsequence,
};
pub use fixtures::{stage_context, stage_context_with_runner, TestRun};
pub use mocks::{FileWritingStage, MockStage, PanickingStage, RecordingStage, SlowStage};
pub use runner::ScriptedRunner;
