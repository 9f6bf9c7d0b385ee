//! Assertions for stage outputs and run records.

use crate::aggregate::PipelineRun;
use crate::core::{PipelineStatus, StageOutput, StageStatus};

/// Asserts that the output has the expected status.
pub fn assert_output_status(output: &StageOutput, expected: StageStatus) {
    assert_eq!(
        output.status, expected,
        "Expected status {:?}, got {:?} (error: {:?})",
        expected, output.status, output.error
    );
}

/// Asserts that the output indicates failure.
pub fn assert_output_failed(output: &StageOutput) {
    assert!(
        output.is_failure(),
        "Expected failure, got status: {:?}",
        output.status
    );
}

/// Asserts the run ended with `expected`.
pub fn assert_run_status(run: &PipelineRun, expected: PipelineStatus) {
    assert_eq!(
        run.status, expected,
        "Expected run status {:?}, got {:?} (abort reason: {:?})",
        expected, run.status, run.failures.abort_reason
    );
}

/// Asserts a stage of the run ended with `expected`.
pub fn assert_stage_status(run: &PipelineRun, stage: &str, expected: StageStatus) {
    let Some(record) = run.stage(stage) else {
        panic!("Stage '{stage}' is not in the run record");
    };
    assert_eq!(
        record.status, expected,
        "Expected stage '{stage}' to be {:?}, got {:?} (error: {:?}, reason: {:?})",
        expected, record.status, record.error, record.skip_reason
    );
}

/// Asserts every named stage was skipped.
pub fn assert_stages_skipped(run: &PipelineRun, stages: &[&str]) {
    for stage in stages {
        assert_stage_status(run, stage, StageStatus::Skipped);
    }
}

/// Asserts `expected` appears in `actual` in order, allowing other entries between.
pub fn assert_subsequence(actual: &[String], expected: &[&str]) {
    let mut remaining = actual.iter();
    for wanted in expected {
        assert!(
            remaining.any(|a| a == wanted),
            "Expected '{wanted}' in order within {actual:?}"
        );
    }
}
