//! Tests for `StageOutput`.

use super::*;
use pretty_assertions::assert_eq;

#[test]
fn test_success_output() {
    let output = StageOutput::success();
    assert_eq!(output.status, StageStatus::Success);
    assert!(output.is_success());
    assert!(!output.is_failure());
    assert!(output.exit_code.is_none());
}

#[test]
fn test_unstable_output_keeps_warning() {
    let output = StageOutput::unstable("3 medium findings").with_exit_code(2);
    assert_eq!(output.status, StageStatus::Unstable);
    assert_eq!(output.error.as_deref(), Some("3 medium findings"));
    assert_eq!(output.exit_code, Some(2));
    assert!(output.is_success());
}

#[test]
fn test_fail_output() {
    let output = StageOutput::fail("mvn exited with 1").with_exit_code(1);
    assert_eq!(output.status, StageStatus::Failed);
    assert!(output.is_failure());
    assert_eq!(output.error.as_deref(), Some("mvn exited with 1"));
}

#[test]
fn test_skip_and_cancel() {
    let skip = StageOutput::skip("guard was false");
    assert_eq!(skip.status, StageStatus::Skipped);
    assert_eq!(skip.skip_reason.as_deref(), Some("guard was false"));

    let cancel = StageOutput::cancel("user abort");
    assert_eq!(cancel.status, StageStatus::Cancelled);
    assert!(cancel.is_failure());
}

#[test]
fn test_with_streams_and_artifact() {
    let output = StageOutput::success()
        .with_streams("built", "warning: deprecated")
        .with_artifact(Artifact::new("jar", "target/app.jar", "build"));

    assert_eq!(output.stdout, "built");
    assert_eq!(output.stderr, "warning: deprecated");
    assert_eq!(output.artifacts.len(), 1);
}

#[test]
fn test_with_gate() {
    let output = StageOutput::unstable("gate timed out")
        .with_gate(GateResult::timed_out("sonarqube", 12, false));
    let gate = output.gate.as_ref().unwrap();
    assert!(gate.timed_out);
    assert_eq!(gate.source, "sonarqube");
}

#[test]
fn test_metadata() {
    let output = StageOutput::success().add_metadata("steps", serde_json::json!(2));
    assert_eq!(output.get("steps"), Some(&serde_json::json!(2)));
}

#[test]
fn test_serialization_skips_empty_fields() {
    let output = StageOutput::success();
    let json = serde_json::to_value(&output).unwrap();
    assert_eq!(json, serde_json::json!({"status": "success"}));

    let back: StageOutput = serde_json::from_value(json).unwrap();
    assert_eq!(back.status, StageStatus::Success);
}
