//! Pipeline event type for lifecycle notifications.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// An event emitted during a run.
///
/// Events are consumed by event sinks for logging or monitoring. The
/// executor builds them through the named constructors below so the payload
/// keys stay consistent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineEvent {
    /// The event type (e.g., "stage.started", "gate.timeout").
    #[serde(rename = "type")]
    pub event_type: String,

    /// When the event occurred (ISO 8601).
    pub timestamp: String,

    /// The event payload data.
    #[serde(default)]
    pub data: HashMap<String, serde_json::Value>,
}

impl PipelineEvent {
    /// Creates a new event.
    #[must_use]
    pub fn new(event_type: impl Into<String>) -> Self {
        Self {
            event_type: event_type.into(),
            timestamp: crate::utils::iso_timestamp(),
            data: HashMap::new(),
        }
    }

    /// Adds a data field to the event.
    #[must_use]
    pub fn add_data(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.data.insert(key.into(), value);
        self
    }

    /// Converts the payload to a JSON object.
    #[must_use]
    pub fn payload(&self) -> serde_json::Value {
        let map: serde_json::Map<String, serde_json::Value> =
            self.data.clone().into_iter().collect();
        serde_json::Value::Object(map)
    }

    /// Creates a "stage.started" event.
    #[must_use]
    pub fn stage_started(stage_name: &str) -> Self {
        Self::new("stage.started").add_data("stage", serde_json::json!(stage_name))
    }

    /// Creates a "stage.skipped" event.
    #[must_use]
    pub fn stage_skipped(stage_name: &str, reason: &str) -> Self {
        Self::new("stage.skipped")
            .add_data("stage", serde_json::json!(stage_name))
            .add_data("reason", serde_json::json!(reason))
    }

    /// Creates a "pipeline.started" event.
    #[must_use]
    pub fn pipeline_started(pipeline: &str, stage_count: usize) -> Self {
        Self::new("pipeline.started")
            .add_data("pipeline", serde_json::json!(pipeline))
            .add_data("stage_count", serde_json::json!(stage_count))
    }

    /// Creates a "pipeline.completed" event.
    #[must_use]
    pub fn pipeline_completed(pipeline: &str, status: &str, duration_ms: f64) -> Self {
        Self::new("pipeline.completed")
            .add_data("pipeline", serde_json::json!(pipeline))
            .add_data("status", serde_json::json!(status))
            .add_data("duration_ms", serde_json::json!(duration_ms))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_creation() {
        let event = PipelineEvent::new("test.event");
        assert_eq!(event.event_type, "test.event");
        assert!(event.data.is_empty());
    }

    #[test]
    fn test_stage_started() {
        let event = PipelineEvent::stage_started("build");
        assert_eq!(event.event_type, "stage.started");
        assert_eq!(event.data.get("stage"), Some(&serde_json::json!("build")));
    }

    #[test]
    fn test_pipeline_completed_payload() {
        let event = PipelineEvent::pipeline_completed("security", "failed", 12.5);
        let payload = event.payload();
        assert_eq!(payload["status"], serde_json::json!("failed"));
        assert_eq!(payload["duration_ms"], serde_json::json!(12.5));
    }
}
