//! JSON output for emitting results to stdout.

use serde::Serialize;
use std::io::{self, Write};
use std::sync::atomic::{AtomicBool, Ordering};

/// Global flag to enable JSON output mode.
static JSON_MODE_ENABLED: AtomicBool = AtomicBool::new(false);

/// Enable JSON output mode.
pub fn enable_json_mode() {
    JSON_MODE_ENABLED.store(true, Ordering::SeqCst);
}

/// Check if JSON mode is enabled.
pub fn is_json_mode() -> bool {
    JSON_MODE_ENABLED.load(Ordering::SeqCst)
}

/// JSON event types that can be emitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum JsonEventType {
    ChunkPlan,
    RunCompleted,
    RunFailed,
    CompareSummary,
    BenchSummary,
}

/// A JSON event to be output to stdout.
#[derive(Debug, Clone, Serialize)]
pub struct JsonEvent {
    pub event: JsonEventType,
    pub timestamp: String,
    pub data: serde_json::Value,
}

impl JsonEvent {
    /// Create a new JSON event with the current timestamp.
    pub fn new(event: JsonEventType, data: serde_json::Value) -> Self {
        Self {
            event,
            timestamp: chrono::Utc::now().to_rfc3339(),
            data,
        }
    }

    /// Output this event as a JSON line to stdout.
    pub fn emit(&self) {
        if !is_json_mode() {
            return;
        }
        if let Ok(json) = serde_json::to_string(self) {
            let mut stdout = io::stdout().lock();
            let _ = writeln!(stdout, "{}", json);
            let _ = stdout.flush();
        }
    }
}

/// Emit any serializable payload as an event.
pub fn emit<T: Serialize>(event: JsonEventType, data: &T) {
    if !is_json_mode() {
        return;
    }
    match serde_json::to_value(data) {
        Ok(value) => JsonEvent::new(event, value).emit(),
        Err(e) => tracing::warn!(error = %e, "Failed to serialize JSON event"),
    }
}

/// Emit a run_failed event.
pub fn emit_run_failed(policy: &str, error: &str) {
    JsonEvent::new(
        JsonEventType::RunFailed,
        serde_json::json!({
            "policy": policy,
            "error": error,
        }),
    )
    .emit();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_shape() {
        let event = JsonEvent::new(JsonEventType::RunCompleted, serde_json::json!({"value": 66}));
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["event"], "run_completed");
        assert_eq!(json["data"]["value"], 66);
        assert!(json["timestamp"].as_str().unwrap().contains('T'));
    }
}
