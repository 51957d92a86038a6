//! Telemetry event types describing session lifecycle and device
//! adjustments, exposed to the CLI and engine subscribers.

use serde::{Deserialize, Serialize};

/// Telemetry event emitted by the engine and its sessions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TelemetryEvent {
    /// Milliseconds since the collector was created
    pub timestamp_ms: u64,
    pub kind: TelemetryEventKind,
    pub detail: Option<String>,
}

/// Types of telemetry events supported by the core.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TelemetryEventKind {
    SessionStarted { exercise_id: String },
    SessionStopped { exercise_id: String },
    /// `overall_accuracy` is only set for vocal drills
    SessionCompleted {
        exercise_id: String,
        overall_accuracy: Option<f32>,
    },
    SessionFailed { exercise_id: String, code: i32 },
    SampleRateAdjusted { from_hz: u32, to_hz: u32 },
    Warning,
}
