//! Events published by running sessions.
//!
//! Every enum serializes as `{"type": ..., "payload": ...}` so the CLI can
//! print one JSON object per line.

use serde::{Deserialize, Serialize};

use crate::exercise::{ExerciseResults, Note, NoteResult};

/// Live pitch feedback for the note being sung.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PitchUpdate {
    pub frequency_hz: f32,
    /// Nearest note to the detected frequency
    pub note_name: String,
    pub confidence: f32,
    /// Accuracy of this single reading against the target, 0 when excluded
    pub accuracy_percent: f32,
    /// Smoothed deviation from the target for display
    pub smoothed_cents: i32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "snake_case")]
pub enum VocalEvent {
    NoteChanged { index: usize, note: Note },
    PitchDetected(PitchUpdate),
    NoteScored { index: usize, result: NoteResult },
    Completed(ExerciseResults),
    Error { code: i32, message: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BreathingPhase {
    Inhale,
    Hold,
    Exhale,
    Transition,
    Done,
}

impl BreathingPhase {
    pub fn label(&self) -> &'static str {
        match self {
            BreathingPhase::Inhale => "Breathe in",
            BreathingPhase::Hold => "Hold",
            BreathingPhase::Exhale => "Breathe out",
            BreathingPhase::Transition => "Get ready",
            BreathingPhase::Done => "Done",
        }
    }
}

/// `round` is the 1-based number of the round the event belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "snake_case")]
pub enum BreathingEvent {
    PhaseChanged {
        phase: BreathingPhase,
        duration_secs: u32,
        round: u32,
    },
    Tick {
        phase: BreathingPhase,
        remaining_secs: u32,
        round: u32,
    },
    RoundCompleted { round: u32 },
    Completed,
}
