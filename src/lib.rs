// Vocal Trainer Core - pitch training engine
// Pitch estimation, note scoring and timed vocal/breathing exercises

// Module declarations
pub mod analysis;
pub mod audio;
pub mod config;
pub mod engine;
pub mod error;
pub mod exercise;
pub mod managers;
pub mod session;
pub mod telemetry;

// Re-exports for convenience
pub use analysis::{
    note_frequency, to_note, AccuracyBand, AccuracyScorer, NoteInfo, PitchEstimate,
    PitchEstimator, PitchSmoother,
};
pub use audio::SampleBuffer;
pub use config::AppConfig;
pub use engine::{AudioBackend, EngineHandle, RunReport};
pub use error::{AudioError, ErrorCode, ExerciseError};
pub use exercise::{Exercise, ExerciseResults, ExerciseSettings, Note, NoteResult};
pub use session::{
    BreathingEvent, BreathingPhaseMachine, BreathingSession, SessionOutcome, VocalEvent,
    VocalSession,
};
