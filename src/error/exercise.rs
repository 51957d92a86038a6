// Exercise error types and constants

use crate::error::{AudioError, ErrorCode};
use log::error;
use std::fmt;

/// Exercise error code constants
///
/// Error code range: 3001-3008
pub struct ExerciseErrorCodes {}

impl ExerciseErrorCodes {
    /// Exercise has no notes or no breathing rounds
    pub const EMPTY_EXERCISE: i32 = 3001;

    /// A note index in the run has no matching note
    pub const MISSING_NOTE: i32 = 3002;

    /// Tempo must be greater than 0 BPM
    pub const INVALID_TEMPO: i32 = 3003;

    /// Breathing round carries an invalid inhale/exhale length
    pub const INVALID_ROUND: i32 = 3004;

    /// Exercise kind does not match the requested session type
    pub const WRONG_KIND: i32 = 3005;

    /// A session is already running on this engine
    pub const ALREADY_RUNNING: i32 = 3006;

    /// No session is running on this engine
    pub const NOT_RUNNING: i32 = 3007;

    /// The audio capability could not be established
    pub const ACQUISITION_FAILED: i32 = 3008;
}

/// Log an exercise error with structured context
pub fn log_exercise_error(err: &ExerciseError, context: &str) {
    error!(
        "Exercise error in {}: code={}, component=ExerciseSession, message={}",
        context,
        err.code(),
        err.message()
    );
}

/// Exercise-related errors
///
/// Data errors (malformed exercises) and lifecycle errors for sessions.
/// Acquisition failures from the audio capability are wrapped so a session
/// surfaces a single error type.
///
/// Error code ranges: 3001-3008
#[derive(Debug, Clone, PartialEq)]
pub enum ExerciseError {
    /// Exercise has no notes or no breathing rounds
    EmptyExercise { exercise_id: String },

    /// A note index in the run has no matching note
    MissingNote { index: usize },

    /// Tempo must be greater than 0 BPM
    InvalidTempo { bpm: u32 },

    /// Breathing round has a zero-length inhale or exhale
    InvalidRound { index: usize, reason: String },

    /// Exercise kind does not match the requested session type
    WrongKind { exercise_id: String, expected: String },

    /// A session is already running on this engine
    AlreadyRunning,

    /// No session is running on this engine
    NotRunning,

    /// The audio capability could not be established
    Acquisition(AudioError),
}

impl ErrorCode for ExerciseError {
    fn code(&self) -> i32 {
        match self {
            ExerciseError::EmptyExercise { .. } => ExerciseErrorCodes::EMPTY_EXERCISE,
            ExerciseError::MissingNote { .. } => ExerciseErrorCodes::MISSING_NOTE,
            ExerciseError::InvalidTempo { .. } => ExerciseErrorCodes::INVALID_TEMPO,
            ExerciseError::InvalidRound { .. } => ExerciseErrorCodes::INVALID_ROUND,
            ExerciseError::WrongKind { .. } => ExerciseErrorCodes::WRONG_KIND,
            ExerciseError::AlreadyRunning => ExerciseErrorCodes::ALREADY_RUNNING,
            ExerciseError::NotRunning => ExerciseErrorCodes::NOT_RUNNING,
            ExerciseError::Acquisition(_) => ExerciseErrorCodes::ACQUISITION_FAILED,
        }
    }

    fn message(&self) -> String {
        match self {
            ExerciseError::EmptyExercise { exercise_id } => {
                format!("Exercise '{}' has nothing to run", exercise_id)
            }
            ExerciseError::MissingNote { index } => {
                format!("No note at index {}", index)
            }
            ExerciseError::InvalidTempo { bpm } => {
                format!("Tempo must be greater than 0 BPM (got {})", bpm)
            }
            ExerciseError::InvalidRound { index, reason } => {
                format!("Invalid breathing round {}: {}", index, reason)
            }
            ExerciseError::WrongKind {
                exercise_id,
                expected,
            } => {
                format!("Exercise '{}' is not a {} exercise", exercise_id, expected)
            }
            ExerciseError::AlreadyRunning => {
                "An exercise is already running. Call stop_exercise() first.".to_string()
            }
            ExerciseError::NotRunning => "No exercise is running".to_string(),
            ExerciseError::Acquisition(err) => {
                format!("Audio acquisition failed: {}", err.message())
            }
        }
    }
}

impl fmt::Display for ExerciseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "ExerciseError (code {}): {}",
            self.code(),
            self.message()
        )
    }
}

impl std::error::Error for ExerciseError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ExerciseError::Acquisition(err) => Some(err),
            _ => None,
        }
    }
}

impl From<AudioError> for ExerciseError {
    fn from(err: AudioError) -> Self {
        ExerciseError::Acquisition(err)
    }
}
