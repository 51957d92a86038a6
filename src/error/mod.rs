// Error types for the vocal trainer engine
//
// This module defines custom error types for audio acquisition and exercise
// execution, providing structured error handling with numeric error codes that
// front-ends can match on without parsing messages.

mod audio;
mod exercise;

pub use audio::{log_audio_error, AudioError, AudioErrorCodes};
pub use exercise::{log_exercise_error, ExerciseError, ExerciseErrorCodes};

/// Error codes for structured error reporting
///
/// This trait provides a standard way to get error codes and messages
/// from custom error types, enabling consistent error reporting across
/// the session event streams and the CLI.
pub trait ErrorCode {
    /// Get the numeric error code
    fn code(&self) -> i32;

    /// Get the human-readable error message
    fn message(&self) -> String;
}
