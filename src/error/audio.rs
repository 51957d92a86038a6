// Audio error types and constants

use crate::error::ErrorCode;
use log::error;
use std::fmt;

/// Audio error code constants
///
/// Single source of truth for the numeric codes carried by [`AudioError`]
/// and surfaced through session error events.
///
/// Error code range: 1001-1010
pub struct AudioErrorCodes {}

impl AudioErrorCodes {
    /// Audio capability was used before `initialize()` succeeded
    pub const NOT_INITIALIZED: i32 = 1001;

    /// Microphone permission denied
    pub const PERMISSION_DENIED: i32 = 1002;

    /// Failed to open audio stream
    pub const STREAM_OPEN_FAILED: i32 = 1003;

    /// Hardware error occurred
    pub const HARDWARE_ERROR: i32 = 1004;

    /// Capture is already running
    pub const ALREADY_CAPTURING: i32 = 1005;

    /// Capture is not running
    pub const NOT_CAPTURING: i32 = 1006;

    /// Sample rate outside the supported range
    pub const SAMPLE_RATE_INVALID: i32 = 1007;

    /// Mutex/RwLock was poisoned
    pub const LOCK_POISONED: i32 = 1008;

    /// Reference tone could not be played
    pub const PLAYBACK_FAILED: i32 = 1009;

    /// Audio stream disconnected or channel closed unexpectedly
    pub const STREAM_FAILURE: i32 = 1010;
}

/// Log an audio error with structured context
///
/// This function logs audio errors with structured fields including:
/// - error_code: Numeric error code for programmatic handling
/// - component: The component where the error occurred
/// - message: Human-readable error message
/// - context: Additional contextual information
pub fn log_audio_error(err: &AudioError, context: &str) {
    error!(
        "Audio error in {}: code={}, component=AudioBackend, message={}",
        context,
        err.code(),
        err.message()
    );
}

/// Audio-related errors
///
/// These errors cover the audio capability: initialization, permissions,
/// capture stream management and reference tone playback. Any of them
/// raised while establishing a session aborts the run.
///
/// Error code ranges: 1001-1010
#[derive(Debug, Clone, PartialEq)]
pub enum AudioError {
    /// Audio capability was used before `initialize()` succeeded
    NotInitialized,

    /// Microphone permission denied
    PermissionDenied,

    /// Failed to open audio stream
    StreamOpenFailed { reason: String },

    /// Hardware error occurred
    HardwareError { details: String },

    /// Capture is already running
    AlreadyCapturing,

    /// Capture is not running
    NotCapturing,

    /// Sample rate outside [8000, 96000] Hz
    SampleRateInvalid { rate: u32 },

    /// Mutex/RwLock was poisoned
    LockPoisoned { component: String },

    /// Reference tone could not be played
    PlaybackFailed { note: String, reason: String },

    /// Stream channel disconnected unexpectedly
    StreamFailure { reason: String },
}

impl ErrorCode for AudioError {
    fn code(&self) -> i32 {
        match self {
            AudioError::NotInitialized => AudioErrorCodes::NOT_INITIALIZED,
            AudioError::PermissionDenied => AudioErrorCodes::PERMISSION_DENIED,
            AudioError::StreamOpenFailed { .. } => AudioErrorCodes::STREAM_OPEN_FAILED,
            AudioError::HardwareError { .. } => AudioErrorCodes::HARDWARE_ERROR,
            AudioError::AlreadyCapturing => AudioErrorCodes::ALREADY_CAPTURING,
            AudioError::NotCapturing => AudioErrorCodes::NOT_CAPTURING,
            AudioError::SampleRateInvalid { .. } => AudioErrorCodes::SAMPLE_RATE_INVALID,
            AudioError::LockPoisoned { .. } => AudioErrorCodes::LOCK_POISONED,
            AudioError::PlaybackFailed { .. } => AudioErrorCodes::PLAYBACK_FAILED,
            AudioError::StreamFailure { .. } => AudioErrorCodes::STREAM_FAILURE,
        }
    }

    fn message(&self) -> String {
        match self {
            AudioError::NotInitialized => {
                "Audio backend not initialized. Call initialize() first.".to_string()
            }
            AudioError::PermissionDenied => {
                "Microphone permission denied. Please grant microphone access.".to_string()
            }
            AudioError::StreamOpenFailed { reason } => {
                format!("Failed to open audio stream: {}", reason)
            }
            AudioError::HardwareError { details } => {
                format!("Hardware error: {}", details)
            }
            AudioError::AlreadyCapturing => {
                "Microphone capture already running. Call stop_capture() first.".to_string()
            }
            AudioError::NotCapturing => {
                "Microphone capture not running. Call start_capture() first.".to_string()
            }
            AudioError::SampleRateInvalid { rate } => {
                format!("Sample rate {} Hz outside supported range 8000-96000 Hz", rate)
            }
            AudioError::LockPoisoned { component } => {
                format!("Lock poisoned on {}", component)
            }
            AudioError::PlaybackFailed { note, reason } => {
                format!("Failed to play reference note {}: {}", note, reason)
            }
            AudioError::StreamFailure { reason } => {
                format!("Audio stream failed: {}", reason)
            }
        }
    }
}

impl fmt::Display for AudioError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "AudioError::{:?} (code {}): {}",
            self,
            self.code(),
            self.message()
        )
    }
}

impl std::error::Error for AudioError {}

impl From<std::io::Error> for AudioError {
    fn from(err: std::io::Error) -> Self {
        AudioError::HardwareError {
            details: err.to_string(),
        }
    }
}
