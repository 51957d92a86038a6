//! Backend abstractions for the vocal training engine.
//!
//! An [`AudioBackend`] is the only way a session reaches the microphone or
//! speaker. Sessions receive one as an `Arc<dyn AudioBackend>` so tests can
//! swap in the deterministic [`StubBackend`].

use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;

use crate::audio::SampleBuffer;
use crate::config::AppConfig;
use crate::error::AudioError;

/// Callback invoked once per captured buffer.
///
/// Runs on whichever thread the backend delivers audio from and must only
/// enqueue; it never blocks.
pub type CaptureCallback = Box<dyn FnMut(SampleBuffer) + Send + 'static>;

/// Trait implemented by platform audio backends.
///
/// Call order for a session is `initialize`, `request_permissions`,
/// `start_capture`, any number of `play_note`, then `stop_capture` and
/// `dispose`.
pub trait AudioBackend: Send + Sync {
    fn initialize(&self) -> Result<(), AudioError>;

    /// `Ok(false)` means the user refused microphone access.
    fn request_permissions(&self) -> Result<bool, AudioError>;

    fn start_capture(&self, callback: CaptureCallback) -> Result<(), AudioError>;

    fn stop_capture(&self) -> Result<(), AudioError>;

    /// Start playing the reference tone for `note` (e.g. "C4").
    ///
    /// Returns once playback is scheduled; callers wait `duration` themselves.
    fn play_note(&self, note: &str, duration: Duration) -> Result<(), AudioError>;

    /// Rate of the capture stream, which may change once capture starts.
    fn sample_rate(&self) -> u32;

    /// Release every device resource. Safe to call more than once.
    fn dispose(&self);
}

/// Trait representing a monotonic time source used for telemetry timestamps.
pub trait TimeSource: Send + Sync {
    fn now(&self) -> Instant;
}

/// Default time source backed by the tokio clock.
///
/// Follows a paused test clock, so timestamps line up with session timers.
#[derive(Default)]
pub struct SystemTimeSource {
    _unit: (),
}

impl TimeSource for SystemTimeSource {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

#[cfg(feature = "desktop_audio")]
mod cpal;
#[cfg(feature = "desktop_audio")]
pub use self::cpal::CpalBackend;

mod stub;
pub use stub::{StubBackend, StubSinger, StubTimeSource};

cfg_if::cfg_if! {
    if #[cfg(feature = "desktop_audio")] {
        /// Backend used when no backend is injected: the default input and
        /// output devices through cpal.
        pub fn default_backend(config: &AppConfig) -> Arc<dyn AudioBackend> {
            Arc::new(CpalBackend::new(config.audio.clone()))
        }
    } else {
        /// Backend used when no backend is injected. Without the
        /// `desktop_audio` feature there is no device, so the stub delivers
        /// silence at the configured rate.
        pub fn default_backend(config: &AppConfig) -> Arc<dyn AudioBackend> {
            Arc::new(
                StubBackend::new(StubSinger::Silent)
                    .with_sample_rate(config.estimator.sample_rate)
                    .with_buffer_size(config.audio.buffer_size)
                    .with_interval(Duration::from_millis(config.audio.stub_interval_ms)),
            )
        }
    }
}
