// Audio module - sample buffers, reference tones and PCM helpers

#[cfg(feature = "desktop_audio")]
pub mod buffer_pool;
pub mod signals;
pub mod tone;
pub mod wav;

use serde::{Deserialize, Serialize};

pub use tone::{beat_duration, generate_reference_tone, samples_per_beat};

/// Mono samples in [-1, 1] plus the rate that produced them
///
/// Produced once per capture callback and consumed synchronously by the
/// session loop.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SampleBuffer {
    pub samples: Vec<f32>,
    pub sample_rate: u32,
}

impl SampleBuffer {
    pub fn new(samples: Vec<f32>, sample_rate: u32) -> Self {
        Self {
            samples,
            sample_rate,
        }
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Length of the buffer in milliseconds
    pub fn duration_ms(&self) -> f32 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.samples.len() as f32 * 1000.0 / self.sample_rate as f32
    }
}
