//! Deterministic synthetic signals for the stub backend and tests.
//!
//! These sources stand in for a microphone: a steady sine for a held note,
//! seeded white noise for breath and room tone, and a `SineOscillator` that
//! keeps phase across buffers so consecutive captures splice without
//! discontinuities.

use rand::{rngs::StdRng, Rng, SeedableRng};
use std::f32::consts::PI;

/// One-shot sine buffer starting at phase 0.
pub fn sine_wave(frequency_hz: f32, sample_rate: u32, len: usize, amplitude: f32) -> Vec<f32> {
    let mut oscillator = SineOscillator::new(sample_rate);
    let mut buffer = vec![0.0; len];
    oscillator.fill(frequency_hz, amplitude, &mut buffer);
    buffer
}

/// Seeded white noise in `[-amplitude, amplitude)`.
pub fn white_noise(len: usize, amplitude: f32, seed: u64) -> Vec<f32> {
    let mut rng = StdRng::seed_from_u64(seed);
    let amplitude = amplitude.abs();
    if amplitude == 0.0 {
        return vec![0.0; len];
    }
    (0..len).map(|_| rng.gen_range(-amplitude..amplitude)).collect()
}

/// Phase-continuous sine generator.
#[derive(Debug, Clone)]
pub struct SineOscillator {
    sample_rate: u32,
    phase: f32,
}

impl SineOscillator {
    pub fn new(sample_rate: u32) -> Self {
        Self {
            sample_rate,
            phase: 0.0,
        }
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn set_sample_rate(&mut self, sample_rate: u32) {
        self.sample_rate = sample_rate;
    }

    /// Overwrite `buffer` with the next stretch of the waveform.
    pub fn fill(&mut self, frequency_hz: f32, amplitude: f32, buffer: &mut [f32]) {
        if self.sample_rate == 0 || frequency_hz <= 0.0 {
            buffer.fill(0.0);
            return;
        }

        let step = frequency_hz / self.sample_rate as f32;
        for sample in buffer.iter_mut() {
            *sample = (2.0 * PI * self.phase).sin() * amplitude;
            self.phase += step;
            if self.phase >= 1.0 {
                self.phase -= self.phase.floor();
            }
        }
    }

    pub fn reset(&mut self) {
        self.phase = 0.0;
    }
}

/// Add seeded noise to an existing buffer in place.
pub fn add_noise(buffer: &mut [f32], amplitude: f32, rng: &mut StdRng) {
    let amplitude = amplitude.abs();
    if amplitude == 0.0 {
        return;
    }
    for sample in buffer.iter_mut() {
        *sample += rng.gen_range(-amplitude..amplitude);
    }
}
