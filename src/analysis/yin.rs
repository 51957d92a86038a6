// PitchEstimator - YIN fundamental frequency estimation
//
// This module implements the YIN algorithm (de Cheveigné & Kawahara) for
// monophonic pitch tracking of a sung voice. Each call analyses one buffer
// independently; the only state carried between calls is the scratch array
// and the sample rate.
//
// Algorithm:
// 1. Difference function: d(τ) = Σ_{i<N/2} (x[i] - x[i+τ])², τ ∈ [0, N/2)
// 2. Cumulative mean normalization: d'(0) = 1, d'(τ) = d(τ)·τ / Σ_{j=1..τ} d(j)
// 3. Absolute threshold: first τ ≥ 2 with d'(τ) < threshold, then walk down
//    to the local minimum
// 4. Parabolic interpolation around the minimum for sub-sample precision
// 5. frequency = sample_rate / τ, confidence = 1 - clamp(d'(τ), 0, 1)

use serde::{Deserialize, Serialize};

use crate::config::EstimatorConfig;
use crate::error::AudioError;

/// Lowest sample rate accepted by [`PitchEstimator::update_sample_rate`]
pub const MIN_SAMPLE_RATE: u32 = 8_000;
/// Highest sample rate accepted by [`PitchEstimator::update_sample_rate`]
pub const MAX_SAMPLE_RATE: u32 = 96_000;
/// Default d'(τ) threshold
pub const DEFAULT_THRESHOLD: f32 = 0.15;

/// Buffers shorter than this are not analysed
const MIN_BUFFER_LEN: usize = 4;
/// Lags 0 and 1 are never candidates
const FIRST_CANDIDATE_LAG: usize = 2;

/// Result of one estimation
///
/// `frequency_hz == 0.0` means no pitch was found; confidence is then 0 too.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct PitchEstimate {
    pub frequency_hz: f32,
    /// 0.0-1.0
    pub confidence: f32,
}

impl PitchEstimate {
    pub const UNPITCHED: PitchEstimate = PitchEstimate {
        frequency_hz: 0.0,
        confidence: 0.0,
    };

    pub fn is_pitched(&self) -> bool {
        self.frequency_hz > 0.0
    }
}

/// YIN estimator owning its difference-function scratch array
///
/// One instance per session; never share an instance across concurrent
/// audio callbacks.
#[derive(Debug, Clone)]
pub struct PitchEstimator {
    sample_rate: u32,
    threshold: f32,
    scratch: Vec<f32>,
}

impl PitchEstimator {
    /// Create an estimator with the default threshold
    ///
    /// # Arguments
    /// * `sample_rate` - Sample rate of the buffers passed to `estimate`
    pub fn new(sample_rate: u32) -> Self {
        Self::with_config(sample_rate, &EstimatorConfig::default())
    }

    /// Create an estimator with explicit configuration parameters
    pub fn with_config(sample_rate: u32, config: &EstimatorConfig) -> Self {
        Self {
            sample_rate,
            threshold: config.threshold,
            scratch: Vec::with_capacity(config.buffer_size / 2),
        }
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn threshold(&self) -> f32 {
        self.threshold
    }

    /// Switch to the rate the device actually delivers
    ///
    /// Only affects later calls to `estimate`.
    ///
    /// # Errors
    /// `AudioError::SampleRateInvalid` when `rate` is outside 8000-96000 Hz;
    /// the current rate is kept.
    pub fn update_sample_rate(&mut self, rate: u32) -> Result<(), AudioError> {
        if !(MIN_SAMPLE_RATE..=MAX_SAMPLE_RATE).contains(&rate) {
            return Err(AudioError::SampleRateInvalid { rate });
        }
        if rate != self.sample_rate {
            log::info!(
                "[PitchEstimator] Sample rate updated {} -> {} Hz",
                self.sample_rate,
                rate
            );
            self.sample_rate = rate;
        }
        Ok(())
    }

    /// Estimate the fundamental frequency of one buffer
    ///
    /// Never fails: silence, noise, short buffers and degenerate lags all
    /// yield an unpitched estimate.
    pub fn estimate(&mut self, samples: &[f32]) -> PitchEstimate {
        if samples.len() < MIN_BUFFER_LEN {
            return PitchEstimate::UNPITCHED;
        }

        self.difference(samples);
        self.cumulative_mean_normalize();

        let Some(tau) = self.absolute_threshold() else {
            return PitchEstimate::UNPITCHED;
        };

        let refined_tau = self.parabolic_interpolation(tau);
        let frequency = self.sample_rate as f32 / refined_tau;
        if !frequency.is_finite() || frequency <= 0.0 {
            return PitchEstimate::UNPITCHED;
        }

        PitchEstimate {
            frequency_hz: frequency,
            confidence: 1.0 - self.scratch[tau].clamp(0.0, 1.0),
        }
    }

    /// Step 1: squared difference for every lag in [0, N/2)
    fn difference(&mut self, samples: &[f32]) {
        let half = samples.len() / 2;
        self.scratch.clear();
        self.scratch.resize(half, 0.0);

        for tau in 0..half {
            let mut sum = 0.0f32;
            for i in 0..half {
                let delta = samples[i] - samples[i + tau];
                sum += delta * delta;
            }
            self.scratch[tau] = sum;
        }
    }

    /// Step 2: normalise by the running mean so d' starts at 1
    fn cumulative_mean_normalize(&mut self) {
        self.scratch[0] = 1.0;

        let mut running_sum = 0.0f32;
        for tau in 1..self.scratch.len() {
            running_sum += self.scratch[tau];
            self.scratch[tau] = if running_sum > 0.0 {
                self.scratch[tau] * tau as f32 / running_sum
            } else {
                // Silent prefix: nothing periodic to report
                1.0
            };
        }
    }

    /// Step 3: first dip below threshold, walked down to its local minimum
    fn absolute_threshold(&self) -> Option<usize> {
        let len = self.scratch.len();
        let mut tau = FIRST_CANDIDATE_LAG;

        while tau < len {
            if self.scratch[tau] < self.threshold {
                while tau + 1 < len && self.scratch[tau + 1] < self.scratch[tau] {
                    tau += 1;
                }
                return Some(tau);
            }
            tau += 1;
        }

        None
    }

    /// Step 4: vertex of the parabola through (τ-1, τ, τ+1)
    fn parabolic_interpolation(&self, tau: usize) -> f32 {
        if tau == 0 || tau + 1 >= self.scratch.len() {
            return tau as f32;
        }

        let y0 = self.scratch[tau - 1];
        let y1 = self.scratch[tau];
        let y2 = self.scratch[tau + 1];

        let denominator = 2.0 * (y0 + y2 - 2.0 * y1);
        if denominator == 0.0 {
            return tau as f32;
        }

        tau as f32 + (y0 - y2) / denominator
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f32::consts::PI;

    fn sine(frequency: f32, sample_rate: u32, len: usize) -> Vec<f32> {
        (0..len)
            .map(|i| (2.0 * PI * frequency * i as f32 / sample_rate as f32).sin() * 0.8)
            .collect()
    }

    /// Shortest buffer that holds four periods of `frequency`
    fn min_len(sample_rate: u32, frequency: f32) -> usize {
        (4.0 * sample_rate as f32 / frequency).ceil() as usize
    }

    fn assert_within_one_percent(estimate: PitchEstimate, expected: f32) {
        let error = (estimate.frequency_hz - expected).abs() / expected;
        assert!(
            error < 0.01,
            "expected {} Hz, got {} Hz ({:.3}% off)",
            expected,
            estimate.frequency_hz,
            error * 100.0
        );
        assert!(
            estimate.confidence > 0.9,
            "confidence {} too low for {} Hz",
            estimate.confidence,
            expected
        );
    }

    #[test]
    fn test_sine_tracking_across_vocal_range() {
        let sample_rate = 44100;
        let mut estimator = PitchEstimator::new(sample_rate);

        for frequency in [80.0, 110.0, 196.0, 261.63, 440.0, 659.25, 880.0, 1000.0] {
            let len = min_len(sample_rate, frequency);
            let estimate = estimator.estimate(&sine(frequency, sample_rate, len));
            assert_within_one_percent(estimate, frequency);
        }
    }

    #[test]
    fn test_shortest_buffer_across_rates() {
        for sample_rate in [8000, 22050, 44100, 48000, 96000] {
            let mut estimator = PitchEstimator::new(sample_rate);
            for frequency in [80.0, 220.0, 440.0, 1000.0] {
                let len = min_len(sample_rate, frequency);
                let estimate = estimator.estimate(&sine(frequency, sample_rate, len));
                assert_within_one_percent(estimate, frequency);
            }
        }
    }

    #[test]
    fn test_unpitched_estimate_has_no_confidence() {
        let mut estimator = PitchEstimator::new(44100);
        let buffers = [
            vec![0.0; 2048],
            vec![1.0; 2048],
            (0..2048).map(|i| if i % 2 == 0 { 1.0 } else { -1.0 }).collect(),
        ];
        for buffer in &buffers {
            let estimate = estimator.estimate(buffer);
            assert!(
                estimate.is_pitched() || estimate == PitchEstimate::UNPITCHED,
                "zero frequency with confidence {}",
                estimate.confidence
            );
        }
    }

    #[test]
    fn test_sine_at_48k() {
        let mut estimator = PitchEstimator::new(48000);
        let estimate = estimator.estimate(&sine(329.63, 48000, 2048));
        assert_within_one_percent(estimate, 329.63);
    }

    #[test]
    fn test_silence_is_unpitched() {
        let mut estimator = PitchEstimator::new(44100);
        let estimate = estimator.estimate(&vec![0.0; 2048]);
        assert_eq!(estimate, PitchEstimate::UNPITCHED);
        assert!(!estimate.is_pitched());
    }

    #[test]
    fn test_short_buffer_is_unpitched() {
        let mut estimator = PitchEstimator::new(44100);
        assert_eq!(estimator.estimate(&[]), PitchEstimate::UNPITCHED);
        assert_eq!(
            estimator.estimate(&[0.1, -0.2, 0.3]),
            PitchEstimate::UNPITCHED
        );
    }

    #[test]
    fn test_scratch_is_reused_across_buffer_sizes() {
        let mut estimator = PitchEstimator::new(44100);
        estimator.estimate(&sine(440.0, 44100, 4096));
        let estimate = estimator.estimate(&sine(440.0, 44100, 1024));
        assert_within_one_percent(estimate, 440.0);
        assert_eq!(estimator.scratch.len(), 512);
    }

    #[test]
    fn test_update_sample_rate_bounds() {
        let mut estimator = PitchEstimator::new(44100);

        assert_eq!(
            estimator.update_sample_rate(4000),
            Err(AudioError::SampleRateInvalid { rate: 4000 })
        );
        assert_eq!(
            estimator.update_sample_rate(192_000),
            Err(AudioError::SampleRateInvalid { rate: 192_000 })
        );
        assert_eq!(estimator.sample_rate(), 44100);

        assert!(estimator.update_sample_rate(MIN_SAMPLE_RATE).is_ok());
        assert!(estimator.update_sample_rate(MAX_SAMPLE_RATE).is_ok());
        assert_eq!(estimator.sample_rate(), MAX_SAMPLE_RATE);
    }

    #[test]
    fn test_sample_rate_update_applies_to_later_calls() {
        // Device delivers 48 kHz while the estimator assumes 44.1 kHz
        let buffer = sine(440.0, 48000, 2048);
        let mut estimator = PitchEstimator::new(44100);

        let wrong = estimator.estimate(&buffer);
        assert!((wrong.frequency_hz - 440.0 * 44100.0 / 48000.0).abs() < 4.0);

        estimator.update_sample_rate(48000).unwrap();
        assert_within_one_percent(estimator.estimate(&buffer), 440.0);
    }

    #[test]
    fn test_parabolic_interpolation_moves_toward_lower_neighbour() {
        let mut estimator = PitchEstimator::new(44100);
        estimator.scratch = vec![1.0, 0.9, 0.5, 0.1, 0.3, 0.8];

        // right neighbour is lower, vertex shifts right by 0.2 / 1.2
        let refined = estimator.parabolic_interpolation(3);
        assert!((refined - 3.1667).abs() < 1e-3, "refined = {}", refined);

        // flat neighbourhood leaves the lag untouched
        estimator.scratch = vec![1.0, 0.5, 0.5, 0.5, 0.9];
        assert_eq!(estimator.parabolic_interpolation(2), 2.0);
    }

    #[test]
    fn test_confidence_in_unit_range() {
        let mut estimator = PitchEstimator::new(44100);
        let mut noisy = sine(220.0, 44100, 2048);
        for (i, sample) in noisy.iter_mut().enumerate() {
            *sample += if i % 3 == 0 { 0.2 } else { -0.1 };
        }
        let estimate = estimator.estimate(&noisy);
        assert!((0.0..=1.0).contains(&estimate.confidence));
        assert!(estimate.frequency_hz >= 0.0);
    }
}
