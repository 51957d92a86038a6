//! Reference tone - note synthesis and beat timing
//!
//! This module renders the reference note a singer hears before each
//! listening window. Key features:
//! - Fundamental plus two soft harmonics
//! - 10ms linear fade-in and 50ms fade-out to avoid clicks
//! - Pure functions (no side effects, deterministic output)

use std::f32::consts::PI;
use std::time::Duration;

/// Peak gain of the rendered tone
pub const TONE_VOLUME: f32 = 0.3;

/// Fade-in length in milliseconds
const ATTACK_MS: f32 = 10.0;

/// Fade-out length in milliseconds
const RELEASE_MS: f32 = 50.0;

/// (multiple of the fundamental, relative gain)
const HARMONICS: [(f32, f32); 3] = [(1.0, 1.0), (2.0, 0.35), (3.0, 0.15)];

/// Renders a reference tone for one note.
///
/// # Arguments
/// * `frequency_hz` - Fundamental frequency of the note
/// * `duration` - Length of the tone
/// * `sample_rate` - Sample rate in Hz
///
/// # Returns
/// Mono samples with peak magnitude at most [`TONE_VOLUME`]; empty when the
/// frequency is not positive.
///
/// # Examples
/// ```
/// use std::time::Duration;
/// use vocal_trainer::audio::tone::generate_reference_tone;
///
/// let tone = generate_reference_tone(440.0, Duration::from_millis(500), 48000);
/// assert_eq!(tone.len(), 24000);
/// ```
pub fn generate_reference_tone(
    frequency_hz: f32,
    duration: Duration,
    sample_rate: u32,
) -> Vec<f32> {
    if !frequency_hz.is_finite() || frequency_hz <= 0.0 || sample_rate == 0 {
        return Vec::new();
    }

    let num_samples = (duration.as_secs_f32() * sample_rate as f32).round() as usize;
    let attack = ((ATTACK_MS / 1000.0) * sample_rate as f32) as usize;
    let release = ((RELEASE_MS / 1000.0) * sample_rate as f32) as usize;
    let harmonic_sum: f32 = HARMONICS.iter().map(|(_, gain)| gain).sum();

    (0..num_samples)
        .map(|i| {
            let t = i as f32 / sample_rate as f32;
            let voiced: f32 = HARMONICS
                .iter()
                .map(|(multiple, gain)| gain * (2.0 * PI * frequency_hz * multiple * t).sin())
                .sum();

            voiced / harmonic_sum * TONE_VOLUME * envelope(i, num_samples, attack, release)
        })
        .collect()
}

/// Linear attack/release gain in [0, 1]
fn envelope(index: usize, total: usize, attack: usize, release: usize) -> f32 {
    let fade_in = if attack > 0 && index < attack {
        index as f32 / attack as f32
    } else {
        1.0
    };
    let remaining = total.saturating_sub(index + 1);
    let fade_out = if release > 0 && remaining < release {
        remaining as f32 / release as f32
    } else {
        1.0
    };
    fade_in.min(fade_out)
}

/// Length of one beat at the given tempo.
///
/// Returns `Duration::ZERO` for a tempo of 0.
///
/// # Examples
/// ```
/// use std::time::Duration;
/// use vocal_trainer::audio::tone::beat_duration;
///
/// assert_eq!(beat_duration(60), Duration::from_secs(1));
/// assert_eq!(beat_duration(120), Duration::from_millis(500));
/// ```
pub fn beat_duration(tempo_bpm: u32) -> Duration {
    if tempo_bpm == 0 {
        return Duration::ZERO;
    }
    Duration::from_secs_f64(60.0 / tempo_bpm as f64)
}

/// Converts BPM to samples per beat: `(sample_rate × 60) / BPM`.
#[inline]
pub fn samples_per_beat(tempo_bpm: u32, sample_rate: u32) -> u64 {
    if tempo_bpm == 0 {
        return 0;
    }
    (sample_rate as u64 * 60) / tempo_bpm as u64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::PitchEstimator;

    #[test]
    fn test_tone_length() {
        let tone = generate_reference_tone(261.63, Duration::from_millis(750), 44100);
        assert_eq!(tone.len(), 33075);
    }

    #[test]
    fn test_tone_amplitude_bounded() {
        let tone = generate_reference_tone(440.0, Duration::from_secs(1), 48000);
        assert!(tone.iter().all(|s| s.abs() <= TONE_VOLUME + 1e-6));
        assert!(tone.iter().any(|s| s.abs() > TONE_VOLUME * 0.5));
    }

    #[test]
    fn test_tone_fades_in_and_out() {
        let tone = generate_reference_tone(440.0, Duration::from_millis(500), 48000);
        assert_eq!(tone[0], 0.0);
        assert!(tone.last().unwrap().abs() < 1e-6);
    }

    #[test]
    fn test_invalid_frequency_is_silent() {
        assert!(generate_reference_tone(0.0, Duration::from_secs(1), 48000).is_empty());
        assert!(generate_reference_tone(f32::NAN, Duration::from_secs(1), 48000).is_empty());
    }

    #[test]
    fn test_tone_pitch_is_fundamental() {
        let tone = generate_reference_tone(329.63, Duration::from_millis(200), 44100);
        let mut estimator = PitchEstimator::new(44100);
        let estimate = estimator.estimate(&tone[2048..4096]);
        assert!((estimate.frequency_hz - 329.63).abs() / 329.63 < 0.01);
    }

    #[test]
    fn test_beat_duration() {
        assert_eq!(beat_duration(60), Duration::from_secs(1));
        assert_eq!(beat_duration(80), Duration::from_millis(750));
        assert_eq!(beat_duration(0), Duration::ZERO);
    }

    #[test]
    fn test_samples_per_beat() {
        assert_eq!(samples_per_beat(120, 48000), 24000);
        assert_eq!(samples_per_beat(60, 44100), 44100);
        assert_eq!(samples_per_beat(0, 44100), 0);
    }
}
