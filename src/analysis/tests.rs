use super::*;
use crate::audio::signals::{sine_wave, white_noise};
use crate::exercise::{Note, PitchReading};

const SAMPLE_RATE: u32 = 44100;
const BUFFER: usize = 2048;

#[test]
fn test_sung_note_maps_to_target() {
    let mut estimator = PitchEstimator::new(SAMPLE_RATE);
    let buffer = sine_wave(392.0, SAMPLE_RATE, BUFFER, 0.6);

    let estimate = estimator.estimate(&buffer);
    let note = to_note(estimate.frequency_hz);

    assert_eq!(note.name, "G4");
    assert!(note.cents.abs() < 10.0, "cents = {}", note.cents);
    assert_eq!(AccuracyBand::from_cents(note.cents), AccuracyBand::Perfect);
}

#[test]
fn test_noise_never_produces_confident_reading() {
    let mut estimator = PitchEstimator::new(SAMPLE_RATE);
    let noise = white_noise(BUFFER, 0.5, 7);

    let estimate = estimator.estimate(&noise);
    assert!(
        estimate.confidence <= 0.5 || !estimate.is_pitched(),
        "noise read as {:?}",
        estimate
    );
}

#[test]
fn test_detuned_singer_scores_by_cents() {
    let mut estimator = PitchEstimator::new(SAMPLE_RATE);
    let scorer = AccuracyScorer::default();
    let target = Note::new("A4", 440.0);

    // 20 cents sharp → ~60% per reading
    let sung = 440.0 * 2f32.powf(20.0 / 1200.0);
    let readings: Vec<PitchReading> = (0..5)
        .map(|i| {
            let estimate = estimator.estimate(&sine_wave(sung, SAMPLE_RATE, BUFFER, 0.5));
            PitchReading {
                timestamp_ms: i * 40,
                frequency_hz: estimate.frequency_hz,
                confidence: estimate.confidence,
                target_frequency_hz: target.frequency_hz,
                cents_off: cents_off(estimate.frequency_hz, target.frequency_hz),
            }
        })
        .collect();

    let result = scorer.score_note(&target, readings, 70.0);
    assert!(
        (result.average_accuracy - 60.0).abs() < 5.0,
        "accuracy = {}",
        result.average_accuracy
    );
    assert!(!result.passed);
}

#[test]
fn test_smoother_tracks_estimated_cents() {
    let mut estimator = PitchEstimator::new(SAMPLE_RATE);
    let mut smoother = PitchSmoother::default();

    let flat = 261.63 * 2f32.powf(-15.0 / 1200.0);
    let mut last = 0;
    for _ in 0..5 {
        let estimate = estimator.estimate(&sine_wave(flat, SAMPLE_RATE, BUFFER, 0.5));
        let cents = cents_off(estimate.frequency_hz, 261.63).unwrap();
        last = smoother.smooth(cents);
    }
    assert!((last + 15).abs() <= 2, "smoothed = {}", last);
}
