// AccuracyScorer - per-note scores and session feedback
//
// Per reading: accuracy = max(0, 100 - 2·|cents|). Readings at or beyond the
// exclusion limit (default 50 cents) are treated as a different note or
// octave and left out of the average entirely rather than scored as 0.

use crate::config::ScoringConfig;
use crate::exercise::{Note, NoteResult, PitchReading};

/// Accuracy points lost per cent of deviation
const POINTS_PER_CENT: f32 = 2.0;

#[derive(Debug, Clone, Default)]
pub struct AccuracyScorer {
    config: ScoringConfig,
}

impl AccuracyScorer {
    pub fn new(config: ScoringConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ScoringConfig {
        &self.config
    }

    /// Accuracy of one cents deviation, 0-100
    pub fn reading_accuracy(cents: f32) -> f32 {
        (100.0 - cents.abs() * POINTS_PER_CENT).max(0.0)
    }

    fn is_scorable(&self, cents: f32) -> bool {
        cents.is_finite() && cents.abs() < self.config.exclusion_cents
    }

    /// Mean accuracy over the scorable readings; 0 when there are none
    pub fn average_accuracy(&self, readings: &[PitchReading]) -> f32 {
        let accuracies: Vec<f32> = readings
            .iter()
            .filter_map(|reading| reading.cents_off)
            .filter(|&cents| self.is_scorable(cents))
            .map(Self::reading_accuracy)
            .collect();

        if accuracies.is_empty() {
            0.0
        } else {
            accuracies.iter().sum::<f32>() / accuracies.len() as f32
        }
    }

    /// Close a note's listening window
    ///
    /// `passed` requires at least one scorable reading and an average of at
    /// least `tolerance` percent. The pass check sees the exact average; the
    /// stored average is rounded to a whole percent.
    pub fn score_note(
        &self,
        note: &Note,
        readings: Vec<PitchReading>,
        tolerance: f32,
    ) -> NoteResult {
        let has_scorable = readings
            .iter()
            .filter_map(|reading| reading.cents_off)
            .any(|cents| self.is_scorable(cents));
        let average_accuracy = self.average_accuracy(&readings);

        NoteResult {
            note_expected: note.name.clone(),
            frequency_expected: note.frequency_hz,
            average_accuracy: average_accuracy.round(),
            passed: has_scorable && average_accuracy >= tolerance,
            readings,
        }
    }

    /// Mean of the note averages rounded to a whole percent; 0 for an empty run
    pub fn overall_accuracy(&self, results: &[NoteResult]) -> f32 {
        if results.is_empty() {
            return 0.0;
        }
        let mean = results.iter().map(|r| r.average_accuracy).sum::<f32>() / results.len() as f32;
        mean.round()
    }

    /// What went well
    pub fn strengths(&self, results: &[NoteResult]) -> Vec<String> {
        let mut strengths = Vec::new();
        if results.is_empty() {
            return strengths;
        }

        let passed = results.iter().filter(|r| r.passed).count();
        if passed as f32 >= results.len() as f32 * self.config.pass_ratio_threshold {
            strengths.push("Great overall accuracy!".to_string());
        }

        if let Some(best) = best_note(results) {
            if best.average_accuracy >= self.config.strength_threshold {
                strengths.push(format!("Excellent pitch on {}", best.note_expected));
            }
        }

        strengths
    }

    /// What to work on next
    pub fn improvements(&self, results: &[NoteResult], tempo_bpm: u32) -> Vec<String> {
        let mut improvements = Vec::new();

        if let Some(worst) = worst_note(results) {
            if worst.average_accuracy < self.config.improvement_threshold {
                let tendency = self.config.tendency_cents;
                let hint = match worst.mean_cents() {
                    Some(cents) if cents > tendency => {
                        format!("Work on {} - you're singing sharp", worst.note_expected)
                    }
                    Some(cents) if cents < -tendency => {
                        format!("Work on {} - you're singing flat", worst.note_expected)
                    }
                    _ => format!("Practice {} more", worst.note_expected),
                };
                improvements.push(hint);
            }
        }

        if tempo_bpm > self.config.fast_tempo_bpm {
            improvements.push("Try slowing down the tempo for better accuracy".to_string());
        }

        improvements
    }
}

/// Highest average; the earliest note wins ties
fn best_note(results: &[NoteResult]) -> Option<&NoteResult> {
    results.iter().fold(None, |best, current| match best {
        Some(b) if b.average_accuracy >= current.average_accuracy => Some(b),
        _ => Some(current),
    })
}

/// Lowest average; the earliest note wins ties
fn worst_note(results: &[NoteResult]) -> Option<&NoteResult> {
    results.iter().fold(None, |worst, current| match worst {
        Some(w) if w.average_accuracy <= current.average_accuracy => Some(w),
        _ => Some(current),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reading(cents_off: Option<f32>) -> PitchReading {
        PitchReading {
            timestamp_ms: 0,
            frequency_hz: 440.0,
            confidence: 0.9,
            target_frequency_hz: 440.0,
            cents_off,
        }
    }

    fn readings(cents: &[f32]) -> Vec<PitchReading> {
        cents.iter().map(|&c| reading(Some(c))).collect()
    }

    fn a4() -> Note {
        Note::new("A4", 440.0)
    }

    fn result(name: &str, average_accuracy: f32, passed: bool, cents: &[f32]) -> NoteResult {
        NoteResult {
            note_expected: name.to_string(),
            frequency_expected: 440.0,
            average_accuracy,
            passed,
            readings: readings(cents),
        }
    }

    #[test]
    fn test_empty_readings_score_zero() {
        let scorer = AccuracyScorer::default();
        let result = scorer.score_note(&a4(), Vec::new(), 70.0);
        assert_eq!(result.average_accuracy, 0.0);
        assert!(!result.passed);
        assert_eq!(result.note_expected, "A4");
    }

    #[test]
    fn test_perfect_reading_scores_hundred() {
        let scorer = AccuracyScorer::default();
        let result = scorer.score_note(&a4(), readings(&[0.0]), 70.0);
        assert_eq!(result.average_accuracy, 100.0);
        assert!(result.passed);
    }

    #[test]
    fn test_out_of_range_reading_is_excluded() {
        let scorer = AccuracyScorer::default();

        let result = scorer.score_note(&a4(), readings(&[10.0, 60.0]), 70.0);
        assert_eq!(result.average_accuracy, 80.0);
        assert_eq!(result.readings.len(), 2);

        let only_excluded = scorer.score_note(&a4(), readings(&[60.0, -50.0]), 0.0);
        assert_eq!(only_excluded.average_accuracy, 0.0);
        assert!(!only_excluded.passed);
    }

    #[test]
    fn test_undefined_cents_are_excluded() {
        let scorer = AccuracyScorer::default();
        let result = scorer.score_note(&a4(), vec![reading(None), reading(Some(-5.0))], 70.0);
        assert_eq!(result.average_accuracy, 90.0);
    }

    #[test]
    fn test_reading_accuracy_floor() {
        assert_eq!(AccuracyScorer::reading_accuracy(0.0), 100.0);
        assert_eq!(AccuracyScorer::reading_accuracy(-25.0), 50.0);
        assert_eq!(AccuracyScorer::reading_accuracy(49.0), 2.0);
        assert_eq!(AccuracyScorer::reading_accuracy(80.0), 0.0);
    }

    #[test]
    fn test_pass_uses_tolerance() {
        let scorer = AccuracyScorer::default();
        // average 80
        assert!(scorer.score_note(&a4(), readings(&[10.0]), 80.0).passed);
        assert!(!scorer.score_note(&a4(), readings(&[10.0]), 80.5).passed);
    }

    #[test]
    fn test_overall_accuracy_is_mean_of_notes() {
        let scorer = AccuracyScorer::default();
        let results = vec![
            result("C4", 100.0, true, &[0.0]),
            result("D4", 50.0, false, &[25.0]),
        ];
        assert_eq!(scorer.overall_accuracy(&results), 75.0);
        assert_eq!(scorer.overall_accuracy(&[]), 0.0);
    }

    #[test]
    fn test_stored_averages_are_whole_percents() {
        let scorer = AccuracyScorer::default();

        // 3 and 4.5 cents average 92.5, stored as 93
        let result = scorer.score_note(&a4(), readings(&[3.0, 4.5]), 92.5);
        assert_eq!(result.average_accuracy, 93.0);
        assert!(result.passed);

        // 92.6 is stored as 93 but still misses a 93% tolerance
        let near_miss = scorer.score_note(&a4(), readings(&[3.7]), 93.0);
        assert_eq!(near_miss.average_accuracy, 93.0);
        assert!(!near_miss.passed);

        let results = vec![
            self::result("C4", 100.0, true, &[0.0]),
            self::result("D4", 91.0, true, &[4.5]),
        ];
        assert_eq!(scorer.overall_accuracy(&results), 96.0);
    }

    #[test]
    fn test_strengths() {
        let scorer = AccuracyScorer::default();
        let results = vec![
            result("C4", 95.0, true, &[2.5]),
            result("D4", 80.0, true, &[10.0]),
            result("E4", 75.0, true, &[12.5]),
        ];
        assert_eq!(
            scorer.strengths(&results),
            vec![
                "Great overall accuracy!".to_string(),
                "Excellent pitch on C4".to_string()
            ]
        );

        let weak = vec![
            result("C4", 60.0, false, &[20.0]),
            result("D4", 85.0, true, &[7.5]),
        ];
        assert!(scorer.strengths(&weak).is_empty());
        assert!(scorer.strengths(&[]).is_empty());
    }

    #[test]
    fn test_improvements_sharp_and_flat() {
        let scorer = AccuracyScorer::default();

        let sharp = vec![
            result("C4", 90.0, true, &[5.0]),
            result("E4", 40.0, false, &[30.0, 35.0]),
        ];
        assert_eq!(
            scorer.improvements(&sharp, 80),
            vec!["Work on E4 - you're singing sharp".to_string()]
        );

        let flat = vec![result("G4", 30.0, false, &[-35.0])];
        assert_eq!(
            scorer.improvements(&flat, 80),
            vec!["Work on G4 - you're singing flat".to_string()]
        );
    }

    #[test]
    fn test_improvements_practice_more_fallback() {
        let scorer = AccuracyScorer::default();

        // Centred on average but inconsistent
        let scattered = vec![result("D4", 40.0, false, &[-30.0, 30.0])];
        assert_eq!(
            scorer.improvements(&scattered, 60),
            vec!["Practice D4 more".to_string()]
        );

        // No readings at all
        let silent = vec![result("F4", 0.0, false, &[])];
        assert_eq!(
            scorer.improvements(&silent, 60),
            vec!["Practice F4 more".to_string()]
        );
    }

    #[test]
    fn test_fast_tempo_hint() {
        let scorer = AccuracyScorer::default();
        let good = vec![result("C4", 95.0, true, &[2.5])];
        assert!(scorer.improvements(&good, 100).is_empty());
        assert_eq!(
            scorer.improvements(&good, 120),
            vec!["Try slowing down the tempo for better accuracy".to_string()]
        );
    }

    #[test]
    fn test_ties_pick_earliest_note() {
        let results = vec![
            result("C4", 50.0, false, &[]),
            result("D4", 50.0, false, &[]),
        ];
        assert_eq!(best_note(&results).unwrap().note_expected, "C4");
        assert_eq!(worst_note(&results).unwrap().note_expected, "C4");
    }
}
