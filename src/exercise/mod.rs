// Exercise model - read-only drill definitions and run results
//
// An Exercise is either a vocal drill (ordered notes sung at a tempo) or a
// breathing drill (ordered inhale/hold/exhale rounds). Exercises are never
// mutated during a run; results are produced once per note and once per run.

pub mod catalog;

use serde::{Deserialize, Serialize};

use crate::analysis::notes::note_frequency;
use crate::error::ExerciseError;

/// Default pass threshold (percent) for a note's average accuracy
pub const DEFAULT_TOLERANCE: f32 = 70.0;

/// A target note: display name plus reference frequency
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Note {
    pub name: String,
    pub frequency_hz: f32,
}

impl Note {
    pub fn new(name: impl Into<String>, frequency_hz: f32) -> Self {
        Self {
            name: name.into(),
            frequency_hz,
        }
    }

    /// Build a note from its scientific pitch name ("C4", "F#3", "Bb2")
    pub fn parse(name: &str) -> Option<Self> {
        note_frequency(name).map(|frequency_hz| Self::new(name, frequency_hz))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExerciseCategory {
    Breathing,
    WarmUp,
    Scale,
    Arpeggio,
    Interval,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Difficulty {
    Beginner,
    Intermediate,
    Advanced,
}

/// One breathing round; beats are whole seconds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BreathingRound {
    /// 1-based round number shown to the user
    pub number: u32,
    pub inhale_beats: u32,
    /// 0 skips the hold phase entirely
    pub hold_beats: u32,
    pub exhale_beats: u32,
}

impl BreathingRound {
    pub fn new(number: u32, inhale_beats: u32, hold_beats: u32, exhale_beats: u32) -> Self {
        Self {
            number,
            inhale_beats,
            hold_beats,
            exhale_beats,
        }
    }

    /// Seconds spent in inhale, hold and exhale
    pub fn cycle_secs(&self) -> u32 {
        self.inhale_beats + self.hold_beats + self.exhale_beats
    }

    /// Reject rounds with a zero-length inhale or exhale
    pub fn validate(&self, index: usize) -> Result<(), ExerciseError> {
        if self.inhale_beats == 0 {
            return Err(ExerciseError::InvalidRound {
                index,
                reason: "inhale must last at least 1 second".to_string(),
            });
        }
        if self.exhale_beats == 0 {
            return Err(ExerciseError::InvalidRound {
                index,
                reason: "exhale must last at least 1 second".to_string(),
            });
        }
        Ok(())
    }
}

/// What an exercise asks the user to do
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ExercisePlan {
    Vocal {
        notes: Vec<Note>,
        default_tempo_bpm: u32,
    },
    Breathing {
        rounds: Vec<BreathingRound>,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Exercise {
    pub id: String,
    pub name: String,
    pub category: ExerciseCategory,
    pub difficulty: Difficulty,
    /// Estimated length in seconds, for display
    pub estimated_duration_secs: u32,
    pub description: String,
    pub plan: ExercisePlan,
}

impl Exercise {
    pub fn is_vocal(&self) -> bool {
        matches!(self.plan, ExercisePlan::Vocal { .. })
    }

    pub fn is_breathing(&self) -> bool {
        matches!(self.plan, ExercisePlan::Breathing { .. })
    }

    /// Notes of a vocal exercise, or an error for empty or breathing exercises
    pub fn vocal_notes(&self) -> Result<&[Note], ExerciseError> {
        match &self.plan {
            ExercisePlan::Vocal { notes, .. } if notes.is_empty() => {
                Err(ExerciseError::EmptyExercise {
                    exercise_id: self.id.clone(),
                })
            }
            ExercisePlan::Vocal { notes, .. } => Ok(notes),
            ExercisePlan::Breathing { .. } => Err(ExerciseError::WrongKind {
                exercise_id: self.id.clone(),
                expected: "vocal".to_string(),
            }),
        }
    }

    /// Validated rounds of a breathing exercise
    pub fn breathing_rounds(&self) -> Result<&[BreathingRound], ExerciseError> {
        match &self.plan {
            ExercisePlan::Breathing { rounds } => {
                if rounds.is_empty() {
                    return Err(ExerciseError::EmptyExercise {
                        exercise_id: self.id.clone(),
                    });
                }
                for (index, round) in rounds.iter().enumerate() {
                    round.validate(index)?;
                }
                Ok(rounds)
            }
            ExercisePlan::Vocal { .. } => Err(ExerciseError::WrongKind {
                exercise_id: self.id.clone(),
                expected: "breathing".to_string(),
            }),
        }
    }

    pub fn default_tempo_bpm(&self) -> Option<u32> {
        match self.plan {
            ExercisePlan::Vocal {
                default_tempo_bpm, ..
            } => Some(default_tempo_bpm),
            ExercisePlan::Breathing { .. } => None,
        }
    }
}

/// Per-run settings chosen by the user
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ExerciseSettings {
    pub tempo_bpm: u32,
    /// Pass threshold for a note's average accuracy (percent)
    pub tolerance: f32,
}

impl ExerciseSettings {
    /// Settings using the exercise's default tempo (60 BPM for breathing drills)
    pub fn for_exercise(exercise: &Exercise) -> Self {
        Self {
            tempo_bpm: exercise.default_tempo_bpm().unwrap_or(60),
            tolerance: DEFAULT_TOLERANCE,
        }
    }

    pub fn with_tempo(mut self, tempo_bpm: u32) -> Self {
        self.tempo_bpm = tempo_bpm;
        self
    }

    pub fn with_tolerance(mut self, tolerance: f32) -> Self {
        self.tolerance = tolerance;
        self
    }

    pub fn validate(&self) -> Result<(), ExerciseError> {
        if self.tempo_bpm == 0 {
            return Err(ExerciseError::InvalidTempo {
                bpm: self.tempo_bpm,
            });
        }
        Ok(())
    }
}

/// One accepted estimator reading inside a note's listening window
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PitchReading {
    /// Milliseconds since the run started
    pub timestamp_ms: u64,
    pub frequency_hz: f32,
    pub confidence: f32,
    pub target_frequency_hz: f32,
    /// `None` when either frequency is not positive
    pub cents_off: Option<f32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NoteResult {
    pub note_expected: String,
    pub frequency_expected: f32,
    /// 0-100
    pub average_accuracy: f32,
    pub passed: bool,
    pub readings: Vec<PitchReading>,
}

impl NoteResult {
    /// Mean cents offset over readings that carry one
    pub fn mean_cents(&self) -> Option<f32> {
        let cents: Vec<f32> = self.readings.iter().filter_map(|r| r.cents_off).collect();
        if cents.is_empty() {
            None
        } else {
            Some(cents.iter().sum::<f32>() / cents.len() as f32)
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExerciseResults {
    pub exercise_id: String,
    /// Unix epoch milliseconds
    pub completed_at_ms: u64,
    pub duration_secs: f32,
    pub overall_accuracy: f32,
    pub note_results: Vec<NoteResult>,
    pub strengths: Vec<String>,
    pub improvements: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;

    fn vocal(notes: Vec<Note>) -> Exercise {
        Exercise {
            id: "test-vocal".to_string(),
            name: "Test".to_string(),
            category: ExerciseCategory::Scale,
            difficulty: Difficulty::Beginner,
            estimated_duration_secs: 10,
            description: String::new(),
            plan: ExercisePlan::Vocal {
                notes,
                default_tempo_bpm: 80,
            },
        }
    }

    fn breathing(rounds: Vec<BreathingRound>) -> Exercise {
        Exercise {
            id: "test-breathing".to_string(),
            name: "Test".to_string(),
            category: ExerciseCategory::Breathing,
            difficulty: Difficulty::Beginner,
            estimated_duration_secs: 10,
            description: String::new(),
            plan: ExercisePlan::Breathing { rounds },
        }
    }

    #[test]
    fn test_note_parse() {
        let note = Note::parse("A4").unwrap();
        assert_eq!(note.name, "A4");
        assert!((note.frequency_hz - 440.0).abs() < 0.01);
        assert!(Note::parse("H4").is_none());
    }

    #[test]
    fn test_empty_vocal_exercise_rejected() {
        let err = vocal(Vec::new()).vocal_notes().unwrap_err();
        assert!(matches!(err, ExerciseError::EmptyExercise { .. }));
    }

    #[test]
    fn test_wrong_kind_rejected() {
        let exercise = breathing(vec![BreathingRound::new(1, 4, 4, 4)]);
        assert!(matches!(
            exercise.vocal_notes().unwrap_err(),
            ExerciseError::WrongKind { .. }
        ));
        assert!(exercise.breathing_rounds().is_ok());
    }

    #[test]
    fn test_zero_inhale_or_exhale_is_invalid() {
        let exercise = breathing(vec![
            BreathingRound::new(1, 4, 0, 4),
            BreathingRound::new(2, 4, 0, 0),
        ]);
        assert_eq!(
            exercise.breathing_rounds().unwrap_err().code(),
            crate::error::ExerciseErrorCodes::INVALID_ROUND
        );

        // hold of 0 is legal
        assert!(BreathingRound::new(1, 5, 0, 5).validate(0).is_ok());
        assert!(BreathingRound::new(1, 0, 5, 5).validate(0).is_err());
    }

    #[test]
    fn test_settings_default_from_exercise() {
        let exercise = vocal(vec![Note::new("C4", 261.63)]);
        let settings = ExerciseSettings::for_exercise(&exercise);
        assert_eq!(settings.tempo_bpm, 80);
        assert_eq!(settings.tolerance, DEFAULT_TOLERANCE);
        assert!(settings.with_tempo(0).validate().is_err());
    }

    #[test]
    fn test_mean_cents_skips_undefined_readings() {
        let reading = |cents_off| PitchReading {
            timestamp_ms: 0,
            frequency_hz: 440.0,
            confidence: 0.9,
            target_frequency_hz: 440.0,
            cents_off,
        };
        let result = NoteResult {
            note_expected: "A4".to_string(),
            frequency_expected: 440.0,
            average_accuracy: 0.0,
            passed: false,
            readings: vec![reading(Some(20.0)), reading(None), reading(Some(10.0))],
        };
        assert_eq!(result.mean_cents(), Some(15.0));
    }

    #[test]
    fn test_plan_serializes_with_type_tag() {
        let json = serde_json::to_value(&vocal(vec![Note::new("C4", 261.63)])).unwrap();
        assert_eq!(json["plan"]["type"], "vocal");
        assert_eq!(json["category"], "scale");
    }
}
