//! Built-in exercise catalog
//!
//! Vocal drills (scales, warm-ups and intervals) and breathing drills shipped
//! with the trainer. The catalog is built once on first access.

use once_cell::sync::Lazy;

use super::{BreathingRound, Difficulty, Exercise, ExerciseCategory, ExercisePlan, Note};

static CATALOG: Lazy<Vec<Exercise>> = Lazy::new(|| {
    let mut exercises = vocal_exercises();
    exercises.extend(breathing_exercises());
    exercises
});

/// Every built-in exercise, vocal drills first
pub fn all() -> &'static [Exercise] {
    &CATALOG
}

/// Look up a built-in exercise by id
pub fn find(id: &str) -> Option<&'static Exercise> {
    CATALOG.iter().find(|exercise| exercise.id == id)
}

pub fn vocal() -> impl Iterator<Item = &'static Exercise> {
    CATALOG.iter().filter(|exercise| exercise.is_vocal())
}

pub fn breathing() -> impl Iterator<Item = &'static Exercise> {
    CATALOG.iter().filter(|exercise| exercise.is_breathing())
}

fn scale(names: &[(&str, f32)]) -> Vec<Note> {
    names
        .iter()
        .map(|(name, frequency_hz)| Note::new(*name, *frequency_hz))
        .collect()
}

#[allow(clippy::too_many_arguments)]
fn vocal_exercise(
    id: &str,
    name: &str,
    category: ExerciseCategory,
    difficulty: Difficulty,
    estimated_duration_secs: u32,
    description: &str,
    notes: Vec<Note>,
    default_tempo_bpm: u32,
) -> Exercise {
    Exercise {
        id: id.to_string(),
        name: name.to_string(),
        category,
        difficulty,
        estimated_duration_secs,
        description: description.to_string(),
        plan: ExercisePlan::Vocal {
            notes,
            default_tempo_bpm,
        },
    }
}

fn vocal_exercises() -> Vec<Exercise> {
    const C4: (&str, f32) = ("C4", 261.63);
    const D4: (&str, f32) = ("D4", 293.66);
    const E4: (&str, f32) = ("E4", 329.63);
    const F4: (&str, f32) = ("F4", 349.23);
    const G4: (&str, f32) = ("G4", 392.00);
    const C5: (&str, f32) = ("C5", 523.25);

    vec![
        vocal_exercise(
            "c-major-scale",
            "C Major Scale",
            ExerciseCategory::Scale,
            Difficulty::Beginner,
            30,
            "Practice the C Major scale ascending and descending",
            scale(&[C4, D4, E4, F4, G4, F4, E4, D4, C4]),
            80,
        ),
        vocal_exercise(
            "5-note-warmup",
            "5-Note Warm-Up",
            ExerciseCategory::WarmUp,
            Difficulty::Beginner,
            15,
            "Gentle warm-up with 5 notes",
            scale(&[C4, D4, E4, D4, C4]),
            60,
        ),
        vocal_exercise(
            "octave-jump",
            "Octave Jumps",
            ExerciseCategory::Interval,
            Difficulty::Intermediate,
            20,
            "Practice jumping between octaves to expand vocal range",
            scale(&[C4, C5, C4, C5, C4]),
            70,
        ),
        vocal_exercise(
            "major-thirds",
            "Major Thirds",
            ExerciseCategory::Interval,
            Difficulty::Beginner,
            15,
            "Practice singing major third intervals",
            scale(&[C4, E4, D4, F4, E4, G4]),
            65,
        ),
    ]
}

fn breathing_exercise(
    id: &str,
    name: &str,
    difficulty: Difficulty,
    description: &str,
    cycle: (u32, u32, u32),
    round_count: u32,
) -> Exercise {
    let rounds: Vec<BreathingRound> = (1..=round_count)
        .map(|number| BreathingRound::new(number, cycle.0, cycle.1, cycle.2))
        .collect();
    breathing_with_rounds(id, name, difficulty, description, rounds)
}

fn breathing_with_rounds(
    id: &str,
    name: &str,
    difficulty: Difficulty,
    description: &str,
    rounds: Vec<BreathingRound>,
) -> Exercise {
    Exercise {
        id: id.to_string(),
        name: name.to_string(),
        category: ExerciseCategory::Breathing,
        difficulty,
        estimated_duration_secs: rounds.iter().map(BreathingRound::cycle_secs).sum(),
        description: description.to_string(),
        plan: ExercisePlan::Breathing { rounds },
    }
}

fn breathing_exercises() -> Vec<Exercise> {
    vec![
        breathing_exercise(
            "box-breathing",
            "Box Breathing",
            Difficulty::Beginner,
            "Calm your nerves and focus your mind with this military breathing technique",
            (4, 4, 4),
            4,
        ),
        breathing_with_rounds(
            "farinelli-breathing",
            "Farinelli Breathing",
            Difficulty::Intermediate,
            "Build lung capacity and breath control with progressive holds",
            (5..=8)
                .enumerate()
                .map(|(i, beats)| BreathingRound::new(i as u32 + 1, beats, beats, beats))
                .collect(),
        ),
        breathing_exercise(
            "diaphragmatic-breathing",
            "Diaphragmatic Breathing",
            Difficulty::Beginner,
            "Master belly breathing - the foundation of vocal power",
            (5, 0, 5),
            6,
        ),
        breathing_exercise(
            "4-7-8-breathing",
            "4-7-8 Breathing",
            Difficulty::Beginner,
            "Natural tranquilizer for the nervous system",
            (4, 7, 8),
            5,
        ),
    ]
}
