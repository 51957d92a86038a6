//! Note mapping - frequency to equal-tempered note name and cents offset
//!
//! Pure functions over twelve-tone equal temperament with A4 = 440 Hz.
//! Invalid input (non-positive or non-finite frequencies) maps to the
//! [`NO_NOTE`] sentinel instead of failing, so pitch noise never interrupts
//! a session.

use serde::{Deserialize, Serialize};

/// Reference pitch for A4 in Hz
pub const A4_FREQUENCY: f32 = 440.0;

/// Sharp-based note names, index 0 = C
pub const NOTE_NAMES: [&str; 12] = [
    "C", "C#", "D", "D#", "E", "F", "F#", "G", "G#", "A", "A#", "B",
];

/// Name reported when no note can be derived
pub const NO_NOTE: &str = "-";

/// C0 sits 4.75 octaves below A4
fn c0_frequency() -> f64 {
    A4_FREQUENCY as f64 * 2f64.powf(-4.75)
}

/// Nearest note and signed deviation from it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NoteInfo {
    /// Scientific pitch name ("A4", "C#3") or "-"
    pub name: String,
    /// Deviation from the nearest note in cents, within ±50
    pub cents: f32,
}

impl NoteInfo {
    fn none() -> Self {
        Self {
            name: NO_NOTE.to_string(),
            cents: 0.0,
        }
    }

    pub fn is_note(&self) -> bool {
        self.name != NO_NOTE
    }
}

/// Map a frequency to its nearest note and cents offset
///
/// # Examples
/// ```
/// use vocal_trainer::analysis::notes::to_note;
///
/// let note = to_note(440.0);
/// assert_eq!(note.name, "A4");
/// assert!(note.cents.abs() < 1e-3);
/// assert_eq!(to_note(0.0).name, "-");
/// ```
pub fn to_note(frequency_hz: f32) -> NoteInfo {
    if !frequency_hz.is_finite() || frequency_hz <= 0.0 {
        return NoteInfo::none();
    }

    let c0 = c0_frequency();
    let half_steps = 12.0 * (frequency_hz as f64 / c0).log2();
    let nearest = half_steps.round();

    // Octave follows the nearest note so B→C boundaries name the right octave
    let note_index = (nearest as i64).rem_euclid(12) as usize;
    let octave = (nearest / 12.0).floor() as i64;

    let nearest_frequency = c0 * 2f64.powf(nearest / 12.0);
    let cents = 1200.0 * (frequency_hz as f64 / nearest_frequency).log2();

    NoteInfo {
        name: format!("{}{}", NOTE_NAMES[note_index], octave),
        cents: cents as f32,
    }
}

/// Interval from `b` to `a` in cents: `1200 · log2(a / b)`
///
/// Plain formula; non-positive input gives a non-finite result. Use
/// [`cents_off`] where either frequency may be missing.
pub fn cents_between(a_hz: f32, b_hz: f32) -> f32 {
    (1200.0 * (a_hz as f64 / b_hz as f64).log2()) as f32
}

/// Cents from `target_hz` to `detected_hz`, or `None` unless both are positive
pub fn cents_off(detected_hz: f32, target_hz: f32) -> Option<f32> {
    let valid = |f: f32| f.is_finite() && f > 0.0;
    if valid(detected_hz) && valid(target_hz) {
        Some(cents_between(detected_hz, target_hz))
    } else {
        None
    }
}

/// Frequency of a note in scientific pitch notation
///
/// Accepts a letter A-G (either case), an optional `#` or `b` accidental and
/// a signed octave number: "A4", "C#5", "Bb3", "c-1".
pub fn note_frequency(name: &str) -> Option<f32> {
    let mut chars = name.trim().chars();
    let letter = chars.next()?.to_ascii_uppercase();
    let base: i32 = match letter {
        'C' => 0,
        'D' => 2,
        'E' => 4,
        'F' => 5,
        'G' => 7,
        'A' => 9,
        'B' => 11,
        _ => return None,
    };

    let rest = chars.as_str();
    let (accidental, octave_str) = match rest.chars().next() {
        Some('#') => (1, &rest[1..]),
        Some('b') => (-1, &rest[1..]),
        _ => (0, rest),
    };
    let octave: i32 = octave_str.parse().ok()?;

    let half_steps = octave * 12 + base + accidental;
    Some((c0_frequency() * 2f64.powf(half_steps as f64 / 12.0)) as f32)
}

/// Display bucket for a cents deviation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccuracyBand {
    /// |cents| ≤ 5
    Perfect,
    /// |cents| ≤ 10
    VeryGood,
    /// |cents| ≤ 20
    Good,
    /// |cents| ≤ 30
    Okay,
    Off,
}

impl AccuracyBand {
    pub fn from_cents(cents: f32) -> Self {
        let abs = cents.abs();
        if abs <= 5.0 {
            AccuracyBand::Perfect
        } else if abs <= 10.0 {
            AccuracyBand::VeryGood
        } else if abs <= 20.0 {
            AccuracyBand::Good
        } else if abs <= 30.0 {
            AccuracyBand::Okay
        } else {
            AccuracyBand::Off
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            AccuracyBand::Perfect => "Perfect",
            AccuracyBand::VeryGood => "Very good",
            AccuracyBand::Good => "Good",
            AccuracyBand::Okay => "Okay",
            AccuracyBand::Off => "Off pitch",
        }
    }
}
