// Analysis module - pitch estimation, note mapping and scoring
//
// Everything here is synchronous and allocation-light so it can run inside
// the session loop for every captured buffer.
//
// Pipeline:
// - PitchEstimator (YIN): samples → (frequency, confidence)
// - notes: frequency → nearest note name + cents
// - PitchSmoother: cents → stable display value
// - AccuracyScorer: per-note readings → NoteResult → session feedback

pub mod notes;
pub mod scoring;
pub mod smoothing;
pub mod yin;

pub use notes::{cents_between, cents_off, note_frequency, to_note, AccuracyBand, NoteInfo};
pub use scoring::AccuracyScorer;
pub use smoothing::PitchSmoother;
pub use yin::{PitchEstimate, PitchEstimator};

#[cfg(test)]
mod tests;
