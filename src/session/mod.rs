// Session module - timed exercise runs
//
// A session owns every resource of one run: its estimator, smoother, input
// channel and (for vocal drills) the audio backend lifecycle. Sessions run on
// the tokio clock and are stopped cooperatively through a StopHandle.

pub mod breathing;
pub mod events;
pub mod vocal;

use tokio::sync::mpsc;

use crate::audio::SampleBuffer;

pub use breathing::{BreathingPhaseMachine, BreathingSession, BreathingSummary, PhaseSnapshot};
pub use events::{BreathingEvent, BreathingPhase, PitchUpdate, VocalEvent};
pub use vocal::{VocalSession, VocalState};

/// Everything a running session reacts to, serialized through one channel
#[derive(Debug)]
pub enum SessionInput {
    Samples(SampleBuffer),
    Stop,
}

/// How a run ended when it did not fail
#[derive(Debug, Clone, PartialEq)]
pub enum SessionOutcome<T> {
    Completed(T),
    /// Stopped from outside; no results are produced
    Interrupted,
}

impl<T> SessionOutcome<T> {
    pub fn is_completed(&self) -> bool {
        matches!(self, SessionOutcome::Completed(_))
    }

    pub fn completed(self) -> Option<T> {
        match self {
            SessionOutcome::Completed(value) => Some(value),
            SessionOutcome::Interrupted => None,
        }
    }
}

/// Requests a cooperative stop of one session
#[derive(Debug, Clone)]
pub struct StopHandle {
    inputs: mpsc::UnboundedSender<SessionInput>,
}

impl StopHandle {
    pub(crate) fn new(inputs: mpsc::UnboundedSender<SessionInput>) -> Self {
        Self { inputs }
    }

    /// Ask the session to stop at its next suspension point.
    ///
    /// Returns `false` once the session has been dropped.
    pub fn stop(&self) -> bool {
        self.inputs.send(SessionInput::Stop).is_ok()
    }
}
