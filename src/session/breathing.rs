//! Breathing drills: a pure phase machine plus the tokio runner that ticks it.
//!
//! Phases run inhale → hold → exhale → transition → inhale of the next round.
//! A hold of 0 seconds is skipped without an event. The transition lasts
//! exactly one second and only happens while rounds remain. The machine knows nothing about time; the
//! runner feeds it one tick per second from a single interval.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{broadcast, mpsc};
use tokio::time::{Instant, MissedTickBehavior};

use crate::config::SessionConfig;
use crate::error::ExerciseError;
use crate::exercise::{BreathingRound, Exercise};
use crate::telemetry::{TelemetryCollector, TelemetryEventKind};

use super::events::{BreathingEvent, BreathingPhase};
use super::{SessionInput, SessionOutcome, StopHandle};

const TICK_PERIOD: Duration = Duration::from_secs(1);
/// Pause between rounds
pub const TRANSITION_SECS: u32 = 1;

/// Current position within a breathing drill, for display
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct PhaseSnapshot {
    pub phase: BreathingPhase,
    pub remaining_secs: u32,
    /// 1-based number of the current round
    pub round: u32,
    pub total_rounds: usize,
    pub rounds_completed: u32,
    /// Fraction of the current phase already elapsed, 0-1
    pub progress: f32,
}

#[derive(Debug, Clone)]
pub struct BreathingPhaseMachine {
    rounds: Vec<BreathingRound>,
    round_index: usize,
    phase: BreathingPhase,
    phase_duration: u32,
    remaining_secs: u32,
    rounds_completed: u32,
    elapsed_secs: u32,
    started: bool,
}

impl BreathingPhaseMachine {
    /// Build a machine over validated rounds
    ///
    /// # Errors
    /// `ExerciseError::InvalidRound` for an empty list or a round with a
    /// zero-length inhale or exhale.
    pub fn new(rounds: Vec<BreathingRound>) -> Result<Self, ExerciseError> {
        let first = rounds
            .first()
            .copied()
            .ok_or_else(|| ExerciseError::InvalidRound {
                index: 0,
                reason: "a breathing drill needs at least one round".to_string(),
            })?;
        for (index, round) in rounds.iter().enumerate() {
            round.validate(index)?;
        }

        Ok(Self {
            rounds,
            round_index: 0,
            phase: BreathingPhase::Inhale,
            phase_duration: first.inhale_beats,
            remaining_secs: first.inhale_beats,
            rounds_completed: 0,
            elapsed_secs: 0,
            started: false,
        })
    }

    pub fn from_exercise(exercise: &Exercise) -> Result<Self, ExerciseError> {
        Self::new(exercise.breathing_rounds()?.to_vec())
    }

    /// Enter the first inhale. Later calls do nothing.
    pub fn start(&mut self) -> Vec<BreathingEvent> {
        let mut events = Vec::new();
        if self.started {
            return events;
        }
        self.started = true;
        self.enter(BreathingPhase::Inhale, &mut events);
        events
    }

    /// Advance by one second
    ///
    /// Emits a tick for the current phase and, when it runs out, the events
    /// of whatever follows. Returns nothing before `start` or after completion.
    pub fn tick(&mut self) -> Vec<BreathingEvent> {
        let mut events = Vec::new();
        if !self.started || self.is_complete() {
            return events;
        }

        self.remaining_secs = self.remaining_secs.saturating_sub(1);
        self.elapsed_secs += 1;
        events.push(BreathingEvent::Tick {
            phase: self.phase,
            remaining_secs: self.remaining_secs,
            round: self.round_number(),
        });

        if self.remaining_secs == 0 {
            self.advance(&mut events);
        }
        events
    }

    pub fn is_complete(&self) -> bool {
        self.phase == BreathingPhase::Done
    }

    pub fn phase(&self) -> BreathingPhase {
        self.phase
    }

    pub fn total_rounds(&self) -> usize {
        self.rounds.len()
    }

    pub fn rounds_completed(&self) -> u32 {
        self.rounds_completed
    }

    /// Seconds ticked since `start`
    pub fn elapsed_secs(&self) -> u32 {
        self.elapsed_secs
    }

    pub fn snapshot(&self) -> PhaseSnapshot {
        let progress = if self.is_complete() {
            1.0
        } else if self.phase_duration > 0 {
            1.0 - self.remaining_secs as f32 / self.phase_duration as f32
        } else {
            0.0
        };

        PhaseSnapshot {
            phase: self.phase,
            remaining_secs: self.remaining_secs,
            round: self.round_number(),
            total_rounds: self.rounds.len(),
            rounds_completed: self.rounds_completed,
            progress,
        }
    }

    fn round_number(&self) -> u32 {
        self.rounds
            .get(self.round_index)
            .map(|round| round.number)
            .unwrap_or(0)
    }

    fn advance(&mut self, events: &mut Vec<BreathingEvent>) {
        match self.phase {
            BreathingPhase::Inhale => self.enter(BreathingPhase::Hold, events),
            BreathingPhase::Hold => self.enter(BreathingPhase::Exhale, events),
            BreathingPhase::Exhale => {
                self.rounds_completed += 1;
                events.push(BreathingEvent::RoundCompleted {
                    round: self.round_number(),
                });

                if self.round_index + 1 < self.rounds.len() {
                    self.round_index += 1;
                    self.enter(BreathingPhase::Transition, events);
                } else {
                    self.phase = BreathingPhase::Done;
                    self.phase_duration = 0;
                    self.remaining_secs = 0;
                    events.push(BreathingEvent::Completed);
                }
            }
            BreathingPhase::Transition => self.enter(BreathingPhase::Inhale, events),
            BreathingPhase::Done => {}
        }
    }

    fn enter(&mut self, phase: BreathingPhase, events: &mut Vec<BreathingEvent>) {
        let Some(round) = self.rounds.get(self.round_index).copied() else {
            return;
        };

        let duration = match phase {
            BreathingPhase::Inhale => round.inhale_beats,
            BreathingPhase::Hold => round.hold_beats,
            BreathingPhase::Exhale => round.exhale_beats,
            BreathingPhase::Transition => TRANSITION_SECS,
            BreathingPhase::Done => 0,
        };

        // Zero-length hold is skipped silently
        if phase == BreathingPhase::Hold && duration == 0 {
            return self.enter(BreathingPhase::Exhale, events);
        }

        self.phase = phase;
        self.phase_duration = duration;
        self.remaining_secs = duration;
        log::debug!(
            "[Breathing] Phase {:?}, {}s, round {}/{}",
            phase,
            duration,
            round.number,
            self.rounds.len()
        );
        events.push(BreathingEvent::PhaseChanged {
            phase,
            duration_secs: duration,
            round: round.number,
        });
    }
}

/// Summary of a finished breathing drill
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct BreathingSummary {
    pub exercise_id: String,
    pub rounds_completed: u32,
    pub duration_secs: u32,
}

/// Runs a [`BreathingPhaseMachine`] against the tokio clock
pub struct BreathingSession {
    exercise_id: String,
    machine: BreathingPhaseMachine,
    events: broadcast::Sender<BreathingEvent>,
    telemetry: Option<Arc<TelemetryCollector>>,
    inputs_tx: mpsc::UnboundedSender<SessionInput>,
    inputs_rx: mpsc::UnboundedReceiver<SessionInput>,
}

impl BreathingSession {
    pub fn new(exercise: &Exercise, config: &SessionConfig) -> Result<Self, ExerciseError> {
        let machine = BreathingPhaseMachine::from_exercise(exercise)?;
        let (events, _) = broadcast::channel(config.event_capacity.max(1));
        let (inputs_tx, inputs_rx) = mpsc::unbounded_channel();

        Ok(Self {
            exercise_id: exercise.id.clone(),
            machine,
            events,
            telemetry: None,
            inputs_tx,
            inputs_rx,
        })
    }

    /// Publish on an existing channel instead of the session's own
    pub fn with_events(mut self, events: broadcast::Sender<BreathingEvent>) -> Self {
        self.events = events;
        self
    }

    pub fn with_telemetry(mut self, telemetry: Arc<TelemetryCollector>) -> Self {
        self.telemetry = Some(telemetry);
        self
    }

    pub fn subscribe(&self) -> broadcast::Receiver<BreathingEvent> {
        self.events.subscribe()
    }

    pub fn stop_handle(&self) -> StopHandle {
        StopHandle::new(self.inputs_tx.clone())
    }

    pub fn snapshot(&self) -> PhaseSnapshot {
        self.machine.snapshot()
    }

    /// Run the drill to completion or until stopped
    pub async fn run(&mut self) -> SessionOutcome<BreathingSummary> {
        tracing::info!(
            exercise_id = %self.exercise_id,
            rounds = self.machine.total_rounds(),
            "breathing session started"
        );
        self.record(TelemetryEventKind::SessionStarted {
            exercise_id: self.exercise_id.clone(),
        });

        if self.stop_requested() {
            return self.interrupted();
        }

        let mut ticker = tokio::time::interval_at(Instant::now() + TICK_PERIOD, TICK_PERIOD);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let events = self.machine.start();
        self.publish(events);

        while !self.machine.is_complete() {
            tokio::select! {
                biased;
                Some(input) = self.inputs_rx.recv() => {
                    if matches!(input, SessionInput::Stop) {
                        return self.interrupted();
                    }
                }
                _ = ticker.tick() => {
                    let events = self.machine.tick();
                    self.publish(events);
                }
            }
        }

        let summary = BreathingSummary {
            exercise_id: self.exercise_id.clone(),
            rounds_completed: self.machine.rounds_completed(),
            duration_secs: self.machine.elapsed_secs(),
        };
        tracing::info!(
            exercise_id = %summary.exercise_id,
            duration_secs = summary.duration_secs,
            "breathing session completed"
        );
        self.record(TelemetryEventKind::SessionCompleted {
            exercise_id: self.exercise_id.clone(),
            overall_accuracy: None,
        });
        SessionOutcome::Completed(summary)
    }

    fn stop_requested(&mut self) -> bool {
        while let Ok(input) = self.inputs_rx.try_recv() {
            if matches!(input, SessionInput::Stop) {
                return true;
            }
        }
        false
    }

    fn interrupted(&self) -> SessionOutcome<BreathingSummary> {
        tracing::info!(
            exercise_id = %self.exercise_id,
            rounds_completed = self.machine.rounds_completed(),
            "breathing session stopped"
        );
        self.record(TelemetryEventKind::SessionStopped {
            exercise_id: self.exercise_id.clone(),
        });
        SessionOutcome::Interrupted
    }

    fn publish(&self, events: Vec<BreathingEvent>) {
        for event in events {
            let _ = self.events.send(event);
        }
    }

    fn record(&self, kind: TelemetryEventKind) {
        if let Some(telemetry) = &self.telemetry {
            telemetry.record(kind, None);
        }
    }
}
