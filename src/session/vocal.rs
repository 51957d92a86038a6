// VocalSession - note-by-note singing drill
//
// State flow per run:
//   Idle → (PlayingReference → Listening → Scored)* → Completed
//   any state → Interrupted on stop, Failed on error
//
// Audio buffers and stop requests share one channel consumed by the run
// loop; every wait is a `select!` between that channel and a tokio sleep.
// Samples are estimated whenever they arrive, but readings are only kept
// while Listening. Stop is honoured at every wait and before each note.

use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use tokio::sync::{broadcast, mpsc};
use tokio::time::Instant;

use crate::analysis::{
    cents_off, to_note, AccuracyScorer, PitchEstimate, PitchEstimator, PitchSmoother,
};
use crate::audio::{beat_duration, SampleBuffer};
use crate::config::AppConfig;
use crate::engine::backend::AudioBackend;
use crate::error::{log_exercise_error, AudioError, ErrorCode, ExerciseError};
use crate::exercise::{Exercise, ExerciseResults, ExerciseSettings, Note, NoteResult, PitchReading};
use crate::telemetry::{TelemetryCollector, TelemetryEventKind};

use super::events::{PitchUpdate, VocalEvent};
use super::{SessionInput, SessionOutcome, StopHandle};

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VocalState {
    Idle,
    PlayingReference,
    Listening,
    Scored,
    Completed,
    Interrupted,
    Failed,
}

/// Result of one suspension point
enum Wait {
    Elapsed,
    Stopped,
}

/// Runs one vocal exercise against an injected audio backend
pub struct VocalSession {
    exercise: Exercise,
    settings: ExerciseSettings,
    config: AppConfig,
    backend: Arc<dyn AudioBackend>,
    events: broadcast::Sender<VocalEvent>,
    telemetry: Option<Arc<TelemetryCollector>>,
    inputs_tx: mpsc::UnboundedSender<SessionInput>,
    inputs_rx: mpsc::UnboundedReceiver<SessionInput>,
    state: VocalState,
    estimator: PitchEstimator,
    smoother: PitchSmoother,
    scorer: AccuracyScorer,
    target: Option<Note>,
    readings: Vec<PitchReading>,
    results: Vec<NoteResult>,
    started_at: Option<Instant>,
    capturing: bool,
    torn_down: bool,
}

impl VocalSession {
    pub fn new(
        exercise: Exercise,
        settings: ExerciseSettings,
        backend: Arc<dyn AudioBackend>,
        config: AppConfig,
    ) -> Self {
        let (events, _) = broadcast::channel(config.session.event_capacity.max(1));
        let (inputs_tx, inputs_rx) = mpsc::unbounded_channel();
        let estimator = PitchEstimator::with_config(config.estimator.sample_rate, &config.estimator);
        let smoother = PitchSmoother::with_config(&config.smoothing);
        let scorer = AccuracyScorer::new(config.scoring.clone());

        Self {
            exercise,
            settings,
            config,
            backend,
            events,
            telemetry: None,
            inputs_tx,
            inputs_rx,
            state: VocalState::Idle,
            estimator,
            smoother,
            scorer,
            target: None,
            readings: Vec::new(),
            results: Vec::new(),
            started_at: None,
            capturing: false,
            torn_down: false,
        }
    }

    /// Publish on an existing channel instead of the session's own
    pub fn with_events(mut self, events: broadcast::Sender<VocalEvent>) -> Self {
        self.events = events;
        self
    }

    pub fn with_telemetry(mut self, telemetry: Arc<TelemetryCollector>) -> Self {
        self.telemetry = Some(telemetry);
        self
    }

    pub fn subscribe(&self) -> broadcast::Receiver<VocalEvent> {
        self.events.subscribe()
    }

    pub fn stop_handle(&self) -> StopHandle {
        StopHandle::new(self.inputs_tx.clone())
    }

    pub fn state(&self) -> VocalState {
        self.state
    }

    pub fn exercise(&self) -> &Exercise {
        &self.exercise
    }

    /// Run the exercise
    ///
    /// Completion emits `VocalEvent::Completed` exactly once. A stop yields
    /// `SessionOutcome::Interrupted` without results. Failures emit one
    /// `VocalEvent::Error` and are returned. Capture is torn down in every
    /// case before this returns.
    pub async fn run(&mut self) -> Result<SessionOutcome<ExerciseResults>, ExerciseError> {
        tracing::info!(
            exercise_id = %self.exercise.id,
            tempo_bpm = self.settings.tempo_bpm,
            tolerance = self.settings.tolerance,
            "vocal session started"
        );
        self.record(
            TelemetryEventKind::SessionStarted {
                exercise_id: self.exercise.id.clone(),
            },
            None,
        );

        let outcome = self.execute().await;
        self.teardown();

        match outcome {
            Ok(SessionOutcome::Completed(results)) => {
                self.state = VocalState::Completed;
                tracing::info!(
                    exercise_id = %results.exercise_id,
                    overall_accuracy = results.overall_accuracy,
                    "vocal session completed"
                );
                self.record(
                    TelemetryEventKind::SessionCompleted {
                        exercise_id: results.exercise_id.clone(),
                        overall_accuracy: Some(results.overall_accuracy),
                    },
                    None,
                );
                self.emit(VocalEvent::Completed(results.clone()));
                Ok(SessionOutcome::Completed(results))
            }
            Ok(SessionOutcome::Interrupted) => {
                self.state = VocalState::Interrupted;
                tracing::info!(
                    exercise_id = %self.exercise.id,
                    notes_scored = self.results.len(),
                    "vocal session stopped"
                );
                self.record(
                    TelemetryEventKind::SessionStopped {
                        exercise_id: self.exercise.id.clone(),
                    },
                    None,
                );
                Ok(SessionOutcome::Interrupted)
            }
            Err(err) => {
                self.state = VocalState::Failed;
                log_exercise_error(&err, "run");
                self.record(
                    TelemetryEventKind::SessionFailed {
                        exercise_id: self.exercise.id.clone(),
                        code: err.code(),
                    },
                    Some(err.message()),
                );
                self.emit(VocalEvent::Error {
                    code: err.code(),
                    message: err.message(),
                });
                Err(err)
            }
        }
    }

    async fn execute(&mut self) -> Result<SessionOutcome<ExerciseResults>, ExerciseError> {
        self.settings.validate()?;
        let notes = self.exercise.vocal_notes()?.to_vec();

        if self.stop_requested() {
            return Ok(SessionOutcome::Interrupted);
        }

        self.acquire()?;
        self.started_at = Some(Instant::now());
        self.results.clear();

        for index in 0..notes.len() {
            if self.stop_requested() {
                return Ok(SessionOutcome::Interrupted);
            }
            let note = notes
                .get(index)
                .cloned()
                .ok_or(ExerciseError::MissingNote { index })?;

            if let Wait::Stopped = self.run_note(index, note).await? {
                return Ok(SessionOutcome::Interrupted);
            }
        }

        if self.stop_requested() {
            return Ok(SessionOutcome::Interrupted);
        }

        self.teardown();
        Ok(SessionOutcome::Completed(self.build_results()))
    }

    /// Initialize the backend, obtain permission and start capture
    fn acquire(&mut self) -> Result<(), ExerciseError> {
        self.backend.initialize()?;
        if !self.backend.request_permissions()? {
            return Err(AudioError::PermissionDenied.into());
        }

        let inputs = self.inputs_tx.clone();
        self.backend.start_capture(Box::new(move |buffer| {
            let _ = inputs.send(SessionInput::Samples(buffer));
        }))?;
        self.capturing = true;

        // Devices may settle on a different rate once the stream is open
        let rate = self.backend.sample_rate();
        self.adjust_sample_rate(rate);
        Ok(())
    }

    async fn run_note(&mut self, index: usize, note: Note) -> Result<Wait, ExerciseError> {
        self.readings.clear();
        self.smoother.reset();
        self.target = Some(note.clone());
        self.emit(VocalEvent::NoteChanged {
            index,
            note: note.clone(),
        });

        let beat = beat_duration(self.settings.tempo_bpm);
        self.state = VocalState::PlayingReference;
        // A missing reference tone still leaves the note to be sung
        if let Err(err) = self.backend.play_note(&note.name, beat) {
            log::warn!(
                "[VocalSession] Reference tone for {} failed: {}",
                note.name,
                err
            );
            self.record(TelemetryEventKind::Warning, Some(err.to_string()));
        }
        if let Wait::Stopped = self.wait(beat).await {
            return Ok(Wait::Stopped);
        }

        let settle = Duration::from_millis(self.config.session.settle_delay_ms);
        if let Wait::Stopped = self.wait(settle).await {
            return Ok(Wait::Stopped);
        }

        self.state = VocalState::Listening;
        let window = Duration::from_millis(60_000 / self.settings.tempo_bpm as u64);
        tracing::debug!(note = %note.name, window_ms = window.as_millis() as u64, "listening");
        if let Wait::Stopped = self.wait(window).await {
            return Ok(Wait::Stopped);
        }

        self.state = VocalState::Scored;
        let readings = std::mem::take(&mut self.readings);
        let result = self
            .scorer
            .score_note(&note, readings, self.settings.tolerance);
        log::info!(
            "[VocalSession] {} scored {:.1}% ({} readings, passed={})",
            result.note_expected,
            result.average_accuracy,
            result.readings.len(),
            result.passed
        );
        self.emit(VocalEvent::NoteScored {
            index,
            result: result.clone(),
        });
        self.results.push(result);

        let gap = Duration::from_millis(self.config.session.note_gap_ms);
        Ok(self.wait(gap).await)
    }

    /// Suspend for `duration`, handling audio as it arrives
    async fn wait(&mut self, duration: Duration) -> Wait {
        let deadline = tokio::time::sleep(duration);
        tokio::pin!(deadline);

        loop {
            tokio::select! {
                biased;
                Some(input) = self.inputs_rx.recv() => match input {
                    SessionInput::Stop => return Wait::Stopped,
                    SessionInput::Samples(buffer) => self.process_buffer(buffer),
                },
                _ = &mut deadline => return Wait::Elapsed,
            }
        }
    }

    /// Drain queued input without waiting; true when a stop was queued
    fn stop_requested(&mut self) -> bool {
        let mut stop = false;
        while let Ok(input) = self.inputs_rx.try_recv() {
            match input {
                SessionInput::Stop => stop = true,
                SessionInput::Samples(buffer) => self.process_buffer(buffer),
            }
        }
        stop
    }

    fn process_buffer(&mut self, buffer: SampleBuffer) {
        if buffer.sample_rate != self.estimator.sample_rate() {
            self.adjust_sample_rate(buffer.sample_rate);
            if buffer.sample_rate != self.estimator.sample_rate() {
                return;
            }
        }
        if self.state != VocalState::Listening {
            return;
        }
        let Some(target) = self.target.clone() else {
            return;
        };

        let estimate = self.estimator.estimate(&buffer.samples);
        self.record_estimate(estimate, &target);
    }

    fn record_estimate(&mut self, estimate: PitchEstimate, target: &Note) {
        if !estimate.is_pitched() {
            self.smoother.reset();
            return;
        }
        if estimate.confidence <= self.config.estimator.min_confidence {
            return;
        }

        let cents = cents_off(estimate.frequency_hz, target.frequency_hz);
        let timestamp_ms = self
            .started_at
            .map(|started| started.elapsed().as_millis() as u64)
            .unwrap_or(0);
        self.readings.push(PitchReading {
            timestamp_ms,
            frequency_hz: estimate.frequency_hz,
            confidence: estimate.confidence,
            target_frequency_hz: target.frequency_hz,
            cents_off: cents,
        });

        let exclusion = self.scorer.config().exclusion_cents;
        let accuracy_percent = cents
            .filter(|c| c.abs() < exclusion)
            .map(AccuracyScorer::reading_accuracy)
            .unwrap_or(0.0);
        let smoothed_cents = match cents {
            Some(c) => self.smoother.smooth(c),
            None => self.smoother.rounded(),
        };

        self.emit(VocalEvent::PitchDetected(PitchUpdate {
            frequency_hz: estimate.frequency_hz,
            note_name: to_note(estimate.frequency_hz).name,
            confidence: estimate.confidence,
            accuracy_percent,
            smoothed_cents,
        }));
    }

    /// Follow the device rate; unsupported rates keep the current one
    fn adjust_sample_rate(&mut self, rate: u32) {
        let previous = self.estimator.sample_rate();
        if rate == previous {
            return;
        }

        match self.estimator.update_sample_rate(rate) {
            Ok(()) => {
                tracing::info!(from_hz = previous, to_hz = rate, "sample rate adjusted");
                self.record(
                    TelemetryEventKind::SampleRateAdjusted {
                        from_hz: previous,
                        to_hz: rate,
                    },
                    None,
                );
            }
            Err(err) => {
                log::warn!(
                    "[VocalSession] Ignoring buffers at unsupported rate: {}",
                    err
                );
                self.record(TelemetryEventKind::Warning, Some(err.to_string()));
            }
        }
    }

    fn build_results(&self) -> ExerciseResults {
        let completed_at_ms = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|elapsed| elapsed.as_millis() as u64)
            .unwrap_or_default();
        let duration_secs = self
            .started_at
            .map(|started| started.elapsed().as_secs_f32())
            .unwrap_or(0.0);

        ExerciseResults {
            exercise_id: self.exercise.id.clone(),
            completed_at_ms,
            duration_secs,
            overall_accuracy: self.scorer.overall_accuracy(&self.results),
            note_results: self.results.clone(),
            strengths: self.scorer.strengths(&self.results),
            improvements: self
                .scorer
                .improvements(&self.results, self.settings.tempo_bpm),
        }
    }

    /// Stop capture and release the backend; idempotent
    fn teardown(&mut self) {
        if self.torn_down {
            return;
        }
        self.torn_down = true;
        self.target = None;

        if self.capturing {
            self.capturing = false;
            if let Err(err) = self.backend.stop_capture() {
                log::warn!("[VocalSession] Failed to stop capture: {}", err);
            }
        }
        self.backend.dispose();
    }

    fn emit(&self, event: VocalEvent) {
        let _ = self.events.send(event);
    }

    fn record(&self, kind: TelemetryEventKind, detail: Option<String>) {
        if let Some(telemetry) = &self.telemetry {
            telemetry.record(kind, detail);
        }
    }
}

#[cfg(test)]
#[path = "vocal_tests.rs"]
mod tests;
