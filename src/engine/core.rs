//! EngineHandle: long-lived owner of the audio backend and event channels.
//!
//! Front-ends (the CLI today) hold one handle and start exercises through it.
//! The handle spawns each run as a tokio task, publishes its events on the
//! shared broadcast channels, and guarantees at most one run at a time.

use std::sync::{Arc, Mutex, MutexGuard, RwLock};

use tokio::task::JoinHandle;

use crate::config::AppConfig;
use crate::engine::backend::{default_backend, AudioBackend};
use crate::error::{log_exercise_error, AudioError, ExerciseError};
use crate::exercise::{Exercise, ExerciseResults, ExerciseSettings};
use crate::managers::BroadcastChannelManager;
use crate::session::{
    BreathingSession, BreathingSummary, SessionOutcome, StopHandle, VocalSession,
};
use crate::telemetry::{TelemetryCollector, TelemetrySnapshot};

#[path = "core_subscriptions.rs"]
mod core_subscriptions;

/// How a run spawned by the engine ended.
#[derive(Debug, Clone, PartialEq)]
pub enum RunReport {
    Vocal(SessionOutcome<ExerciseResults>),
    Breathing(SessionOutcome<BreathingSummary>),
    /// The run's task panicked or was cancelled by the runtime
    Aborted,
}

impl RunReport {
    pub fn is_completed(&self) -> bool {
        match self {
            RunReport::Vocal(outcome) => outcome.is_completed(),
            RunReport::Breathing(outcome) => outcome.is_completed(),
            RunReport::Aborted => false,
        }
    }
}

type RunTask = JoinHandle<Result<RunReport, ExerciseError>>;

/// The run currently owned by the engine
struct ActiveRun {
    exercise_id: String,
    stop: StopHandle,
    task: RunTask,
}

/// EngineHandle orchestrates sessions and shared channels.
pub struct EngineHandle {
    config: Arc<RwLock<AppConfig>>,
    backend: Arc<dyn AudioBackend>,
    pub(crate) broadcasts: BroadcastChannelManager,
    telemetry: Arc<TelemetryCollector>,
    active: Mutex<Option<ActiveRun>>,
}

impl EngineHandle {
    /// Create a new EngineHandle with the bundled config and platform backend.
    pub fn new() -> Self {
        let config = AppConfig::load();
        let backend = default_backend(&config);
        Self::with_backend(config, backend)
    }

    /// Create an EngineHandle around an injected backend.
    pub fn with_backend(config: AppConfig, backend: Arc<dyn AudioBackend>) -> Self {
        let broadcasts = BroadcastChannelManager::new();
        broadcasts.init_vocal(config.session.event_capacity);
        broadcasts.init_breathing(config.session.event_capacity);

        Self {
            config: Arc::new(RwLock::new(config)),
            backend,
            broadcasts,
            telemetry: Arc::new(TelemetryCollector::default()),
            active: Mutex::new(None),
        }
    }

    /// Replace the telemetry collector, e.g. to inject a deterministic clock.
    pub fn with_telemetry(mut self, telemetry: Arc<TelemetryCollector>) -> Self {
        self.telemetry = telemetry;
        self
    }

    pub fn config(&self) -> AppConfig {
        self.config
            .read()
            .map(|config| config.clone())
            .unwrap_or_else(|poisoned| poisoned.into_inner().clone())
    }

    /// Replace the configuration used by subsequent runs.
    ///
    /// A run already in progress keeps the configuration it started with.
    pub fn update_config(&self, config: AppConfig) {
        match self.config.write() {
            Ok(mut guard) => *guard = config,
            Err(poisoned) => *poisoned.into_inner() = config,
        }
    }

    pub fn backend(&self) -> Arc<dyn AudioBackend> {
        Arc::clone(&self.backend)
    }

    pub fn telemetry(&self) -> Arc<TelemetryCollector> {
        Arc::clone(&self.telemetry)
    }

    pub fn telemetry_snapshot(&self) -> TelemetrySnapshot {
        self.telemetry.snapshot()
    }

    /// True while a spawned run has not yet finished.
    pub fn is_running(&self) -> bool {
        self.lock_active()
            .as_ref()
            .map(|run| !run.task.is_finished())
            .unwrap_or(false)
    }

    /// Id of the exercise currently running, if any.
    pub fn active_exercise_id(&self) -> Option<String> {
        self.lock_active()
            .as_ref()
            .filter(|run| !run.task.is_finished())
            .map(|run| run.exercise_id.clone())
    }

    // ========================================================================
    // EXERCISE LIFECYCLE
    // ========================================================================

    /// Start a vocal exercise on the engine's backend.
    ///
    /// Malformed exercises and settings are rejected here, before anything is
    /// spawned. Everything after that is reported on the vocal event channel
    /// and by [`stop_exercise`](Self::stop_exercise) /
    /// [`wait_for_exercise`](Self::wait_for_exercise).
    ///
    /// # Errors
    /// - `AlreadyRunning` while a previous run has not finished
    /// - Data errors for empty exercises, wrong kinds or invalid tempo
    /// - `Acquisition` when called outside a tokio runtime
    pub fn start_vocal_exercise(
        &self,
        exercise: &Exercise,
        settings: ExerciseSettings,
    ) -> Result<(), ExerciseError> {
        let mut active = self.lock_active();
        Self::check_not_running(&active)?;

        exercise.vocal_notes()?;
        settings.validate()?;
        let runtime = Self::runtime()?;

        let config = self.config();
        let events = self.broadcasts.init_vocal(config.session.event_capacity);
        let mut session = VocalSession::new(
            exercise.clone(),
            settings,
            Arc::clone(&self.backend),
            config,
        )
        .with_events(events)
        .with_telemetry(Arc::clone(&self.telemetry));
        let stop = session.stop_handle();

        let task = runtime.spawn(async move { session.run().await.map(RunReport::Vocal) });

        log::info!("[EngineHandle] Started vocal exercise '{}'", exercise.id);
        *active = Some(ActiveRun {
            exercise_id: exercise.id.clone(),
            stop,
            task,
        });
        Ok(())
    }

    /// Start a breathing drill. Breathing runs never touch the audio backend.
    pub fn start_breathing_exercise(&self, exercise: &Exercise) -> Result<(), ExerciseError> {
        let mut active = self.lock_active();
        Self::check_not_running(&active)?;

        let config = self.config();
        let session = BreathingSession::new(exercise, &config.session)?;
        let runtime = Self::runtime()?;

        let events = self.broadcasts.init_breathing(config.session.event_capacity);
        let mut session = session
            .with_events(events)
            .with_telemetry(Arc::clone(&self.telemetry));
        let stop = session.stop_handle();

        let task = runtime.spawn(async move { Ok(RunReport::Breathing(session.run().await)) });

        log::info!("[EngineHandle] Started breathing exercise '{}'", exercise.id);
        *active = Some(ActiveRun {
            exercise_id: exercise.id.clone(),
            stop,
            task,
        });
        Ok(())
    }

    /// Stop the active run and wait until it has released its resources.
    ///
    /// A run that already finished on its own is reaped and its report
    /// returned unchanged.
    ///
    /// # Errors
    /// - `NotRunning` when no run was started since the last stop
    /// - The run's own error when it failed
    pub async fn stop_exercise(&self) -> Result<RunReport, ExerciseError> {
        let run = self.lock_active().take().ok_or(ExerciseError::NotRunning)?;
        if !run.task.is_finished() && !run.stop.stop() {
            log::warn!(
                "[EngineHandle] Run '{}' dropped its stop channel",
                run.exercise_id
            );
        }
        Self::join(run).await
    }

    /// Wait for the active run to finish without stopping it.
    pub async fn wait_for_exercise(&self) -> Result<RunReport, ExerciseError> {
        let run = self.lock_active().take().ok_or(ExerciseError::NotRunning)?;
        Self::join(run).await
    }

    async fn join(run: ActiveRun) -> Result<RunReport, ExerciseError> {
        match run.task.await {
            Ok(report) => report,
            Err(err) => {
                log::error!(
                    "[EngineHandle] Run '{}' did not finish: {}",
                    run.exercise_id,
                    err
                );
                Ok(RunReport::Aborted)
            }
        }
    }

    fn check_not_running(active: &Option<ActiveRun>) -> Result<(), ExerciseError> {
        match active {
            Some(run) if !run.task.is_finished() => {
                let err = ExerciseError::AlreadyRunning;
                log_exercise_error(&err, "start_exercise");
                Err(err)
            }
            _ => Ok(()),
        }
    }

    fn runtime() -> Result<tokio::runtime::Handle, ExerciseError> {
        tokio::runtime::Handle::try_current().map_err(|err| {
            ExerciseError::Acquisition(AudioError::HardwareError {
                details: format!("no tokio runtime available: {}", err),
            })
        })
    }

    fn lock_active(&self) -> MutexGuard<'_, Option<ActiveRun>> {
        self.active
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Default for EngineHandle {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for EngineHandle {
    fn drop(&mut self) {
        if let Ok(mut active) = self.active.lock() {
            if let Some(run) = active.take() {
                run.stop.stop();
            }
        }
    }
}
