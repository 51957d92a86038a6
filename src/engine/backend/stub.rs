use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use rand::{rngs::StdRng, SeedableRng};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

use crate::analysis::note_frequency;
use crate::audio::signals::{add_noise, SineOscillator};
use crate::audio::SampleBuffer;
use crate::error::AudioError;

use super::{AudioBackend, CaptureCallback, TimeSource};

const DEFAULT_SAMPLE_RATE: u32 = 44100;
const DEFAULT_BUFFER_SIZE: usize = 2048;
const DEFAULT_INTERVAL: Duration = Duration::from_millis(40);
const DEFAULT_AMPLITUDE: f32 = 0.6;

/// What the simulated singer does while capture runs.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum StubSinger {
    /// Sing the last reference note played, shifted by `cents_offset`
    Echo { cents_offset: f32 },
    /// Deliver silent buffers
    Silent,
    /// Hold one frequency regardless of the reference
    Fixed { frequency_hz: f32 },
}

impl StubSinger {
    /// Echo the reference note exactly.
    pub fn in_tune() -> Self {
        StubSinger::Echo { cents_offset: 0.0 }
    }

    fn frequency_for(&self, reference_hz: Option<f32>) -> Option<f32> {
        match *self {
            StubSinger::Echo { cents_offset } => {
                reference_hz.map(|hz| hz * 2f32.powf(cents_offset / 1200.0))
            }
            StubSinger::Silent => None,
            StubSinger::Fixed { frequency_hz } => Some(frequency_hz),
        }
    }
}

#[derive(Default)]
struct StubState {
    initialized: bool,
    capture_task: Option<JoinHandle<()>>,
    played: Vec<String>,
}

/// Deterministic backend used by tests and the CLI simulator.
///
/// Capture is a tokio task that synthesizes one buffer per interval, so a
/// paused test clock drives it exactly like the session timers.
pub struct StubBackend {
    singer: StubSinger,
    sample_rate: u32,
    capture_rate: Option<u32>,
    rate_switch: Option<(u64, u32)>,
    buffer_size: usize,
    interval: Duration,
    amplitude: f32,
    noise: Option<(f32, u64)>,
    fail_initialize: bool,
    deny_permissions: bool,
    current_rate: Arc<AtomicU32>,
    reference_hz: Arc<Mutex<Option<f32>>>,
    capturing: AtomicBool,
    disposed: AtomicBool,
    state: Mutex<StubState>,
}

impl StubBackend {
    pub fn new(singer: StubSinger) -> Self {
        Self {
            singer,
            sample_rate: DEFAULT_SAMPLE_RATE,
            capture_rate: None,
            rate_switch: None,
            buffer_size: DEFAULT_BUFFER_SIZE,
            interval: DEFAULT_INTERVAL,
            amplitude: DEFAULT_AMPLITUDE,
            noise: None,
            fail_initialize: false,
            deny_permissions: false,
            current_rate: Arc::new(AtomicU32::new(DEFAULT_SAMPLE_RATE)),
            reference_hz: Arc::new(Mutex::new(None)),
            capturing: AtomicBool::new(false),
            disposed: AtomicBool::new(false),
            state: Mutex::new(StubState::default()),
        }
    }

    /// Rate reported before capture and used for every delivered buffer.
    pub fn with_sample_rate(mut self, sample_rate: u32) -> Self {
        self.sample_rate = sample_rate;
        self.current_rate = Arc::new(AtomicU32::new(sample_rate));
        self
    }

    /// Rate the device switches to once capture starts.
    pub fn with_capture_rate(mut self, sample_rate: u32) -> Self {
        self.capture_rate = Some(sample_rate);
        self
    }

    /// Switch the delivered rate after `buffers` buffers have been captured.
    pub fn with_rate_switch(mut self, buffers: u64, sample_rate: u32) -> Self {
        self.rate_switch = Some((buffers, sample_rate));
        self
    }

    pub fn with_buffer_size(mut self, buffer_size: usize) -> Self {
        self.buffer_size = buffer_size.max(1);
        self
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        if !interval.is_zero() {
            self.interval = interval;
        }
        self
    }

    /// Mix seeded white noise of the given amplitude into every buffer.
    pub fn with_noise(mut self, amplitude: f32, seed: u64) -> Self {
        self.noise = Some((amplitude, seed));
        self
    }

    /// Make `initialize` fail with a hardware error.
    pub fn failing_initialize(mut self) -> Self {
        self.fail_initialize = true;
        self
    }

    /// Make `request_permissions` report a refusal.
    pub fn denying_permissions(mut self) -> Self {
        self.deny_permissions = true;
        self
    }

    pub fn singer(&self) -> StubSinger {
        self.singer
    }

    /// Reference notes played so far, in order.
    pub fn played_notes(&self) -> Vec<String> {
        self.lock_state()
            .map(|state| state.played.clone())
            .unwrap_or_default()
    }

    pub fn is_capturing(&self) -> bool {
        self.capturing.load(Ordering::SeqCst)
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::SeqCst)
    }

    fn lock_state(&self) -> Result<MutexGuard<'_, StubState>, AudioError> {
        self.state.lock().map_err(|_| AudioError::LockPoisoned {
            component: "stub_backend".to_string(),
        })
    }

    fn ensure_initialized(&self) -> Result<MutexGuard<'_, StubState>, AudioError> {
        let state = self.lock_state()?;
        if !state.initialized {
            return Err(AudioError::NotInitialized);
        }
        Ok(state)
    }

    fn abort_capture(state: &mut StubState) {
        if let Some(task) = state.capture_task.take() {
            task.abort();
        }
    }
}

impl Default for StubBackend {
    fn default() -> Self {
        Self::new(StubSinger::in_tune())
    }
}

impl AudioBackend for StubBackend {
    fn initialize(&self) -> Result<(), AudioError> {
        if self.fail_initialize {
            return Err(AudioError::HardwareError {
                details: "simulated device failure".to_string(),
            });
        }

        let mut state = self.lock_state()?;
        state.initialized = true;
        self.disposed.store(false, Ordering::SeqCst);
        Ok(())
    }

    fn request_permissions(&self) -> Result<bool, AudioError> {
        let _state = self.ensure_initialized()?;
        Ok(!self.deny_permissions)
    }

    fn start_capture(&self, mut callback: CaptureCallback) -> Result<(), AudioError> {
        let mut state = self.ensure_initialized()?;
        if self.capturing.swap(true, Ordering::SeqCst) {
            return Err(AudioError::AlreadyCapturing);
        }

        let runtime = match tokio::runtime::Handle::try_current() {
            Ok(runtime) => runtime,
            Err(_) => {
                self.capturing.store(false, Ordering::SeqCst);
                return Err(AudioError::StreamOpenFailed {
                    reason: "stub capture requires a tokio runtime".to_string(),
                });
            }
        };

        let initial_rate = self.capture_rate.unwrap_or(self.sample_rate);
        self.current_rate.store(initial_rate, Ordering::SeqCst);

        let singer = self.singer;
        let rate_switch = self.rate_switch;
        let buffer_size = self.buffer_size;
        let interval = self.interval;
        let amplitude = self.amplitude;
        let noise = self.noise;
        let current_rate = Arc::clone(&self.current_rate);
        let reference_hz = Arc::clone(&self.reference_hz);

        let task = runtime.spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            let mut oscillator = SineOscillator::new(initial_rate);
            let mut rng = StdRng::seed_from_u64(noise.map(|(_, seed)| seed).unwrap_or(0));
            let mut delivered: u64 = 0;

            loop {
                ticker.tick().await;

                if let Some((after, rate)) = rate_switch {
                    if delivered == after {
                        log::info!("[StubBackend] Switching capture rate to {} Hz", rate);
                        current_rate.store(rate, Ordering::SeqCst);
                        oscillator.set_sample_rate(rate);
                    }
                }

                let reference = reference_hz.lock().ok().and_then(|guard| *guard);
                let mut samples = vec![0.0; buffer_size];
                if let Some(frequency) = singer.frequency_for(reference) {
                    oscillator.fill(frequency, amplitude, &mut samples);
                }
                if let Some((noise_amplitude, _)) = noise {
                    add_noise(&mut samples, noise_amplitude, &mut rng);
                }

                callback(SampleBuffer::new(samples, oscillator.sample_rate()));
                delivered += 1;
            }
        });

        state.capture_task = Some(task);
        log::debug!(
            "[StubBackend] Capture started at {} Hz ({} samples every {:?})",
            initial_rate,
            buffer_size,
            interval
        );
        Ok(())
    }

    fn stop_capture(&self) -> Result<(), AudioError> {
        let mut state = self.lock_state()?;
        if !self.capturing.swap(false, Ordering::SeqCst) {
            return Err(AudioError::NotCapturing);
        }
        Self::abort_capture(&mut state);
        log::debug!("[StubBackend] Capture stopped");
        Ok(())
    }

    fn play_note(&self, note: &str, duration: Duration) -> Result<(), AudioError> {
        let mut state = self.ensure_initialized()?;
        let frequency = note_frequency(note).ok_or_else(|| AudioError::PlaybackFailed {
            note: note.to_string(),
            reason: "unknown note name".to_string(),
        })?;

        state.played.push(note.to_string());
        let mut reference = self
            .reference_hz
            .lock()
            .map_err(|_| AudioError::LockPoisoned {
                component: "stub_reference".to_string(),
            })?;
        *reference = Some(frequency);

        log::debug!(
            "[StubBackend] Reference {} ({:.2} Hz) for {:?}",
            note,
            frequency,
            duration
        );
        Ok(())
    }

    fn sample_rate(&self) -> u32 {
        self.current_rate.load(Ordering::SeqCst)
    }

    fn dispose(&self) {
        self.capturing.store(false, Ordering::SeqCst);
        if let Ok(mut state) = self.state.lock() {
            Self::abort_capture(&mut state);
            state.initialized = false;
        }
        if let Ok(mut reference) = self.reference_hz.lock() {
            *reference = None;
        }
        self.disposed.store(true, Ordering::SeqCst);
    }
}

impl Drop for StubBackend {
    fn drop(&mut self) {
        if let Ok(state) = self.state.get_mut() {
            Self::abort_capture(state);
        }
    }
}

/// Deterministic time source for desktop runs.
///
/// Each call to `now()` advances by a fixed 10ms to guarantee monotonic
/// timestamps even when no real audio stream is active.
pub struct StubTimeSource {
    start: Instant,
    offset_ms: AtomicU64,
}

impl StubTimeSource {
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
            offset_ms: AtomicU64::new(0),
        }
    }
}

impl Default for StubTimeSource {
    fn default() -> Self {
        Self::new()
    }
}

impl TimeSource for StubTimeSource {
    fn now(&self) -> Instant {
        let ms = self.offset_ms.fetch_add(10, Ordering::SeqCst);
        self.start + Duration::from_millis(ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::PitchEstimator;
    use tokio::sync::mpsc;

    fn channel_callback() -> (CaptureCallback, mpsc::UnboundedReceiver<SampleBuffer>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let callback: CaptureCallback = Box::new(move |buffer| {
            let _ = tx.send(buffer);
        });
        (callback, rx)
    }

    #[tokio::test(start_paused = true)]
    async fn test_capture_requires_initialize() {
        let backend = StubBackend::default();
        let (callback, _rx) = channel_callback();
        assert_eq!(
            backend.start_capture(callback),
            Err(AudioError::NotInitialized)
        );
        assert_eq!(
            backend.play_note("C4", Duration::from_millis(10)),
            Err(AudioError::NotInitialized)
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_echo_singer_follows_reference() {
        let backend = StubBackend::new(StubSinger::in_tune());
        backend.initialize().unwrap();
        backend.play_note("A4", Duration::from_millis(500)).unwrap();

        let (callback, mut rx) = channel_callback();
        backend.start_capture(callback).unwrap();

        let buffer = rx.recv().await.unwrap();
        assert_eq!(buffer.len(), DEFAULT_BUFFER_SIZE);
        assert_eq!(buffer.sample_rate, DEFAULT_SAMPLE_RATE);

        let mut estimator = PitchEstimator::new(buffer.sample_rate);
        let estimate = estimator.estimate(&buffer.samples);
        assert!((estimate.frequency_hz - 440.0).abs() < 4.4);
        assert_eq!(backend.played_notes(), vec!["A4".to_string()]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_silent_singer_and_interval() {
        let backend = StubBackend::new(StubSinger::Silent).with_interval(Duration::from_millis(20));
        backend.initialize().unwrap();
        let (callback, mut rx) = channel_callback();

        let started = Instant::now();
        backend.start_capture(callback).unwrap();
        for _ in 0..3 {
            let buffer = rx.recv().await.unwrap();
            assert!(buffer.samples.iter().all(|s| *s == 0.0));
        }
        let elapsed = started.elapsed();
        assert!(elapsed >= Duration::from_millis(40) && elapsed < Duration::from_millis(60));
    }

    #[tokio::test(start_paused = true)]
    async fn test_double_start_and_stop() {
        let backend = StubBackend::default();
        backend.initialize().unwrap();
        let (first, _rx1) = channel_callback();
        let (second, _rx2) = channel_callback();

        backend.start_capture(first).unwrap();
        assert_eq!(
            backend.start_capture(second),
            Err(AudioError::AlreadyCapturing)
        );
        backend.stop_capture().unwrap();
        assert_eq!(backend.stop_capture(), Err(AudioError::NotCapturing));
        assert!(!backend.is_capturing());
    }

    #[tokio::test(start_paused = true)]
    async fn test_injected_failures() {
        let failing = StubBackend::default().failing_initialize();
        assert!(matches!(
            failing.initialize(),
            Err(AudioError::HardwareError { .. })
        ));

        let denying = StubBackend::default().denying_permissions();
        denying.initialize().unwrap();
        assert_eq!(denying.request_permissions(), Ok(false));
    }

    #[tokio::test(start_paused = true)]
    async fn test_capture_rate_and_switch() {
        let backend = StubBackend::default()
            .with_sample_rate(44100)
            .with_capture_rate(48000)
            .with_rate_switch(2, 22050);
        backend.initialize().unwrap();
        assert_eq!(backend.sample_rate(), 44100);

        let (callback, mut rx) = channel_callback();
        backend.start_capture(callback).unwrap();
        assert_eq!(backend.sample_rate(), 48000);

        let rates: Vec<u32> = vec![
            rx.recv().await.unwrap().sample_rate,
            rx.recv().await.unwrap().sample_rate,
            rx.recv().await.unwrap().sample_rate,
        ];
        assert_eq!(rates, vec![48000, 48000, 22050]);
        assert_eq!(backend.sample_rate(), 22050);
    }

    #[tokio::test(start_paused = true)]
    async fn test_unknown_note_fails_playback() {
        let backend = StubBackend::default();
        backend.initialize().unwrap();
        assert!(matches!(
            backend.play_note("H2", Duration::from_millis(10)),
            Err(AudioError::PlaybackFailed { .. })
        ));
        assert!(backend.played_notes().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_dispose_stops_capture() {
        let backend = StubBackend::default();
        backend.initialize().unwrap();
        let (callback, mut rx) = channel_callback();
        backend.start_capture(callback).unwrap();
        rx.recv().await.unwrap();

        backend.dispose();
        assert!(backend.is_disposed());
        assert!(!backend.is_capturing());
        // Aborted task drops the callback, closing the channel
        while rx.recv().await.is_some() {}
    }

    #[test]
    fn test_stub_time_source_steps() {
        let source = StubTimeSource::new();
        let first = source.now();
        let second = source.now();
        assert_eq!(second - first, Duration::from_millis(10));
    }
}
