//! CPAL-based audio backend for desktop platforms (Linux, macOS, Windows)
//!
//! cpal streams are not `Send`, so every stream lives on one device thread
//! that owns the default input and output devices and receives commands over
//! a channel. Captured audio crosses from the real-time input callback to a
//! forwarding thread through the lock-free buffer pool, and the forwarding
//! thread hands each full buffer to the session's capture callback.

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread::JoinHandle;
use std::time::Duration;

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};

use crate::analysis::note_frequency;
use crate::audio::buffer_pool::{BufferPool, CaptureReader};
use crate::audio::{generate_reference_tone, SampleBuffer};
use crate::config::AudioConfig;
use crate::error::{log_audio_error, AudioError};

use super::{AudioBackend, CaptureCallback};

/// Rate reported before the device has been opened
const FALLBACK_SAMPLE_RATE: u32 = 44100;

/// Sleep between empty polls of the buffer pool
const FORWARD_POLL: Duration = Duration::from_millis(2);

type Reply<T> = Sender<Result<T, AudioError>>;

enum DeviceCommand {
    StartCapture {
        callback: CaptureCallback,
        reply: Reply<u32>,
    },
    StopCapture {
        reply: Reply<()>,
    },
    Play {
        samples: Vec<f32>,
        reply: Reply<()>,
    },
    Shutdown,
}

/// Rates negotiated when the device thread opened its devices
struct DeviceInfo {
    input_rate: u32,
    output_rate: u32,
}

struct DeviceWorker {
    commands: Sender<DeviceCommand>,
    thread: Option<JoinHandle<()>>,
}

/// Desktop backend driving the default input and output devices.
pub struct CpalBackend {
    config: AudioConfig,
    worker: Mutex<Option<DeviceWorker>>,
    input_rate: AtomicU32,
    output_rate: AtomicU32,
    capturing: AtomicBool,
}

impl CpalBackend {
    pub fn new(config: AudioConfig) -> Self {
        Self {
            config,
            worker: Mutex::new(None),
            input_rate: AtomicU32::new(FALLBACK_SAMPLE_RATE),
            output_rate: AtomicU32::new(FALLBACK_SAMPLE_RATE),
            capturing: AtomicBool::new(false),
        }
    }

    fn lock_worker(&self) -> Result<MutexGuard<'_, Option<DeviceWorker>>, AudioError> {
        self.worker.lock().map_err(|_| AudioError::LockPoisoned {
            component: "cpal_worker".to_string(),
        })
    }

    /// Send a command to the device thread and wait for its reply
    fn request<T>(
        &self,
        make: impl FnOnce(Reply<T>) -> DeviceCommand,
    ) -> Result<T, AudioError> {
        let (reply_tx, reply_rx) = mpsc::channel();
        {
            let guard = self.lock_worker()?;
            let worker = guard.as_ref().ok_or(AudioError::NotInitialized)?;
            worker
                .commands
                .send(make(reply_tx))
                .map_err(|_| device_thread_gone())?;
        }
        reply_rx.recv().map_err(|_| device_thread_gone())?
    }
}

fn device_thread_gone() -> AudioError {
    AudioError::StreamFailure {
        reason: "audio device thread exited".to_string(),
    }
}

impl AudioBackend for CpalBackend {
    fn initialize(&self) -> Result<(), AudioError> {
        let mut guard = self.lock_worker()?;
        if guard.is_some() {
            return Ok(());
        }

        let (command_tx, command_rx) = mpsc::channel();
        let (ready_tx, ready_rx) = mpsc::channel();
        let config = self.config.clone();

        let thread = std::thread::Builder::new()
            .name("vocal-audio-device".to_string())
            .spawn(move || run_device_thread(config, command_rx, ready_tx))
            .map_err(AudioError::from)?;

        let info = ready_rx.recv().map_err(|_| device_thread_gone())?;
        let info = match info {
            Ok(info) => info,
            Err(err) => {
                let _ = thread.join();
                log_audio_error(&err, "initialize");
                return Err(err);
            }
        };

        self.input_rate.store(info.input_rate, Ordering::SeqCst);
        self.output_rate.store(info.output_rate, Ordering::SeqCst);
        log::info!(
            "[CpalBackend] Devices ready (input {} Hz, output {} Hz)",
            info.input_rate,
            info.output_rate
        );

        *guard = Some(DeviceWorker {
            commands: command_tx,
            thread: Some(thread),
        });
        Ok(())
    }

    fn request_permissions(&self) -> Result<bool, AudioError> {
        // Desktop hosts grant access when the device opens
        let guard = self.lock_worker()?;
        if guard.is_none() {
            return Err(AudioError::NotInitialized);
        }
        Ok(true)
    }

    fn start_capture(&self, callback: CaptureCallback) -> Result<(), AudioError> {
        if self.capturing.swap(true, Ordering::SeqCst) {
            return Err(AudioError::AlreadyCapturing);
        }

        match self.request(|reply| DeviceCommand::StartCapture { callback, reply }) {
            Ok(rate) => {
                self.input_rate.store(rate, Ordering::SeqCst);
                Ok(())
            }
            Err(err) => {
                self.capturing.store(false, Ordering::SeqCst);
                log_audio_error(&err, "start_capture");
                Err(err)
            }
        }
    }

    fn stop_capture(&self) -> Result<(), AudioError> {
        let result = self.request(|reply| DeviceCommand::StopCapture { reply });
        self.capturing.store(false, Ordering::SeqCst);
        result
    }

    fn play_note(&self, note: &str, duration: Duration) -> Result<(), AudioError> {
        let frequency = note_frequency(note).ok_or_else(|| AudioError::PlaybackFailed {
            note: note.to_string(),
            reason: "unknown note name".to_string(),
        })?;
        let samples = generate_reference_tone(
            frequency,
            duration,
            self.output_rate.load(Ordering::SeqCst),
        );

        self.request(|reply| DeviceCommand::Play { samples, reply })
            .map_err(|err| match err {
                AudioError::StreamOpenFailed { reason } | AudioError::StreamFailure { reason } => {
                    AudioError::PlaybackFailed {
                        note: note.to_string(),
                        reason,
                    }
                }
                other => other,
            })
    }

    fn sample_rate(&self) -> u32 {
        self.input_rate.load(Ordering::SeqCst)
    }

    fn dispose(&self) {
        self.capturing.store(false, Ordering::SeqCst);
        let worker = match self.worker.lock() {
            Ok(mut guard) => guard.take(),
            Err(_) => return,
        };

        if let Some(mut worker) = worker {
            let _ = worker.commands.send(DeviceCommand::Shutdown);
            if let Some(thread) = worker.thread.take() {
                if thread.join().is_err() {
                    log::warn!("[CpalBackend] Device thread panicked during shutdown");
                }
            }
        }
    }
}

impl Drop for CpalBackend {
    fn drop(&mut self) {
        self.dispose();
    }
}

/// Devices opened by the device thread
struct Devices {
    input: cpal::Device,
    input_config: cpal::SupportedStreamConfig,
    output: cpal::Device,
    output_config: cpal::SupportedStreamConfig,
}

/// Input stream plus the thread forwarding its buffers
struct ActiveCapture {
    stream: cpal::Stream,
    running: Arc<AtomicBool>,
    forwarder: Option<JoinHandle<()>>,
}

impl ActiveCapture {
    fn stop(mut self) {
        drop(self.stream);
        self.running.store(false, Ordering::SeqCst);
        if let Some(forwarder) = self.forwarder.take() {
            let _ = forwarder.join();
        }
    }
}

fn run_device_thread(
    config: AudioConfig,
    commands: Receiver<DeviceCommand>,
    ready: Sender<Result<DeviceInfo, AudioError>>,
) {
    let devices = match Devices::open() {
        Ok(devices) => devices,
        Err(err) => {
            let _ = ready.send(Err(err));
            return;
        }
    };
    let _ = ready.send(Ok(DeviceInfo {
        input_rate: devices.input_config.sample_rate().0,
        output_rate: devices.output_config.sample_rate().0,
    }));

    let mut capture: Option<ActiveCapture> = None;
    let mut playback: Option<cpal::Stream> = None;

    while let Ok(command) = commands.recv() {
        match command {
            DeviceCommand::StartCapture { callback, reply } => {
                let result = if capture.is_some() {
                    Err(AudioError::AlreadyCapturing)
                } else {
                    devices.start_capture(&config, callback).map(|(active, rate)| {
                        capture = Some(active);
                        rate
                    })
                };
                let _ = reply.send(result);
            }
            DeviceCommand::StopCapture { reply } => {
                let result = match capture.take() {
                    Some(active) => {
                        active.stop();
                        Ok(())
                    }
                    None => Err(AudioError::NotCapturing),
                };
                let _ = reply.send(result);
            }
            DeviceCommand::Play { samples, reply } => {
                // Replacing the stream cuts off any tone still sounding
                playback = None;
                let result = devices.play(samples).map(|stream| {
                    playback = Some(stream);
                });
                let _ = reply.send(result);
            }
            DeviceCommand::Shutdown => break,
        }
    }

    if let Some(active) = capture.take() {
        active.stop();
    }
    drop(playback);
    log::debug!("[CpalBackend] Device thread exiting");
}

impl Devices {
    fn open() -> Result<Self, AudioError> {
        let host = cpal::default_host();
        let input = host
            .default_input_device()
            .ok_or_else(|| AudioError::StreamOpenFailed {
                reason: "No default input device found".to_string(),
            })?;
        let input_config =
            input
                .default_input_config()
                .map_err(|e| AudioError::StreamOpenFailed {
                    reason: format!("Failed to get default input config: {:?}", e),
                })?;

        let output = host
            .default_output_device()
            .ok_or_else(|| AudioError::StreamOpenFailed {
                reason: "No default output device found".to_string(),
            })?;
        let output_config =
            output
                .default_output_config()
                .map_err(|e| AudioError::StreamOpenFailed {
                    reason: format!("Failed to get default output config: {:?}", e),
                })?;

        Ok(Self {
            input,
            input_config,
            output,
            output_config,
        })
    }

    fn start_capture(
        &self,
        config: &AudioConfig,
        callback: CaptureCallback,
    ) -> Result<(ActiveCapture, u32), AudioError> {
        if self.input_config.sample_format() != cpal::SampleFormat::F32 {
            return Err(AudioError::StreamOpenFailed {
                reason: "Only F32 sample format is currently supported for input".to_string(),
            });
        }

        let (mut writer, reader) = BufferPool::new(config.buffer_pool_size, config.buffer_size)?;
        let stream_config: cpal::StreamConfig = self.input_config.clone().into();
        let channels = stream_config.channels as usize;
        let sample_rate = stream_config.sample_rate.0;

        let stream = self
            .input
            .build_input_stream(
                &stream_config,
                move |data: &[f32], _: &cpal::InputCallbackInfo| {
                    writer.write_interleaved(data, channels);
                },
                |err| log::error!("[CpalBackend] Input stream error: {}", err),
                None,
            )
            .map_err(|e| AudioError::StreamOpenFailed {
                reason: format!("{:?}", e),
            })?;

        stream.play().map_err(|e| AudioError::HardwareError {
            details: format!("Input start failed: {}", e),
        })?;

        let running = Arc::new(AtomicBool::new(true));
        let forwarder = spawn_forwarder(reader, callback, sample_rate, Arc::clone(&running))?;

        Ok((
            ActiveCapture {
                stream,
                running,
                forwarder: Some(forwarder),
            },
            sample_rate,
        ))
    }

    fn play(&self, samples: Vec<f32>) -> Result<cpal::Stream, AudioError> {
        if self.output_config.sample_format() != cpal::SampleFormat::F32 {
            return Err(AudioError::StreamOpenFailed {
                reason: "Only F32 sample format is currently supported for output".to_string(),
            });
        }

        let stream_config: cpal::StreamConfig = self.output_config.clone().into();
        let channels = (stream_config.channels as usize).max(1);
        let mut position = 0usize;

        let stream = self
            .output
            .build_output_stream(
                &stream_config,
                move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                    for frame in data.chunks_mut(channels) {
                        let value = samples.get(position).copied().unwrap_or(0.0);
                        position = position.saturating_add(1);
                        frame.fill(value);
                    }
                },
                |err| log::error!("[CpalBackend] Output stream error: {}", err),
                None,
            )
            .map_err(|e| AudioError::StreamOpenFailed {
                reason: format!("{:?}", e),
            })?;

        stream.play().map_err(|e| AudioError::HardwareError {
            details: format!("Output start failed: {}", e),
        })?;
        Ok(stream)
    }
}

fn spawn_forwarder(
    mut reader: CaptureReader,
    mut callback: CaptureCallback,
    sample_rate: u32,
    running: Arc<AtomicBool>,
) -> Result<JoinHandle<()>, AudioError> {
    std::thread::Builder::new()
        .name("vocal-audio-forward".to_string())
        .spawn(move || {
            while running.load(Ordering::SeqCst) {
                match reader.pop() {
                    Some(samples) => callback(SampleBuffer::new(samples, sample_rate)),
                    None => std::thread::sleep(FORWARD_POLL),
                }
            }
        })
        .map_err(AudioError::from)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_calls_before_initialize_are_rejected() {
        let backend = CpalBackend::new(AudioConfig::default());
        assert_eq!(backend.sample_rate(), FALLBACK_SAMPLE_RATE);
        assert_eq!(
            backend.request_permissions(),
            Err(AudioError::NotInitialized)
        );
        assert_eq!(
            backend.play_note("C4", Duration::from_millis(100)),
            Err(AudioError::NotInitialized)
        );
        assert_eq!(backend.stop_capture(), Err(AudioError::NotInitialized));
    }

    #[test]
    fn test_unknown_note_is_playback_failure() {
        let backend = CpalBackend::new(AudioConfig::default());
        assert!(matches!(
            backend.play_note("Q9", Duration::from_millis(100)),
            Err(AudioError::PlaybackFailed { .. })
        ));
    }

    #[test]
    fn test_dispose_without_initialize_is_noop() {
        let backend = CpalBackend::new(AudioConfig::default());
        backend.dispose();
        backend.dispose();
    }
}
