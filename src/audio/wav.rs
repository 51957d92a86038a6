//! WAV file I/O for offline analysis and reference tone export.
//!
//! Reading mixes every channel down to mono and normalises integer PCM to
//! [-1, 1]. Writing produces 32-bit float mono files.

use std::path::Path;

use crate::audio::SampleBuffer;
use crate::error::AudioError;

fn read_error(path: &Path, err: impl std::fmt::Display) -> AudioError {
    AudioError::StreamFailure {
        reason: format!("error reading {}: {err}", path.display()),
    }
}

/// Load a WAV file as a mono [`SampleBuffer`].
pub fn read_wav(path: &Path) -> Result<SampleBuffer, AudioError> {
    let mut reader = hound::WavReader::open(path).map_err(|err| AudioError::StreamFailure {
        reason: format!("failed to open {}: {err}", path.display()),
    })?;
    let spec = reader.spec();
    if spec.channels == 0 {
        return Err(AudioError::StreamFailure {
            reason: format!("{} has zero channels", path.display()),
        });
    }

    let samples = match spec.sample_format {
        hound::SampleFormat::Float => reader
            .samples::<f32>()
            .map(|sample| sample.map_err(|err| read_error(path, err)))
            .collect::<Result<Vec<f32>, _>>()?,
        hound::SampleFormat::Int => {
            let scale = match spec.bits_per_sample {
                8 => i8::MAX as f32,
                16 => i16::MAX as f32,
                24 => 8_388_607.0,
                32 => i32::MAX as f32,
                bits => {
                    return Err(AudioError::StreamFailure {
                        reason: format!(
                            "unsupported bits_per_sample={} for {}",
                            bits,
                            path.display()
                        ),
                    })
                }
            };
            reader
                .samples::<i32>()
                .map(|sample| {
                    sample
                        .map(|v| v as f32 / scale)
                        .map_err(|err| read_error(path, err))
                })
                .collect::<Result<Vec<f32>, _>>()?
        }
    };

    if spec.channels == 1 {
        return Ok(SampleBuffer::new(samples, spec.sample_rate));
    }

    let channels = spec.channels as usize;
    let mono = samples
        .chunks(channels)
        .map(|frame| frame.iter().sum::<f32>() / channels as f32)
        .collect();

    Ok(SampleBuffer::new(mono, spec.sample_rate))
}

/// Write mono samples as a 32-bit float WAV file.
pub fn write_wav(path: &Path, buffer: &SampleBuffer) -> Result<(), AudioError> {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate: buffer.sample_rate,
        bits_per_sample: 32,
        sample_format: hound::SampleFormat::Float,
    };
    let write_error = |err: hound::Error| AudioError::StreamFailure {
        reason: format!("error writing {}: {err}", path.display()),
    };

    let mut writer = hound::WavWriter::create(path, spec).map_err(write_error)?;
    for sample in &buffer.samples {
        writer.write_sample(*sample).map_err(write_error)?;
    }
    writer.finalize().map_err(write_error)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::signals::sine_wave;
    use std::path::PathBuf;

    fn temp_path(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("vocal_trainer_{}_{}.wav", name, std::process::id()))
    }

    #[test]
    fn test_float_write_then_read() {
        let path = temp_path("float");
        let buffer = SampleBuffer::new(sine_wave(220.0, 22050, 2205, 0.5), 22050);

        write_wav(&path, &buffer).unwrap();
        let loaded = read_wav(&path).unwrap();

        assert_eq!(loaded.sample_rate, 22050);
        assert_eq!(loaded.len(), 2205);
        assert!((loaded.samples[100] - buffer.samples[100]).abs() < 1e-6);
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn test_stereo_int16_is_mixed_to_mono() {
        let path = temp_path("stereo");
        let spec = hound::WavSpec {
            channels: 2,
            sample_rate: 8000,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut writer = hound::WavWriter::create(&path, spec).unwrap();
        for _ in 0..4 {
            writer.write_sample(i16::MAX).unwrap();
            writer.write_sample(0i16).unwrap();
        }
        writer.finalize().unwrap();

        let loaded = read_wav(&path).unwrap();
        assert_eq!(loaded.len(), 4);
        assert!(loaded.samples.iter().all(|s| (s - 0.5).abs() < 1e-4));
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn test_missing_file_is_stream_failure() {
        let err = read_wav(Path::new("/nonexistent/take.wav")).unwrap_err();
        assert!(matches!(err, AudioError::StreamFailure { .. }));
    }
}
