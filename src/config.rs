//! Configuration management for dynamic parameter tuning
//!
//! This module provides runtime configuration loading from JSON files,
//! enabling fast iteration without recompilation. Estimator, scoring and
//! session timing parameters can be adjusted via the config file while
//! tuning exercises against real singers.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Complete application configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub estimator: EstimatorConfig,
    pub smoothing: SmoothingConfig,
    pub scoring: ScoringConfig,
    pub session: SessionConfig,
    pub audio: AudioConfig,
}

/// YIN estimator parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EstimatorConfig {
    /// Cumulative-mean-normalized difference threshold for accepting a lag
    pub threshold: f32,
    /// Samples per analysis buffer requested from the capture stream
    pub buffer_size: usize,
    /// Sample rate requested from the capture stream
    pub sample_rate: u32,
    /// Readings at or below this confidence are not recorded for scoring
    pub min_confidence: f32,
}

impl Default for EstimatorConfig {
    fn default() -> Self {
        Self {
            threshold: crate::analysis::yin::DEFAULT_THRESHOLD,
            buffer_size: 2048,
            sample_rate: 44100,
            min_confidence: 0.5,
        }
    }
}

/// Display smoothing parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SmoothingConfig {
    /// EMA weight of the newest reading, clamped to [0, 1]
    pub factor: f32,
}

impl Default for SmoothingConfig {
    fn default() -> Self {
        Self { factor: 0.3 }
    }
}

/// Accuracy scoring parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringConfig {
    /// Readings whose |cents| reach this value are excluded
    pub exclusion_cents: f32,
    /// Pass threshold (percent) used when a run gives none
    pub default_tolerance: f32,
    /// Best-note average required for an "excellent" strength
    pub strength_threshold: f32,
    /// Share of passed notes required for the overall-accuracy strength
    pub pass_ratio_threshold: f32,
    /// Worst-note average below which an improvement is suggested
    pub improvement_threshold: f32,
    /// Mean cents beyond which a note is reported sharp or flat
    pub tendency_cents: f32,
    /// Tempo above which slowing down is suggested
    pub fast_tempo_bpm: u32,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            exclusion_cents: 50.0,
            default_tolerance: 70.0,
            strength_threshold: 90.0,
            pass_ratio_threshold: 0.7,
            improvement_threshold: 70.0,
            tendency_cents: 10.0,
            fast_tempo_bpm: 100,
        }
    }
}

/// Session timing parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Delay between the end of the reference tone and the listening window
    pub settle_delay_ms: u64,
    /// Gap after a note is scored before the next one starts
    pub note_gap_ms: u64,
    /// Capacity of each broadcast event channel
    pub event_capacity: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            settle_delay_ms: 300,
            note_gap_ms: 500,
            event_capacity: 256,
        }
    }
}

/// Audio backend configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioConfig {
    /// Size of buffer pool for real-time audio transfer
    pub buffer_pool_size: usize,
    /// Size of each audio buffer in samples
    pub buffer_size: usize,
    /// Interval between buffers delivered by the stub backend
    pub stub_interval_ms: u64,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            buffer_pool_size: 64,
            buffer_size: 2048,
            stub_interval_ms: 40,
        }
    }
}

impl AppConfig {
    /// Load configuration from JSON file
    ///
    /// # Arguments
    /// * `path` - Path to JSON config file
    ///
    /// # Returns
    /// The parsed configuration, or defaults if the file doesn't exist or the
    /// JSON is invalid. Missing fields take their default values.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Self {
        match fs::read_to_string(&path) {
            Ok(contents) => match serde_json::from_str(&contents) {
                Ok(config) => {
                    log::info!("[Config] Loaded configuration from {:?}", path.as_ref());
                    config
                }
                Err(err) => {
                    log::warn!(
                        "[Config] Failed to parse JSON from {:?}: {}. Using defaults.",
                        path.as_ref(),
                        err
                    );
                    Self::default()
                }
            },
            Err(err) => {
                log::warn!(
                    "[Config] Failed to read config file {:?}: {}. Using defaults.",
                    path.as_ref(),
                    err
                );
                Self::default()
            }
        }
    }

    /// Load configuration from the bundled assets directory
    pub fn load() -> Self {
        Self::load_from_file("assets/trainer_config.json")
    }
}
