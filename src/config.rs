//! Configuration management for dynamic parameter tuning
//!
//! The detection thresholds, debounce floor, outlier band and silence floor
//! are empirically tuned constants. They live here as named defaults so they
//! can be adjusted from a JSON file without recompilation.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Complete application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub detection: DetectionConfig,
    pub calibration: CalibrationConfig,
    pub tempo: TempoConfig,
    pub audio: AudioConfig,
}

/// How lag sums are normalized into a similarity score
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CorrelationNormalization {
    /// Divide every lag sum by the largest absolute lag sum
    #[default]
    PeakLag,
    /// Divide every lag sum by the energy of the overlapping spans
    Energy,
}

/// Onset detection parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectionConfig {
    /// Kick hit threshold on the correlation score
    pub kick_threshold: f32,
    /// Snare hit threshold on the correlation score
    pub snare_threshold: f32,
    /// Hi-hat hit threshold (lower: broadband, low-energy transient)
    pub hihat_threshold: f32,
    /// Minimum gap between accepted beat events in milliseconds
    pub debounce_ms: u64,
    /// Hard cap on correlation length per tick
    pub max_correlation_len: usize,
    /// Number of leading frame samples matched against templates
    pub frame_size: usize,
    /// Lag-sum normalization rule
    pub normalization: CorrelationNormalization,
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            kick_threshold: 0.30,
            snare_threshold: 0.25,
            hihat_threshold: 0.20,
            debounce_ms: 200,
            max_correlation_len: 2048,
            frame_size: 1024,
            normalization: CorrelationNormalization::PeakLag,
        }
    }
}

/// Template capture parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CalibrationConfig {
    /// Audio collected per class before committing
    pub collect_seconds: f32,
    /// Length of the committed template (tail of the rolling buffer)
    pub template_seconds: f32,
    /// Rolling buffer ceiling
    pub max_buffer_seconds: f32,
    /// Templates quieter than this RMS are rejected as silence
    pub silence_floor_rms: f32,
}

impl Default for CalibrationConfig {
    fn default() -> Self {
        Self {
            collect_seconds: 2.5,
            template_seconds: 1.0,
            max_buffer_seconds: 5.0,
            silence_floor_rms: 0.01,
        }
    }
}

/// Tempo estimation parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TempoConfig {
    /// Inter-beat intervals kept for estimation
    pub interval_capacity: usize,
    /// Intervals required before estimating
    pub min_intervals: usize,
    /// Intervals that must survive the median filter
    pub min_valid_intervals: usize,
    /// Accepted deviation from the median, as a fraction of the median
    pub outlier_band: f64,
    /// Lowest BPM surfaced
    pub min_bpm: u32,
    /// Highest BPM surfaced
    pub max_bpm: u32,
    /// Tempo estimates retained in history
    pub history_capacity: usize,
    /// Chart series length that triggers truncation
    pub chart_capacity: usize,
    /// Points kept when the chart series is truncated
    pub chart_retain: usize,
    /// Accuracy lost per BPM of deviation from target
    pub accuracy_penalty_per_bpm: f32,
    /// Points shown by the chart window
    pub chart_display_points: usize,
    /// Minimum half-range around the target in the chart window
    pub chart_margin_bpm: i64,
    /// Padding around observed points in the chart window
    pub chart_padding_bpm: i64,
}

impl Default for TempoConfig {
    fn default() -> Self {
        Self {
            interval_capacity: 8,
            min_intervals: 4,
            min_valid_intervals: 3,
            outlier_band: 0.25,
            min_bpm: 60,
            max_bpm: 200,
            history_capacity: 50,
            chart_capacity: 100,
            chart_retain: 50,
            accuracy_penalty_per_bpm: 3.0,
            chart_display_points: 30,
            chart_margin_bpm: 20,
            chart_padding_bpm: 5,
        }
    }
}

/// Audio source configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioConfig {
    /// Sampling rate assumed when the source cannot report one
    pub default_sample_rate: u32,
    /// Samples per frame pulled from the source
    pub frame_size: usize,
    /// Tick cadence of the driver loop
    pub tick_interval_ms: u64,
    /// Capacity of the input SPSC ring in samples
    pub ring_capacity: usize,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            default_sample_rate: 44100,
            frame_size: 1024,
            tick_interval_ms: 16,
            ring_capacity: 16384,
        }
    }
}

impl AppConfig {
    /// Load configuration from JSON file
    ///
    /// Missing or malformed files fall back to [`AppConfig::default`] with a
    /// warning, so a bad config never prevents the engine from starting.
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

    /// Load configuration from the default asset location
    pub fn load() -> Self {
        Self::load_from_file("assets/drum_tempo.json")
    }
}
