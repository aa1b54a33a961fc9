//! TempoEngine: owner of templates, calibration, detection and tempo state.
//!
//! All mutation goes through engine methods. Exactly one of calibration or
//! detection runs per tick, selected by [`EngineMode`]; the template store is
//! written by calibration and read by detection, never both in one tick.
//! Presentation layers observe the engine through a broadcast channel of
//! [`EngineEvent`]s.

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::analysis::{
    DetectionLevels, FrameDetection, OnsetDetector, RmsLevelMeter, TempoBand, TempoEstimate,
    TempoStats, TempoTracker,
};
use crate::calibration::{
    CalibrationProgress, CalibrationSession, CalibrationTick, DrumClass, TemplateFlags,
    TemplateStore,
};
use crate::config::AppConfig;
use crate::error::{CalibrationError, ErrorCode};

const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Which pipeline owns the tick
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EngineMode {
    Idle,
    Calibrating,
    Monitoring,
}

/// Event emitted by the engine for presentation collaborators.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EngineEvent {
    ModeChanged {
        mode: EngineMode,
    },
    /// Instantaneous input loudness, emitted every tick
    InputLevel {
        rms: f32,
        percent: u8,
    },
    CalibrationProgress {
        progress: CalibrationProgress,
        percent: u8,
        prompt: String,
    },
    CalibrationCommitted {
        class: DrumClass,
        next: Option<DrumClass>,
        templates: TemplateFlags,
    },
    CalibrationFailed {
        code: i32,
        message: String,
    },
    /// Per-class detection levels (0-100) for the current frame
    Detection {
        levels: DetectionLevels,
    },
    Beat {
        timestamp_ms: u64,
    },
    Tempo {
        estimate: TempoEstimate,
        accuracy: f32,
        band: TempoBand,
    },
    TargetChanged {
        target_bpm: i32,
    },
}

/// Command accepted by [`TempoEngine::apply`], e.g. from a driver channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum EngineCommand {
    BeginCalibration { class: DrumClass, sequential: bool },
    CancelCalibration,
    StartMonitoring,
    StopMonitoring,
    SetTargetBpm { bpm: i32 },
}

/// What one tick did
#[derive(Debug, Clone, PartialEq)]
pub enum TickOutcome {
    /// Neither calibrating nor monitoring
    Idle,
    Calibration(Result<CalibrationTick, CalibrationError>),
    Detection {
        detection: FrameDetection,
        estimate: Option<TempoEstimate>,
    },
}

pub struct TempoEngine {
    config: AppConfig,
    templates: TemplateStore,
    calibration: CalibrationSession,
    detector: OnsetDetector,
    tracker: TempoTracker,
    meter: RmsLevelMeter,
    sample_rate: u32,
    mode: EngineMode,
    events_tx: broadcast::Sender<EngineEvent>,
}

impl Default for TempoEngine {
    fn default() -> Self {
        Self::new(AppConfig::default(), 120)
    }
}

impl TempoEngine {
    pub fn new(config: AppConfig, target_bpm: i32) -> Self {
        let sample_rate = config.audio.default_sample_rate;
        let (events_tx, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            templates: TemplateStore::new(),
            calibration: CalibrationSession::new(config.calibration.clone(), sample_rate),
            detector: OnsetDetector::with_config(&config.detection),
            tracker: TempoTracker::new(config.tempo.clone(), target_bpm),
            meter: RmsLevelMeter::new(),
            sample_rate,
            mode: EngineMode::Idle,
            events_tx,
            config,
        }
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Subscribe to engine events
    pub fn subscribe(&self) -> broadcast::Receiver<EngineEvent> {
        self.events_tx.subscribe()
    }

    fn emit(&self, event: EngineEvent) {
        let _ = self.events_tx.send(event);
    }

    fn set_mode(&mut self, mode: EngineMode) {
        if self.mode != mode {
            tracing::info!("[Engine] Mode {:?} -> {:?}", self.mode, mode);
            self.mode = mode;
            self.emit(EngineEvent::ModeChanged { mode });
        }
    }

    pub fn mode(&self) -> EngineMode {
        self.mode
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Adopt the source's sampling rate, falling back to the configured default
    pub fn set_sample_rate(&mut self, sample_rate: Option<u32>) {
        let rate = sample_rate
            .filter(|&rate| rate > 0)
            .unwrap_or(self.config.audio.default_sample_rate);
        if rate != self.sample_rate {
            tracing::info!("[Engine] Sample rate {} Hz", rate);
        }
        self.sample_rate = rate;
        self.calibration.set_sample_rate(rate);
    }

    // ========================================================================
    // CALIBRATION
    // ========================================================================

    /// Start capturing a template for `class`.
    ///
    /// Restarting while already calibrating discards the in-progress buffer.
    pub fn begin_calibration(
        &mut self,
        class: DrumClass,
        sequential: bool,
    ) -> Result<(), CalibrationError> {
        if self.mode == EngineMode::Monitoring {
            return Err(CalibrationError::MonitoringActive);
        }
        self.calibration.begin(class, sequential);
        self.set_mode(EngineMode::Calibrating);
        if let Some(progress) = self.calibration.progress() {
            self.emit_progress(progress);
        }
        Ok(())
    }

    /// Abort calibration; no template is written.
    pub fn cancel_calibration(&mut self) {
        self.calibration.cancel();
        if self.mode == EngineMode::Calibrating {
            self.set_mode(EngineMode::Idle);
        }
    }

    pub fn calibration_progress(&self) -> Option<CalibrationProgress> {
        self.calibration.progress()
    }

    pub fn template_flags(&self) -> TemplateFlags {
        self.templates.flags()
    }

    pub fn templates(&self) -> &TemplateStore {
        &self.templates
    }

    fn emit_progress(&self, progress: CalibrationProgress) {
        let percent = progress.percentage();
        let prompt = progress.class.prompt().to_string();
        self.emit(EngineEvent::CalibrationProgress {
            progress,
            percent,
            prompt,
        });
    }

    // ========================================================================
    // MONITORING
    // ========================================================================

    /// Start detection with a fresh tempo session.
    pub fn start_monitoring(&mut self) -> Result<(), CalibrationError> {
        if self.mode == EngineMode::Calibrating {
            return Err(CalibrationError::CalibrationActive);
        }
        if !self.templates.has_any() {
            return Err(CalibrationError::NoTemplates);
        }
        self.detector.reset();
        self.tracker.reset();
        self.set_mode(EngineMode::Monitoring);
        Ok(())
    }

    pub fn stop_monitoring(&mut self) {
        if self.mode == EngineMode::Monitoring {
            self.set_mode(EngineMode::Idle);
        }
    }

    pub fn set_target_bpm(&mut self, target_bpm: i32) {
        self.tracker.set_target_bpm(target_bpm);
        self.emit(EngineEvent::TargetChanged { target_bpm });
    }

    pub fn target_bpm(&self) -> i32 {
        self.tracker.target_bpm()
    }

    pub fn current_bpm(&self) -> u32 {
        self.tracker.current_bpm()
    }

    pub fn accuracy(&self) -> f32 {
        self.tracker.accuracy()
    }

    pub fn stats(&self) -> TempoStats {
        self.tracker.stats()
    }

    pub fn history(&self) -> Vec<TempoEstimate> {
        self.tracker.history()
    }

    pub fn chart_series(&self) -> Vec<u32> {
        self.tracker.chart_series()
    }

    pub fn chart_window(&self) -> Option<crate::analysis::ChartWindow> {
        self.tracker.chart_window(self.tracker.target_bpm())
    }

    /// Apply a queued command.
    pub fn apply(&mut self, command: EngineCommand) -> Result<(), CalibrationError> {
        tracing::debug!("[Engine] Command {:?}", command);
        match command {
            EngineCommand::BeginCalibration { class, sequential } => {
                self.begin_calibration(class, sequential)
            }
            EngineCommand::CancelCalibration => {
                self.cancel_calibration();
                Ok(())
            }
            EngineCommand::StartMonitoring => self.start_monitoring(),
            EngineCommand::StopMonitoring => {
                self.stop_monitoring();
                Ok(())
            }
            EngineCommand::SetTargetBpm { bpm } => {
                self.set_target_bpm(bpm);
                Ok(())
            }
        }
    }

    // ========================================================================
    // TICK
    // ========================================================================

    /// Process one frame.
    ///
    /// # Arguments
    /// * `frame` - Latest frame from the audio source
    /// * `timestamp_ms` - Monotonic clock reading for this tick
    pub fn tick(&mut self, frame: &[f32], timestamp_ms: u64) -> TickOutcome {
        let rms = self.meter.measure(frame);
        self.emit(EngineEvent::InputLevel {
            rms,
            percent: self.meter.level_percent(frame),
        });

        match self.mode {
            EngineMode::Idle => TickOutcome::Idle,
            EngineMode::Calibrating => TickOutcome::Calibration(self.tick_calibration(frame)),
            EngineMode::Monitoring => self.tick_detection(frame, timestamp_ms),
        }
    }

    fn tick_calibration(&mut self, frame: &[f32]) -> Result<CalibrationTick, CalibrationError> {
        let result = self.calibration.tick(frame, &mut self.templates);
        match &result {
            Ok(CalibrationTick::Progress(progress)) => self.emit_progress(progress.clone()),
            Ok(CalibrationTick::Committed { class, next }) => {
                self.emit(EngineEvent::CalibrationCommitted {
                    class: *class,
                    next: *next,
                    templates: self.templates.flags(),
                });
                match next {
                    Some(_) => {
                        if let Some(progress) = self.calibration.progress() {
                            self.emit_progress(progress);
                        }
                    }
                    None => self.set_mode(EngineMode::Idle),
                }
            }
            Err(err) => {
                self.emit(EngineEvent::CalibrationFailed {
                    code: err.code(),
                    message: err.message(),
                });
                self.set_mode(EngineMode::Idle);
            }
        }
        result
    }

    fn tick_detection(&mut self, frame: &[f32], timestamp_ms: u64) -> TickOutcome {
        let detection = self.detector.process(frame, &self.templates, timestamp_ms);
        self.emit(EngineEvent::Detection {
            levels: detection.matched.levels(),
        });

        let estimate = match detection.beat {
            Some(beat) => {
                self.emit(EngineEvent::Beat {
                    timestamp_ms: beat.timestamp_ms,
                });
                self.tracker.on_beat(beat, &detection.matched)
            }
            None => None,
        };

        if let Some(estimate) = estimate {
            self.emit(EngineEvent::Tempo {
                estimate,
                accuracy: self.tracker.accuracy(),
                band: self.tracker.band(),
            });
        }

        TickOutcome::Detection {
            detection,
            estimate,
        }
    }
}
