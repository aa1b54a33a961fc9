// CalibrationSession - template capture state machine
//
// Idle -> Collecting(class) -> Committed | Rejected
//   Committed: template stored; sequential mode moves on to the next class,
//              otherwise the session is Done.
//   Rejected:  tail was below the silence floor; session returns to Idle and
//              the class queue is dropped so the same class can be retried.
//
// Frames are appended to a rolling buffer capped at `max_buffer_seconds`.
// Once `collect_seconds` of audio has been seen, the last `template_seconds`
// of the buffer become the candidate template.

use std::collections::VecDeque;

use crate::analysis::level::{sanitize, RmsLevelMeter};
use crate::calibration::progress::{CalibrationProgress, DrumClass};
use crate::calibration::templates::TemplateStore;
use crate::config::CalibrationConfig;
use crate::error::{log_calibration_error, CalibrationError};

/// Where the session is in the capture workflow
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum CalibrationState {
    Idle,
    Collecting {
        class: DrumClass,
        /// Samples currently held in the rolling buffer
        buffered: usize,
    },
    /// Last requested class committed
    Done,
}

/// Result of feeding one frame to a collecting session
#[derive(Debug, Clone, PartialEq)]
pub enum CalibrationTick {
    /// Still collecting
    Progress(CalibrationProgress),
    /// Template stored; `next` is the class now being collected, if any
    Committed {
        class: DrumClass,
        next: Option<DrumClass>,
    },
}

pub struct CalibrationSession {
    config: CalibrationConfig,
    sample_rate: u32,
    state: CalibrationState,
    sequential: bool,
    queue: VecDeque<DrumClass>,
    buffer: Vec<f32>,
    collected: usize,
    meter: RmsLevelMeter,
}

impl CalibrationSession {
    pub fn new(config: CalibrationConfig, sample_rate: u32) -> Self {
        Self {
            config,
            sample_rate,
            state: CalibrationState::Idle,
            sequential: false,
            queue: VecDeque::new(),
            buffer: Vec::new(),
            collected: 0,
            meter: RmsLevelMeter::new(),
        }
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Applies to the next collection; an in-progress class keeps its target
    /// only until the next tick recomputes it.
    pub fn set_sample_rate(&mut self, sample_rate: u32) {
        self.sample_rate = sample_rate;
    }

    fn seconds_to_samples(&self, seconds: f32) -> usize {
        (self.sample_rate as f64 * seconds as f64).floor().max(0.0) as usize
    }

    /// Samples to collect before committing
    pub fn target_samples(&self) -> usize {
        self.seconds_to_samples(self.config.collect_seconds)
    }

    fn template_samples(&self) -> usize {
        self.seconds_to_samples(self.config.template_seconds).max(1)
    }

    fn max_buffer_samples(&self) -> usize {
        self.seconds_to_samples(self.config.max_buffer_seconds)
            .max(self.template_samples())
    }

    /// Start collecting `class`
    ///
    /// Calling this again before a tick is equivalent to calling it once:
    /// the buffer and counter are cleared either way.
    ///
    /// # Arguments
    /// * `class` - Class to collect first
    /// * `sequential` - Continue through the remaining classes after `class`
    pub fn begin(&mut self, class: DrumClass, sequential: bool) {
        self.sequential = sequential;
        self.queue.clear();
        if sequential {
            let mut next = class.next();
            while let Some(remaining) = next {
                self.queue.push_back(remaining);
                next = remaining.next();
            }
        }
        self.start_class(class);
        tracing::info!(
            "[Calibration] {} (sequential: {}, target {} samples)",
            class.prompt(),
            sequential,
            self.target_samples()
        );
    }

    fn start_class(&mut self, class: DrumClass) {
        self.buffer.clear();
        self.collected = 0;
        self.state = CalibrationState::Collecting { class, buffered: 0 };
    }

    /// Abort without writing a template
    pub fn cancel(&mut self) {
        if self.is_collecting() {
            tracing::info!("[Calibration] Cancelled");
        }
        self.reset();
    }

    fn reset(&mut self) {
        self.state = CalibrationState::Idle;
        self.queue.clear();
        self.buffer = Vec::new();
        self.collected = 0;
        self.sequential = false;
    }

    pub fn state(&self) -> CalibrationState {
        self.state
    }

    pub fn is_collecting(&self) -> bool {
        matches!(self.state, CalibrationState::Collecting { .. })
    }

    /// Classes still queued after the current one
    pub fn remaining(&self) -> Vec<DrumClass> {
        self.queue.iter().copied().collect()
    }

    /// Progress of the class being collected
    pub fn progress(&self) -> Option<CalibrationProgress> {
        match self.state {
            CalibrationState::Collecting { class, .. } => Some(CalibrationProgress {
                class,
                collected_samples: self.collected,
                target_samples: self.target_samples(),
                sequential: self.sequential,
            }),
            _ => None,
        }
    }

    /// Feed one frame
    ///
    /// # Returns
    /// * `Ok(Progress)` - Still collecting
    /// * `Ok(Committed)` - Template written to `store`
    /// * `Err(SilenceRejected)` - Candidate too quiet; session is back to Idle
    /// * `Err(NotCollecting)` - No class is being collected
    pub fn tick(
        &mut self,
        frame: &[f32],
        store: &mut TemplateStore,
    ) -> Result<CalibrationTick, CalibrationError> {
        let class = match self.state {
            CalibrationState::Collecting { class, .. } => class,
            CalibrationState::Idle | CalibrationState::Done => {
                return Err(CalibrationError::NotCollecting)
            }
        };

        self.buffer.extend(frame.iter().copied().map(sanitize));
        self.collected += frame.len();

        let max = self.max_buffer_samples();
        if self.buffer.len() > max {
            let excess = self.buffer.len() - max;
            self.buffer.drain(..excess);
        }
        self.state = CalibrationState::Collecting {
            class,
            buffered: self.buffer.len(),
        };

        if self.collected < self.target_samples() {
            return Ok(CalibrationTick::Progress(CalibrationProgress {
                class,
                collected_samples: self.collected,
                target_samples: self.target_samples(),
                sequential: self.sequential,
            }));
        }

        self.commit(class, store)
    }

    fn commit(
        &mut self,
        class: DrumClass,
        store: &mut TemplateStore,
    ) -> Result<CalibrationTick, CalibrationError> {
        let start = self.buffer.len().saturating_sub(self.template_samples());
        let candidate = self.buffer[start..].to_vec();
        let level = self.meter.measure(&candidate);
        let floor = self.config.silence_floor_rms;

        if level < floor {
            let err = CalibrationError::SilenceRejected {
                class,
                rms: level,
                floor,
            };
            tracing::warn!(
                "[Calibration] Rejected {}: RMS {:.4} below floor {:.4}",
                class,
                level,
                floor
            );
            log_calibration_error(&err, "CalibrationSession::commit");
            self.reset();
            return Err(err);
        }

        let template_len = candidate.len();
        if let Err(err) = store.set(class, candidate) {
            log_calibration_error(&err, "CalibrationSession::commit");
            self.reset();
            return Err(err);
        }
        tracing::info!(
            "[Calibration] Committed {} template ({} samples, RMS {:.4})",
            class,
            template_len,
            level
        );

        let next = if self.sequential {
            self.queue.pop_front()
        } else {
            None
        };
        match next {
            Some(next_class) => {
                self.start_class(next_class);
                tracing::info!("[Calibration] {}", next_class.prompt());
            }
            None => {
                self.buffer = Vec::new();
                self.collected = 0;
                self.queue.clear();
                self.state = CalibrationState::Done;
                tracing::info!("[Calibration] Complete");
            }
        }

        Ok(CalibrationTick::Committed { class, next })
    }
}
