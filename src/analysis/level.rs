//! RMS level meter
//!
//! Instantaneous loudness of a frame. Used for calibration silence rejection
//! and for the live input level reported each tick.

/// Replace non-finite samples with silence
#[inline]
pub fn sanitize(sample: f32) -> f32 {
    if sample.is_finite() {
        sample
    } else {
        0.0
    }
}

/// Root-mean-square amplitude: `sqrt(mean(buffer[i]^2))`
///
/// Accumulates in f64 so one-second templates do not lose precision.
/// Returns 0.0 for an empty buffer.
pub fn rms(buffer: &[f32]) -> f32 {
    if buffer.is_empty() {
        return 0.0;
    }
    let sum_squares: f64 = buffer
        .iter()
        .map(|&sample| {
            let s = sanitize(sample) as f64;
            s * s
        })
        .sum();
    (sum_squares / buffer.len() as f64).sqrt() as f32
}

/// Stateless meter turning frames into display levels
#[derive(Debug, Clone, Copy, Default)]
pub struct RmsLevelMeter;

impl RmsLevelMeter {
    pub fn new() -> Self {
        Self
    }

    /// RMS of `frame`
    pub fn measure(&self, frame: &[f32]) -> f32 {
        rms(frame)
    }

    /// RMS scaled to a 0-100 level (full scale sine is ~71)
    pub fn level_percent(&self, frame: &[f32]) -> u8 {
        (self.measure(frame) * 100.0).round().clamp(0.0, 100.0) as u8
    }

    /// Whether `frame` is quieter than `floor`
    pub fn is_silent(&self, frame: &[f32], floor: f32) -> bool {
        self.measure(frame) < floor
    }
}
