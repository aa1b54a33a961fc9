//! Collaborator abstractions for the tempo engine.
//!
//! The engine never touches audio hardware. It is handed frames by a
//! [`FrameSource`] and timestamps by a [`TimeSource`], so the same core runs
//! against synthetic click tracks, WAV files, and (with `live_input`) a
//! cpal input device.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use crate::error::AudioError;

/// Producer of fixed-size mono frames.
pub trait FrameSource {
    /// Pull the most recent frame.
    ///
    /// `Ok(None)` means the source is exhausted and no further frames will
    /// arrive.
    fn next_frame(&mut self) -> Result<Option<Vec<f32>>, AudioError>;

    /// Sampling rate in Hz, if known.
    fn sample_rate(&self) -> Option<u32>;
}

/// Trait representing a monotonic millisecond clock used for beat timestamps.
pub trait TimeSource: Send + Sync {
    fn now_ms(&self) -> u64;
}

/// Wall-clock time source backed by `Instant::now`.
pub struct SystemTimeSource {
    start: Instant,
}

impl SystemTimeSource {
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
        }
    }
}

impl Default for SystemTimeSource {
    fn default() -> Self {
        Self::new()
    }
}

impl TimeSource for SystemTimeSource {
    fn now_ms(&self) -> u64 {
        self.start.elapsed().as_millis() as u64
    }
}

/// Deterministic time source for offline runs.
///
/// Each call to `now_ms()` advances by a fixed step, so a driver that reads
/// the clock once per frame gets timestamps derived from the sample count.
pub struct StubTimeSource {
    step_us: u64,
    ticks: AtomicU64,
}

impl StubTimeSource {
    /// Advance `step_ms` per reading.
    pub fn new(step_ms: u64) -> Self {
        Self {
            step_us: step_ms.saturating_mul(1000),
            ticks: AtomicU64::new(0),
        }
    }

    /// Advance by the duration of one frame per reading.
    pub fn per_frame(frame_size: usize, sample_rate: u32) -> Self {
        let step_us = if sample_rate == 0 {
            0
        } else {
            frame_size as u64 * 1_000_000 / sample_rate as u64
        };
        Self {
            step_us,
            ticks: AtomicU64::new(0),
        }
    }
}

impl Default for StubTimeSource {
    fn default() -> Self {
        Self::new(10)
    }
}

impl TimeSource for StubTimeSource {
    fn now_ms(&self) -> u64 {
        let tick = self.ticks.fetch_add(1, Ordering::SeqCst);
        tick.saturating_mul(self.step_us) / 1000
    }
}

mod ring;
mod synthetic;
mod wav;

pub use ring::RingFrameSource;
pub use synthetic::{SyntheticConfig, SyntheticSource};
pub use wav::WavFrameSource;

#[cfg(feature = "live_input")]
mod cpal;
#[cfg(feature = "live_input")]
pub use self::cpal::CpalFrameSource;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stub_time_source_steps() {
        let clock = StubTimeSource::new(10);
        assert_eq!(clock.now_ms(), 0);
        assert_eq!(clock.now_ms(), 10);
        assert_eq!(clock.now_ms(), 20);
    }

    #[test]
    fn test_stub_time_source_per_frame_does_not_drift() {
        // 1024 samples at 44.1 kHz is 23.219 ms
        let clock = StubTimeSource::per_frame(1024, 44100);
        let readings: Vec<u64> = (0..44).map(|_| clock.now_ms()).collect();
        assert_eq!(readings[1], 23);
        assert_eq!(readings[2], 46);
        // 43 frames = 44032 samples = 998.4 ms
        assert_eq!(readings[43], 998);
    }

    #[test]
    fn test_system_time_source_monotonic() {
        let clock = SystemTimeSource::new();
        let a = clock.now_ms();
        let b = clock.now_ms();
        assert!(b >= a);
    }
}
