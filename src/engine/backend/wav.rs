//! WAV file frame source.
//!
//! Decodes the first channel of a WAV file with `hound` and serves it as
//! consecutive frames. Timestamps for offline analysis come from the sample
//! position rather than the wall clock, see [`WavFrameSource::clock`].

use std::path::Path;

use hound::{SampleFormat, WavReader};

use crate::error::AudioError;

use super::{FrameSource, StubTimeSource};

pub struct WavFrameSource {
    samples: Vec<f32>,
    sample_rate: u32,
    frame_size: usize,
    position: usize,
}

impl WavFrameSource {
    /// Decode `path` into memory.
    pub fn open<P: AsRef<Path>>(path: P, frame_size: usize) -> Result<Self, AudioError> {
        let reader = WavReader::open(&path)?;
        let spec = reader.spec();
        let channels = spec.channels.max(1) as usize;

        let interleaved: Vec<f32> = match (spec.sample_format, spec.bits_per_sample) {
            (SampleFormat::Float, 32) => reader.into_samples::<f32>().collect::<Result<_, _>>()?,
            (SampleFormat::Int, bits @ 1..=32) => {
                let scale = 1.0 / (1u64 << (bits - 1)) as f32;
                reader
                    .into_samples::<i32>()
                    .map(|s| s.map(|v| v as f32 * scale))
                    .collect::<Result<_, _>>()?
            }
            (format, bits) => {
                return Err(AudioError::UnsupportedSampleFormat {
                    format: format!("{:?} {}-bit", format, bits),
                })
            }
        };

        // De-interleave: take first channel
        let samples: Vec<f32> = interleaved.into_iter().step_by(channels).collect();
        tracing::info!(
            "[Wav] Loaded {:?}: {} samples at {} Hz ({} channel(s))",
            path.as_ref(),
            samples.len(),
            spec.sample_rate,
            channels
        );
        Ok(Self::from_samples(samples, spec.sample_rate, frame_size))
    }

    /// Serve already decoded mono samples
    pub fn from_samples(samples: Vec<f32>, sample_rate: u32, frame_size: usize) -> Self {
        Self {
            samples,
            sample_rate,
            frame_size: frame_size.max(1),
            position: 0,
        }
    }

    pub fn len_samples(&self) -> usize {
        self.samples.len()
    }

    pub fn duration_secs(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.samples.len() as f64 / self.sample_rate as f64
    }

    /// Clock that advances one frame duration per reading
    pub fn clock(&self) -> StubTimeSource {
        StubTimeSource::per_frame(self.frame_size, self.sample_rate)
    }
}

impl FrameSource for WavFrameSource {
    fn next_frame(&mut self) -> Result<Option<Vec<f32>>, AudioError> {
        if self.position >= self.samples.len() {
            return Ok(None);
        }
        let end = (self.position + self.frame_size).min(self.samples.len());
        let frame = self.samples[self.position..end].to_vec();
        self.position = end;
        Ok(Some(frame))
    }

    fn sample_rate(&self) -> Option<u32> {
        Some(self.sample_rate)
    }
}
