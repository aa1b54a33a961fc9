//! CPAL input source for desktop platforms (Linux, macOS, Windows)
//!
//! The input callback de-interleaves the first channel and pushes samples into
//! an `rtrb` ring; the tick side reads it through [`RingFrameSource`]. The
//! stream handle is not `Send`, so this source is driven on the thread that
//! opened it.

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use rtrb::Producer;

use crate::config::AudioConfig;
use crate::error::AudioError;

use super::{FrameSource, RingFrameSource};

pub struct CpalFrameSource {
    _stream: cpal::Stream,
    ring: RingFrameSource,
}

impl CpalFrameSource {
    /// Open and start the default input device.
    pub fn open(config: &AudioConfig) -> Result<Self, AudioError> {
        let host = cpal::default_host();
        let device = host
            .default_input_device()
            .ok_or(AudioError::NoInputDevice)?;

        let supported = device
            .default_input_config()
            .map_err(|e| AudioError::StreamOpenFailed {
                reason: format!("Failed to get default input config: {:?}", e),
            })?;

        let sample_format = supported.sample_format();
        let stream_config: cpal::StreamConfig = supported.into();
        let channels = stream_config.channels.max(1) as usize;
        let sample_rate = stream_config.sample_rate.0;

        let (producer, ring) =
            RingFrameSource::channel(config.ring_capacity, config.frame_size, sample_rate);

        let stream = match sample_format {
            cpal::SampleFormat::F32 => {
                build_stream::<f32>(&device, &stream_config, producer, channels, |s| s)
            }
            cpal::SampleFormat::I16 => {
                build_stream::<i16>(&device, &stream_config, producer, channels, |s| {
                    s as f32 / 32768.0
                })
            }
            cpal::SampleFormat::U16 => {
                build_stream::<u16>(&device, &stream_config, producer, channels, |s| {
                    (s as f32 - 32768.0) / 32768.0
                })
            }
            other => {
                return Err(AudioError::UnsupportedSampleFormat {
                    format: format!("{:?}", other),
                })
            }
        }?;

        stream.play().map_err(|e| AudioError::StreamOpenFailed {
            reason: format!("Input start failed: {}", e),
        })?;

        tracing::info!(
            "[Cpal] Input stream started: {} Hz, {} channel(s), {:?}",
            sample_rate,
            channels,
            sample_format
        );

        Ok(Self {
            _stream: stream,
            ring,
        })
    }
}

fn build_stream<T>(
    device: &cpal::Device,
    config: &cpal::StreamConfig,
    mut producer: Producer<f32>,
    channels: usize,
    convert: fn(T) -> f32,
) -> Result<cpal::Stream, AudioError>
where
    T: cpal::SizedSample + Send + 'static,
{
    let err_fn = |err| tracing::warn!("[Cpal] Input stream error: {}", err);

    device
        .build_input_stream(
            config,
            move |data: &[T], _: &cpal::InputCallbackInfo| {
                // De-interleave: take first channel; drop samples when full
                for frame in data.chunks(channels) {
                    if let Some(&sample) = frame.first() {
                        let _ = producer.push(convert(sample));
                    }
                }
            },
            err_fn,
            None,
        )
        .map_err(|e| match e {
            cpal::BuildStreamError::DeviceNotAvailable => AudioError::NoInputDevice,
            other => AudioError::StreamOpenFailed {
                reason: format!("{:?}", other),
            },
        })
}

impl FrameSource for CpalFrameSource {
    fn next_frame(&mut self) -> Result<Option<Vec<f32>>, AudioError> {
        self.ring.next_frame()
    }

    fn sample_rate(&self) -> Option<u32> {
        self.ring.sample_rate()
    }
}
