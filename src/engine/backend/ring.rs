//! Frame source fed by a lock-free SPSC ring.
//!
//! An audio callback (or any producer thread) pushes raw mono samples into an
//! `rtrb` ring. Each `next_frame` drains whatever has arrived and returns the
//! most recent `frame_size` samples, so a slow tick never falls behind the
//! input.

use rtrb::{Consumer, Producer, RingBuffer};

use crate::error::AudioError;

use super::FrameSource;

pub struct RingFrameSource {
    consumer: Consumer<f32>,
    window: Vec<f32>,
    frame_size: usize,
    sample_rate: u32,
}

impl RingFrameSource {
    /// Create a ring and the source draining it.
    ///
    /// # Arguments
    /// * `capacity` - Ring capacity in samples
    /// * `frame_size` - Samples returned per frame
    /// * `sample_rate` - Rate of the producer's samples
    pub fn channel(
        capacity: usize,
        frame_size: usize,
        sample_rate: u32,
    ) -> (Producer<f32>, RingFrameSource) {
        let (producer, consumer) = RingBuffer::new(capacity.max(1));
        let frame_size = frame_size.max(1);
        let source = RingFrameSource {
            consumer,
            window: vec![0.0; frame_size],
            frame_size,
            sample_rate,
        };
        (producer, source)
    }

    /// Move newly arrived samples into the window; returns how many arrived
    fn drain(&mut self) -> usize {
        let mut arrived = 0;
        while let Ok(sample) = self.consumer.pop() {
            self.window.push(sample);
            arrived += 1;
        }
        if self.window.len() > self.frame_size {
            let excess = self.window.len() - self.frame_size;
            self.window.drain(..excess);
        }
        arrived
    }
}

impl FrameSource for RingFrameSource {
    fn next_frame(&mut self) -> Result<Option<Vec<f32>>, AudioError> {
        let arrived = self.drain();
        if arrived == 0 && self.consumer.is_abandoned() {
            return Ok(None);
        }
        Ok(Some(self.window.clone()))
    }

    fn sample_rate(&self) -> Option<u32> {
        Some(self.sample_rate)
    }
}
