//! TickDriver: periodic tick loop around a [`TempoEngine`].
//!
//! Each cadence the loop drains pending [`EngineCommand`]s, pulls one frame,
//! reads the clock and ticks the engine. Stop is cooperative: the flag is
//! checked between ticks, so a tick always runs to completion.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use tokio::sync::mpsc;

use crate::engine::backend::{FrameSource, TimeSource};
use crate::engine::core::{EngineCommand, EngineMode, TempoEngine, TickOutcome};
use crate::error::{log_audio_error, log_calibration_error, AudioError};

const COMMAND_CHANNEL_CAPACITY: usize = 64;

/// Tick `engine` from `source` until `done` returns true or the source ends.
///
/// Runs on the caller's thread with no pacing. Used for offline analysis and
/// for sources that must stay on the thread that opened them.
///
/// # Returns
/// Number of ticks executed, or [`AudioError::SourceExhausted`] when the
/// source ends while calibration is still collecting. The partial
/// calibration is cancelled in that case.
pub fn run_until<F>(
    engine: &mut TempoEngine,
    source: &mut dyn FrameSource,
    clock: &dyn TimeSource,
    mut done: F,
) -> Result<usize, AudioError>
where
    F: FnMut(&TempoEngine, &TickOutcome) -> bool,
{
    engine.set_sample_rate(source.sample_rate());
    let mut ticks = 0;
    while let Some(frame) = source.next_frame()? {
        let outcome = engine.tick(&frame, clock.now_ms());
        ticks += 1;
        if done(engine, &outcome) {
            return Ok(ticks);
        }
    }

    if engine.mode() == EngineMode::Calibrating {
        engine.cancel_calibration();
        let err = AudioError::SourceExhausted;
        log_audio_error(&err, "run_until");
        return Err(err);
    }
    Ok(ticks)
}

/// Handle to a tick loop running on a worker thread
pub struct TickDriver {
    stop: Arc<AtomicBool>,
    command_tx: mpsc::Sender<EngineCommand>,
    handle: Option<JoinHandle<TempoEngine>>,
}

impl TickDriver {
    /// Move `engine` and `source` onto a worker thread and start ticking.
    ///
    /// # Arguments
    /// * `interval` - Pause between ticks; zero runs as fast as the source
    ///   delivers
    pub fn spawn<S>(
        mut engine: TempoEngine,
        mut source: S,
        clock: Arc<dyn TimeSource>,
        interval: Duration,
    ) -> Result<Self, AudioError>
    where
        S: FrameSource + Send + 'static,
    {
        let (command_tx, mut command_rx) = mpsc::channel(COMMAND_CHANNEL_CAPACITY);
        let stop = Arc::new(AtomicBool::new(false));
        let stop_flag = Arc::clone(&stop);

        engine.set_sample_rate(source.sample_rate());

        let handle = thread::Builder::new()
            .name("drum-tempo-tick".to_string())
            .spawn(move || {
                tracing::info!("[Driver] Tick loop started");
                let mut ticks: u64 = 0;

                while !stop_flag.load(Ordering::Acquire) {
                    while let Ok(command) = command_rx.try_recv() {
                        if let Err(err) = engine.apply(command) {
                            log_calibration_error(&err, "TickDriver::apply");
                        }
                    }

                    match source.next_frame() {
                        Ok(Some(frame)) => {
                            engine.tick(&frame, clock.now_ms());
                            ticks += 1;
                        }
                        Ok(None) => {
                            if engine.mode() == EngineMode::Calibrating {
                                engine.cancel_calibration();
                                log_audio_error(
                                    &AudioError::SourceExhausted,
                                    "TickDriver::next_frame",
                                );
                            }
                            tracing::info!("[Driver] Source exhausted after {} ticks", ticks);
                            break;
                        }
                        Err(err) => {
                            log_audio_error(&err, "TickDriver::next_frame");
                            break;
                        }
                    }

                    if !interval.is_zero() {
                        thread::sleep(interval);
                    }
                }

                stop_flag.store(true, Ordering::Release);
                tracing::info!("[Driver] Tick loop stopped after {} ticks", ticks);
                engine
            })
            .map_err(|e| AudioError::StreamOpenFailed {
                reason: format!("Failed to spawn tick thread: {}", e),
            })?;

        Ok(Self {
            stop,
            command_tx,
            handle: Some(handle),
        })
    }

    /// Queue a command for the next tick
    pub fn send(&self, command: EngineCommand) -> Result<(), AudioError> {
        if !self.is_running() {
            return Err(AudioError::NotRunning);
        }
        self.command_tx.try_send(command).map_err(|err| match err {
            mpsc::error::TrySendError::Full(_) => AudioError::StreamOpenFailed {
                reason: "command queue full".to_string(),
            },
            mpsc::error::TrySendError::Closed(_) => AudioError::NotRunning,
        })
    }

    /// Whether the loop is still ticking
    pub fn is_running(&self) -> bool {
        !self.stop.load(Ordering::Acquire)
            && self.handle.as_ref().map_or(false, |h| !h.is_finished())
    }

    /// Signal the loop to stop and return the engine
    ///
    /// In-progress calibration buffers are discarded, not flushed.
    pub fn stop(mut self) -> Result<TempoEngine, AudioError> {
        self.stop.store(true, Ordering::Release);
        let mut engine = self.join_inner()?;
        engine.cancel_calibration();
        Ok(engine)
    }

    /// Wait for the source to run out and return the engine
    pub fn join(mut self) -> Result<TempoEngine, AudioError> {
        self.join_inner()
    }

    fn join_inner(&mut self) -> Result<TempoEngine, AudioError> {
        let handle = self.handle.take().ok_or(AudioError::NotRunning)?;
        handle.join().map_err(|_| AudioError::LockPoisoned {
            component: "tick thread".to_string(),
        })
    }
}

impl Drop for TickDriver {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::Release);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}
