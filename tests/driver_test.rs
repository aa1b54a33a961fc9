//! TickDriver integration tests: worker-thread tick loop, command channel,
//! cooperative stop.

use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use drum_tempo::calibration::DrumClass;
use drum_tempo::config::{AppConfig, AudioConfig};
use drum_tempo::engine::{
    EngineCommand, EngineMode, RingFrameSource, StubTimeSource, SyntheticConfig,
    SyntheticSource, TempoEngine, TickDriver,
};
use drum_tempo::error::AudioError;

const RATE: u32 = 8000;
const FRAME: usize = 1000;

fn config() -> AppConfig {
    AppConfig {
        audio: AudioConfig {
            default_sample_rate: RATE,
            frame_size: FRAME,
            ..Default::default()
        },
        ..Default::default()
    }
}

fn click_track(bpm: f64, seconds: f64) -> SyntheticSource {
    SyntheticSource::new(SyntheticConfig {
        sample_rate: RATE,
        frame_size: FRAME,
        bpm,
        click_len: 400,
        ..Default::default()
    })
    .with_duration(seconds)
}

fn clock() -> Arc<StubTimeSource> {
    Arc::new(StubTimeSource::per_frame(FRAME, RATE))
}

fn wait_until_stopped(driver: &TickDriver) {
    let deadline = Instant::now() + Duration::from_secs(5);
    while driver.is_running() && Instant::now() < deadline {
        thread::sleep(Duration::from_millis(5));
    }
}

#[test]
fn test_calibrate_then_monitor_on_worker_thread() {
    let mut engine = TempoEngine::new(config(), 120);
    engine.begin_calibration(DrumClass::Kick, false).unwrap();

    let driver =
        TickDriver::spawn(engine, click_track(120.0, 4.0), clock(), Duration::ZERO).unwrap();
    let mut engine = driver.join().unwrap();
    assert!(engine.template_flags().kick);
    assert_eq!(engine.mode(), EngineMode::Idle);

    engine.start_monitoring().unwrap();
    let driver =
        TickDriver::spawn(engine, click_track(120.0, 6.0), clock(), Duration::ZERO).unwrap();
    let engine = driver.join().unwrap();

    assert_eq!(engine.current_bpm(), 120);
    assert_eq!(engine.stats().beat_count, 12);
}

#[test]
fn test_commands_reach_engine() {
    let engine = TempoEngine::new(config(), 120);
    let (mut producer, source) = RingFrameSource::channel(16384, FRAME, RATE);

    // Slow cadence: the ring repeats its window every tick, so a fast loop
    // would finish collecting before the stop arrives
    let driver =
        TickDriver::spawn(engine, source, clock(), Duration::from_millis(10)).unwrap();
    assert!(driver.is_running());

    driver.send(EngineCommand::SetTargetBpm { bpm: 90 }).unwrap();
    driver
        .send(EngineCommand::BeginCalibration {
            class: DrumClass::Snare,
            sequential: false,
        })
        .unwrap();
    for i in 0..2000 {
        let _ = producer.push((i as f32 * 0.05).sin() * 0.5);
    }
    thread::sleep(Duration::from_millis(30));

    // Stop discards the half-collected buffer
    let engine = driver.stop().unwrap();
    assert_eq!(engine.target_bpm(), 90);
    assert_eq!(engine.mode(), EngineMode::Idle);
    assert!(engine.calibration_progress().is_none());
    assert!(!engine.template_flags().snare);
}

#[test]
fn test_exhausted_source_ends_loop() {
    let engine = TempoEngine::new(config(), 120);
    let driver = TickDriver::spawn(
        engine,
        SyntheticSource::silent(RATE, FRAME).with_duration(0.5),
        clock(),
        Duration::ZERO,
    )
    .unwrap();

    wait_until_stopped(&driver);
    assert!(!driver.is_running());
    assert_eq!(
        driver.send(EngineCommand::StopMonitoring),
        Err(AudioError::NotRunning)
    );
    assert!(driver.join().is_ok());
}

#[test]
fn test_dropped_producer_ends_loop() {
    let engine = TempoEngine::new(config(), 120);
    let (producer, source) = RingFrameSource::channel(1024, FRAME, RATE);
    let driver = TickDriver::spawn(engine, source, clock(), Duration::from_millis(1)).unwrap();

    drop(producer);
    wait_until_stopped(&driver);
    let engine = driver.join().unwrap();
    assert_eq!(engine.sample_rate(), RATE);
}
