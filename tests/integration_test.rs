//! Integration tests for detection and tempo tracking
//!
//! Calibrate from a synthetic click track, then monitor click tracks at known
//! tempos. An 8 kHz rate with 1000-sample frames puts every click on a frame
//! boundary, so beat timestamps are exact multiples of 125 ms.

use drum_tempo::analysis::TempoBand;
use drum_tempo::calibration::DrumClass;
use drum_tempo::config::{AppConfig, AudioConfig, CorrelationNormalization, DetectionConfig};
use drum_tempo::engine::{
    run_until, EngineEvent, EngineMode, StubTimeSource, SyntheticConfig, SyntheticSource,
    TempoEngine, TickOutcome,
};

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

fn clock() -> StubTimeSource {
    StubTimeSource::per_frame(FRAME, RATE)
}

fn calibrated_engine(config: AppConfig, target_bpm: i32) -> TempoEngine {
    let mut engine = TempoEngine::new(config, target_bpm);
    let mut source = click_track(120.0, 4.0);
    engine.begin_calibration(DrumClass::Kick, false).unwrap();
    run_until(&mut engine, &mut source, &clock(), |engine, _| {
        engine.mode() != EngineMode::Calibrating
    })
    .unwrap();
    assert!(engine.template_flags().kick, "kick calibration failed");
    engine
}

fn monitor(engine: &mut TempoEngine, bpm: f64, seconds: f64) {
    engine.start_monitoring().unwrap();
    let mut source = click_track(bpm, seconds);
    run_until(engine, &mut source, &clock(), |_, _| false).unwrap();
}

#[test]
fn test_click_track_at_120_bpm() {
    let mut engine = calibrated_engine(config(), 120);
    monitor(&mut engine, 120.0, 10.0);

    let stats = engine.stats();
    assert_eq!(stats.current_bpm, 120);
    assert_eq!(stats.beat_count, 20);
    // Estimates start once four intervals exist
    assert_eq!(stats.estimate_count, 16);
    assert_eq!(stats.mean_bpm, 120);
    assert_eq!(stats.accuracy, 100.0);
    assert_eq!(stats.band, TempoBand::OnTarget);
}

#[test]
fn test_click_track_off_target() {
    // 96 BPM = 625 ms = 5 frames, ten below the target
    let mut engine = calibrated_engine(config(), 106);
    monitor(&mut engine, 96.0, 12.0);

    assert_eq!(engine.current_bpm(), 96);
    assert_eq!(engine.accuracy(), 70.0);
    assert_eq!(engine.stats().bpm_delta, 10);
    assert_eq!(engine.stats().band, TempoBand::Off);

    let window = engine.chart_window().expect("enough points for a chart");
    assert!(window.points.iter().all(|&bpm| bpm == 96));
    assert_eq!(window.min_bpm, 86);
    assert_eq!(window.max_bpm, 126);
}

#[test]
fn test_too_fast_is_never_surfaced() {
    // 240 BPM = 250 ms gaps: debounced fine but outside [60, 200]
    let mut engine = calibrated_engine(config(), 120);
    monitor(&mut engine, 240.0, 6.0);

    assert!(engine.stats().beat_count > 4);
    assert_eq!(engine.current_bpm(), 0);
    assert!(engine.history().is_empty());
}

#[test]
fn test_silence_produces_no_beats() {
    let mut engine = calibrated_engine(config(), 120);
    engine.start_monitoring().unwrap();
    let mut silence = SyntheticSource::silent(RATE, FRAME).with_duration(5.0);

    let mut beats = 0;
    run_until(&mut engine, &mut silence, &clock(), |_, outcome| {
        if let TickOutcome::Detection { detection, .. } = outcome {
            beats += detection.beat.is_some() as usize;
            assert_eq!(detection.scores.kick, 0.0);
        }
        false
    })
    .unwrap();

    assert_eq!(beats, 0);
    assert_eq!(engine.stats().beat_count, 0);
}

#[test]
fn test_tempo_events_are_broadcast() {
    let mut engine = calibrated_engine(config(), 120);
    let mut events = engine.subscribe();
    engine.start_monitoring().unwrap();

    let mut source = click_track(120.0, 4.0);
    let mut beats = 0;
    let mut tempos = Vec::new();
    run_until(&mut engine, &mut source, &clock(), |_, _| {
        while let Ok(event) = events.try_recv() {
            match event {
                EngineEvent::Beat { .. } => beats += 1,
                EngineEvent::Tempo { estimate, .. } => tempos.push(estimate.bpm),
                _ => {}
            }
        }
        false
    })
    .unwrap();

    assert_eq!(beats, 8);
    assert_eq!(tempos, vec![120; 4]);
}

#[test]
fn test_energy_normalization_tracks_tempo() {
    let config = AppConfig {
        detection: DetectionConfig {
            normalization: CorrelationNormalization::Energy,
            ..Default::default()
        },
        ..config()
    };
    let mut engine = calibrated_engine(config, 120);
    monitor(&mut engine, 120.0, 6.0);
    assert_eq!(engine.current_bpm(), 120);
}

#[test]
fn test_restart_monitoring_clears_session() {
    let mut engine = calibrated_engine(config(), 120);
    monitor(&mut engine, 120.0, 4.0);
    assert_eq!(engine.current_bpm(), 120);
    engine.stop_monitoring();

    engine.start_monitoring().unwrap();
    assert_eq!(engine.current_bpm(), 0);
    assert_eq!(engine.stats().beat_count, 0);
    assert!(engine.chart_window().is_none());
}
