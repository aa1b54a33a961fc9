use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use drum_tempo::analysis::{ChartWindow, TempoEstimate, TempoStats};
use drum_tempo::calibration::{DrumClass, TemplateFlags};
use drum_tempo::config::AppConfig;
use drum_tempo::engine::{
    run_until, EngineMode, FrameSource, StubTimeSource, SyntheticConfig, SyntheticSource,
    TempoEngine, TickOutcome, TimeSource, WavFrameSource,
};
use serde::Serialize;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(
    name = "drum_tempo_cli",
    about = "Drum template calibration and tempo tracking harness"
)]
struct Cli {
    /// JSON configuration file (assets/drum_tempo.json when omitted, defaults
    /// when unreadable)
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Calibrate and monitor a synthetic click track
    Simulate {
        /// Tempo of the synthetic click track
        #[arg(long, default_value_t = 120.0)]
        bpm: f64,
        #[arg(long, default_value_t = 120)]
        target_bpm: i32,
        /// Seconds of click track to monitor
        #[arg(long, default_value_t = 20.0)]
        seconds: f64,
        /// Calibrate kick, snare and hi-hat in one sequential pass
        #[arg(long)]
        sequential: bool,
    },
    /// Calibrate from WAV recordings and track tempo in an input WAV
    Analyze {
        #[arg(long)]
        kick: PathBuf,
        #[arg(long)]
        snare: Option<PathBuf>,
        #[arg(long)]
        hihat: Option<PathBuf>,
        #[arg(long)]
        input: PathBuf,
        #[arg(long, default_value_t = 120)]
        target_bpm: i32,
    },
    /// Sequential calibration and monitoring from the default input device
    #[cfg(feature = "live_input")]
    Live {
        #[arg(long, default_value_t = 120)]
        target_bpm: i32,
        /// Seconds to monitor after calibration
        #[arg(long, default_value_t = 30.0)]
        seconds: f64,
    },
    /// Print the effective configuration as JSON
    Config,
}

#[derive(Serialize)]
struct TempoReport {
    target_bpm: i32,
    templates: TemplateFlags,
    stats: TempoStats,
    chart: Option<ChartWindow>,
    latest: Option<TempoEstimate>,
}

impl TempoReport {
    fn from_engine(engine: &TempoEngine) -> Self {
        Self {
            target_bpm: engine.target_bpm(),
            templates: engine.template_flags(),
            stats: engine.stats(),
            chart: engine.chart_window(),
            latest: engine.history().last().copied(),
        }
    }
}

fn main() -> ExitCode {
    init_tracing();
    match run() {
        Ok(code) => code,
        Err(err) => {
            eprintln!("Error: {err:?}");
            ExitCode::from(1)
        }
    }
}

fn init_tracing() {
    // stdout carries the JSON report
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn run() -> Result<ExitCode> {
    let cli = Cli::parse();
    let config = match &cli.config {
        Some(path) => AppConfig::load_from_file(path),
        None => AppConfig::load(),
    };

    match cli.command {
        Commands::Simulate {
            bpm,
            target_bpm,
            seconds,
            sequential,
        } => run_simulate(config, bpm, target_bpm, seconds, sequential),
        Commands::Analyze {
            kick,
            snare,
            hihat,
            input,
            target_bpm,
        } => run_analyze(config, kick, snare, hihat, input, target_bpm),
        #[cfg(feature = "live_input")]
        Commands::Live {
            target_bpm,
            seconds,
        } => run_live(config, target_bpm, seconds),
        Commands::Config => {
            println!("{}", serde_json::to_string_pretty(&config)?);
            Ok(ExitCode::SUCCESS)
        }
    }
}

/// Tick until calibration leaves the Calibrating mode; fail on rejection
fn calibrate_from(
    engine: &mut TempoEngine,
    source: &mut dyn FrameSource,
    clock: &dyn TimeSource,
    class: DrumClass,
    sequential: bool,
) -> Result<()> {
    engine
        .begin_calibration(class, sequential)
        .with_context(|| format!("failed to start {} calibration", class))?;

    let mut failure = None;
    run_until(engine, source, clock, |engine, outcome| {
        if let TickOutcome::Calibration(Err(err)) = outcome {
            failure = Some(err.clone());
        }
        engine.mode() != EngineMode::Calibrating
    })
    .with_context(|| format!("{} calibration did not complete", class))?;

    if let Some(err) = failure {
        bail!(err);
    }
    Ok(())
}

fn monitor(
    engine: &mut TempoEngine,
    source: &mut dyn FrameSource,
    clock: &dyn TimeSource,
) -> Result<usize> {
    engine
        .start_monitoring()
        .context("failed to start monitoring")?;
    let ticks = run_until(engine, source, clock, |_, _| false)?;
    engine.stop_monitoring();
    Ok(ticks)
}

fn print_report(engine: &TempoEngine) -> Result<ExitCode> {
    let report = TempoReport::from_engine(engine);
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(ExitCode::SUCCESS)
}

fn run_simulate(
    config: AppConfig,
    bpm: f64,
    target_bpm: i32,
    seconds: f64,
    sequential: bool,
) -> Result<ExitCode> {
    let sample_rate = config.audio.default_sample_rate;
    let frame_size = config.audio.frame_size;
    let click_track = SyntheticConfig {
        sample_rate,
        frame_size,
        bpm,
        ..Default::default()
    };
    // Back-to-back bursts while calibrating, so any captured second starts
    // inside a hit
    let roll = |seed: u64| {
        let period = (sample_rate as usize / 10).max(1);
        SyntheticConfig {
            bpm: 600.0,
            click_len: period,
            seed,
            ..click_track.clone()
        }
    };
    let clock = StubTimeSource::per_frame(frame_size, sample_rate);
    let mut engine = TempoEngine::new(config.clone(), target_bpm);

    if sequential {
        let mut source = SyntheticSource::new(roll(1));
        calibrate_from(&mut engine, &mut source, &clock, DrumClass::Kick, true)?;
    } else {
        for class in DrumClass::ALL {
            let mut source = SyntheticSource::new(roll(class.index() as u64 + 1));
            calibrate_from(&mut engine, &mut source, &clock, class, false)?;
        }
    }

    let mut source = SyntheticSource::new(click_track).with_duration(seconds);
    let ticks = monitor(&mut engine, &mut source, &clock)?;
    tracing::info!("[Cli] Simulated {} ticks at {} BPM", ticks, bpm);

    print_report(&engine)
}

fn open_wav(path: &Path, frame_size: usize) -> Result<WavFrameSource> {
    WavFrameSource::open(path, frame_size)
        .with_context(|| format!("failed to open {}", path.display()))
}

fn run_analyze(
    config: AppConfig,
    kick: PathBuf,
    snare: Option<PathBuf>,
    hihat: Option<PathBuf>,
    input: PathBuf,
    target_bpm: i32,
) -> Result<ExitCode> {
    let frame_size = config.audio.frame_size;
    let mut engine = TempoEngine::new(config, target_bpm);

    let recordings = [
        (DrumClass::Kick, Some(kick)),
        (DrumClass::Snare, snare),
        (DrumClass::HiHat, hihat),
    ];
    for (class, path) in recordings {
        let Some(path) = path else { continue };
        let mut source = open_wav(&path, frame_size)?;
        let clock = source.clock();
        calibrate_from(&mut engine, &mut source, &clock, class, false)?;
    }

    let mut source = open_wav(&input, frame_size)?;
    let clock = source.clock();
    let ticks = monitor(&mut engine, &mut source, &clock)?;
    tracing::info!(
        "[Cli] Analyzed {} ({:.1} s, {} ticks)",
        input.display(),
        source.duration_secs(),
        ticks
    );

    print_report(&engine)
}

#[cfg(feature = "live_input")]
fn run_live(config: AppConfig, target_bpm: i32, seconds: f64) -> Result<ExitCode> {
    use drum_tempo::engine::{CpalFrameSource, SystemTimeSource};
    use std::time::{Duration, Instant};

    let interval = Duration::from_millis(config.audio.tick_interval_ms);
    let mut source = CpalFrameSource::open(&config.audio).context("failed to open input device")?;
    let clock = SystemTimeSource::new();
    let mut engine = TempoEngine::new(config, target_bpm);

    eprintln!("{}", DrumClass::Kick.prompt());
    let mut events = engine.subscribe();
    engine.begin_calibration(DrumClass::Kick, true)?;
    let mut failure = None;
    run_until(&mut engine, &mut source, &clock, |engine, outcome| {
        while let Ok(event) = events.try_recv() {
            if let drum_tempo::engine::EngineEvent::CalibrationCommitted {
                next: Some(next), ..
            } = event
            {
                eprintln!("{}", next.prompt());
            }
        }
        if let TickOutcome::Calibration(Err(err)) = outcome {
            failure = Some(err.clone());
        }
        std::thread::sleep(interval);
        engine.mode() != EngineMode::Calibrating
    })?;
    if let Some(err) = failure {
        bail!(err);
    }

    eprintln!("Monitoring for {:.0} seconds...", seconds);
    engine.start_monitoring()?;
    let deadline = Instant::now() + Duration::from_secs_f64(seconds.max(0.0));
    run_until(&mut engine, &mut source, &clock, |_, _| {
        std::thread::sleep(interval);
        Instant::now() >= deadline
    })?;
    engine.stop_monitoring();

    print_report(&engine)
}
