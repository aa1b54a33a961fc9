// Drum Tempo Core - template calibration, onset detection and tempo tracking
// Tick-driven engine: calibration fills templates, monitoring matches frames
// against them and turns debounced beats into a robust BPM estimate.

// Module declarations
pub mod analysis;
pub mod calibration;
pub mod config;
pub mod engine;
pub mod error;

// Re-exports for convenience
pub use analysis::{BeatEvent, DetectionScores, TempoEstimate, TempoStats};
pub use calibration::{CalibrationProgress, DrumClass, TemplateStore};
pub use config::AppConfig;
pub use engine::{EngineCommand, EngineEvent, EngineMode, TempoEngine, TickDriver, TickOutcome};
pub use error::{AudioError, CalibrationError, ErrorCode};
