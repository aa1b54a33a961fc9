// Analysis module - template matching and tempo tracking
//
// Pipeline per monitoring tick:
//   frame -> OnsetDetector (CrossCorrelationMatcher per template)
//         -> BeatEvent -> TempoTracker -> TempoEstimate
//
// RmsLevelMeter is shared with calibration for silence rejection.

pub mod correlation;
pub mod level;
pub mod onset;
pub mod tempo;

pub use correlation::CrossCorrelationMatcher;
pub use level::{rms, RmsLevelMeter};
pub use onset::{BeatEvent, DetectionLevels, DetectionScores, FrameDetection, HitFlags, OnsetDetector};
pub use tempo::{ChartWindow, TempoBand, TempoEstimate, TempoStats, TempoTracker};
