// Progress tracking for the calibration workflow
//
// Drum classes and the progress payload reported to the presentation layer
// while a class is being collected.

use std::fmt;
use std::str::FromStr;

/// Drum class a template can be captured for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DrumClass {
    /// Kick drum
    Kick,
    /// Snare drum
    Snare,
    /// Hi-hat
    HiHat,
}

impl DrumClass {
    /// Fixed calibration order
    pub const ALL: [DrumClass; 3] = [DrumClass::Kick, DrumClass::Snare, DrumClass::HiHat];

    /// Get the next class in the calibration sequence
    ///
    /// # Returns
    /// * `Some(DrumClass)` - Next class to calibrate
    /// * `None` - Calibration sequence complete
    pub fn next(&self) -> Option<DrumClass> {
        match self {
            DrumClass::Kick => Some(DrumClass::Snare),
            DrumClass::Snare => Some(DrumClass::HiHat),
            DrumClass::HiHat => None,
        }
    }

    /// Position in [`DrumClass::ALL`]
    pub fn index(&self) -> usize {
        match self {
            DrumClass::Kick => 0,
            DrumClass::Snare => 1,
            DrumClass::HiHat => 2,
        }
    }

    /// Get human-readable name for display
    pub fn display_name(&self) -> &'static str {
        match self {
            DrumClass::Kick => "KICK",
            DrumClass::Snare => "SNARE",
            DrumClass::HiHat => "HI-HAT",
        }
    }

    /// Instruction shown while this class is being collected
    pub fn prompt(&self) -> &'static str {
        match self {
            DrumClass::Kick => "Play kick drum for 3 seconds...",
            DrumClass::Snare => "Play snare drum for 3 seconds...",
            DrumClass::HiHat => "Play hi-hat for 3 seconds...",
        }
    }
}

impl fmt::Display for DrumClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

impl FromStr for DrumClass {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "kick" => Ok(DrumClass::Kick),
            "snare" => Ok(DrumClass::Snare),
            "hihat" | "hi-hat" | "hi_hat" => Ok(DrumClass::HiHat),
            other => Err(format!("unknown drum class '{}'", other)),
        }
    }
}

/// Progress information for the class currently being collected
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct CalibrationProgress {
    /// Class being calibrated
    pub class: DrumClass,
    /// Samples collected so far for this class
    pub collected_samples: usize,
    /// Samples required before the template is committed
    pub target_samples: usize,
    /// Whether the session walks kick, snare and hi-hat in turn
    pub sequential: bool,
}

impl CalibrationProgress {
    /// Get progress percentage (0-100)
    pub fn percentage(&self) -> u8 {
        if self.target_samples == 0 {
            return 0;
        }
        let pct = (self.collected_samples as f64 / self.target_samples as f64) * 100.0;
        pct.min(100.0) as u8
    }

    /// Check if enough audio has been collected to commit
    pub fn is_class_complete(&self) -> bool {
        self.collected_samples >= self.target_samples
    }
}
