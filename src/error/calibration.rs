// Calibration error types and constants

use crate::calibration::DrumClass;
use crate::error::ErrorCode;
use log::error;
use std::fmt;

/// Calibration error code constants
///
/// Error code range: 2001-2006
pub struct CalibrationErrorCodes {}

impl CalibrationErrorCodes {
    /// Captured template was quieter than the silence floor
    pub const SILENCE_REJECTED: i32 = 2001;

    /// Tick or commit requested while no class is being collected
    pub const NOT_COLLECTING: i32 = 2002;

    /// Monitoring requested before any template was captured
    pub const NO_TEMPLATES: i32 = 2003;

    /// Attempted to store an empty template
    pub const EMPTY_TEMPLATE: i32 = 2004;

    /// Calibration requested while monitoring is running
    pub const MONITORING_ACTIVE: i32 = 2005;

    /// Monitoring requested while calibration is running
    pub const CALIBRATION_ACTIVE: i32 = 2006;
}

/// Log a calibration error with structured context
pub fn log_calibration_error(err: &CalibrationError, context: &str) {
    error!(
        "Calibration error in {}: code={}, component=CalibrationSession, message={}",
        context,
        err.code(),
        err.message()
    );
}

/// Calibration-related errors
///
/// Every variant is recoverable: the session falls back to `Idle` and
/// previously committed templates stay untouched.
///
/// Error code range: 2001-2006
#[derive(Debug, Clone, PartialEq)]
pub enum CalibrationError {
    /// Candidate template RMS fell below the silence floor
    SilenceRejected { class: DrumClass, rms: f32, floor: f32 },

    /// No calibration pass is collecting audio
    NotCollecting,

    /// No template has been captured yet
    NoTemplates,

    /// Template sample buffer was empty
    EmptyTemplate { class: DrumClass },

    /// Detection mode currently owns the tick
    MonitoringActive,

    /// Calibration mode currently owns the tick
    CalibrationActive,
}

impl ErrorCode for CalibrationError {
    fn code(&self) -> i32 {
        match self {
            CalibrationError::SilenceRejected { .. } => CalibrationErrorCodes::SILENCE_REJECTED,
            CalibrationError::NotCollecting => CalibrationErrorCodes::NOT_COLLECTING,
            CalibrationError::NoTemplates => CalibrationErrorCodes::NO_TEMPLATES,
            CalibrationError::EmptyTemplate { .. } => CalibrationErrorCodes::EMPTY_TEMPLATE,
            CalibrationError::MonitoringActive => CalibrationErrorCodes::MONITORING_ACTIVE,
            CalibrationError::CalibrationActive => CalibrationErrorCodes::CALIBRATION_ACTIVE,
        }
    }

    fn message(&self) -> String {
        match self {
            CalibrationError::SilenceRejected { class, rms, floor } => format!(
                "No {} detected: captured RMS {:.4} is below silence floor {:.4}. Try again.",
                class.display_name(),
                rms,
                floor
            ),
            CalibrationError::NotCollecting => "Calibration is not collecting audio".to_string(),
            CalibrationError::NoTemplates => {
                "No drum templates calibrated. Run calibration first.".to_string()
            }
            CalibrationError::EmptyTemplate { class } => {
                format!("Empty template for {}", class.display_name())
            }
            CalibrationError::MonitoringActive => {
                "Monitoring is running. Stop monitoring before calibrating.".to_string()
            }
            CalibrationError::CalibrationActive => "Calibration already in progress".to_string(),
        }
    }
}

impl fmt::Display for CalibrationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "CalibrationError::{:?} (code {}): {}",
            self,
            self.code(),
            self.message()
        )
    }
}

impl std::error::Error for CalibrationError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_calibration_error_codes() {
        assert_eq!(
            CalibrationError::SilenceRejected {
                class: DrumClass::Kick,
                rms: 0.0,
                floor: 0.01
            }
            .code(),
            CalibrationErrorCodes::SILENCE_REJECTED
        );
        assert_eq!(
            CalibrationError::NotCollecting.code(),
            CalibrationErrorCodes::NOT_COLLECTING
        );
        assert_eq!(
            CalibrationError::NoTemplates.code(),
            CalibrationErrorCodes::NO_TEMPLATES
        );
        assert_eq!(
            CalibrationError::EmptyTemplate {
                class: DrumClass::Snare
            }
            .code(),
            CalibrationErrorCodes::EMPTY_TEMPLATE
        );
        assert_eq!(
            CalibrationError::MonitoringActive.code(),
            CalibrationErrorCodes::MONITORING_ACTIVE
        );
        assert_eq!(
            CalibrationError::CalibrationActive.code(),
            CalibrationErrorCodes::CALIBRATION_ACTIVE
        );
    }

    #[test]
    fn test_calibration_error_messages() {
        let err = CalibrationError::SilenceRejected {
            class: DrumClass::HiHat,
            rms: 0.002,
            floor: 0.01,
        };
        assert!(err.message().contains("HI-HAT"));
        assert!(err.message().contains("0.0020"));

        let err = CalibrationError::NoTemplates;
        assert!(err.message().contains("Run calibration first"));
    }

    #[test]
    fn test_calibration_error_display() {
        let err = CalibrationError::NotCollecting;
        let display = format!("{}", err);
        assert!(display.contains("CalibrationError"));
        assert!(display.contains(&err.code().to_string()));
    }
}
