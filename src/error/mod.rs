// Error types for the drum tempo engine
//
// This module defines custom error types for audio acquisition and calibration
// operations, providing structured error handling with stable numeric codes.

mod audio;
mod calibration;

pub use audio::{log_audio_error, AudioError, AudioErrorCodes};
pub use calibration::{log_calibration_error, CalibrationError, CalibrationErrorCodes};

/// Error codes for structured error reporting
///
/// This trait provides a standard way to get error codes and messages
/// from custom error types, so presentation layers can branch on a code
/// instead of matching message text.
pub trait ErrorCode {
    /// Get the numeric error code
    fn code(&self) -> i32;

    /// Get the human-readable error message
    fn message(&self) -> String;
}
