// Audio acquisition error types and constants

use crate::error::ErrorCode;
use log::error;
use std::fmt;

/// Audio error code constants
///
/// Single source of truth for the numeric codes carried by [`AudioError`].
///
/// Error code range: 1001-1007
pub struct AudioErrorCodes {}

impl AudioErrorCodes {
    /// No input device is available on the host
    pub const NO_INPUT_DEVICE: i32 = 1001;

    /// Microphone permission denied
    pub const PERMISSION_DENIED: i32 = 1002;

    /// Failed to open the input stream or file
    pub const STREAM_OPEN_FAILED: i32 = 1003;

    /// Input device delivers a sample format we do not decode
    pub const UNSUPPORTED_SAMPLE_FORMAT: i32 = 1004;

    /// Tick loop is not running
    pub const NOT_RUNNING: i32 = 1005;

    /// Frame source ran out before calibration finished
    pub const SOURCE_EXHAUSTED: i32 = 1006;

    /// Mutex/RwLock was poisoned
    pub const LOCK_POISONED: i32 = 1007;
}

/// Log an audio error with structured context
///
/// Logs the numeric code, the component and the human-readable message.
pub fn log_audio_error(err: &AudioError, context: &str) {
    error!(
        "Audio error in {}: code={}, component=FrameSource, message={}",
        context,
        err.code(),
        err.message()
    );
}

/// Audio acquisition errors
///
/// These cover the boundary with the audio source collaborator: device
/// discovery, permission, stream setup and end of input. None of them are
/// retried automatically.
///
/// Error code range: 1001-1007
#[derive(Debug, Clone, PartialEq)]
pub enum AudioError {
    /// No default input device found
    NoInputDevice,

    /// Microphone permission denied
    PermissionDenied,

    /// Failed to open audio stream
    StreamOpenFailed { reason: String },

    /// Sample format not supported by the frame source
    UnsupportedSampleFormat { format: String },

    /// Tick loop not running
    NotRunning,

    /// Frame source ended while calibration was still collecting
    SourceExhausted,

    /// Mutex/RwLock was poisoned
    LockPoisoned { component: String },
}

impl ErrorCode for AudioError {
    fn code(&self) -> i32 {
        match self {
            AudioError::NoInputDevice => AudioErrorCodes::NO_INPUT_DEVICE,
            AudioError::PermissionDenied => AudioErrorCodes::PERMISSION_DENIED,
            AudioError::StreamOpenFailed { .. } => AudioErrorCodes::STREAM_OPEN_FAILED,
            AudioError::UnsupportedSampleFormat { .. } => {
                AudioErrorCodes::UNSUPPORTED_SAMPLE_FORMAT
            }
            AudioError::NotRunning => AudioErrorCodes::NOT_RUNNING,
            AudioError::SourceExhausted => AudioErrorCodes::SOURCE_EXHAUSTED,
            AudioError::LockPoisoned { .. } => AudioErrorCodes::LOCK_POISONED,
        }
    }

    fn message(&self) -> String {
        match self {
            AudioError::NoInputDevice => "No default input device found".to_string(),
            AudioError::PermissionDenied => "Microphone permission denied".to_string(),
            AudioError::StreamOpenFailed { reason } => {
                format!("Failed to open audio stream: {}", reason)
            }
            AudioError::UnsupportedSampleFormat { format } => {
                format!("Unsupported sample format: {}", format)
            }
            AudioError::NotRunning => "Tick loop not running".to_string(),
            AudioError::SourceExhausted => {
                "Frame source exhausted before calibration completed".to_string()
            }
            AudioError::LockPoisoned { component } => {
                format!("Lock poisoned for component: {}", component)
            }
        }
    }
}

impl fmt::Display for AudioError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "AudioError::{:?} (code {}): {}",
            self,
            self.code(),
            self.message()
        )
    }
}

impl std::error::Error for AudioError {}

/// Convert from std::io::Error to AudioError
impl From<std::io::Error> for AudioError {
    fn from(err: std::io::Error) -> Self {
        match err.kind() {
            std::io::ErrorKind::PermissionDenied => AudioError::PermissionDenied,
            _ => AudioError::StreamOpenFailed {
                reason: err.to_string(),
            },
        }
    }
}

/// Convert WAV decoding failures into stream errors
impl From<hound::Error> for AudioError {
    fn from(err: hound::Error) -> Self {
        match err {
            hound::Error::IoError(io) => io.into(),
            other => AudioError::StreamOpenFailed {
                reason: other.to_string(),
            },
        }
    }
}
