// Audio decoding error types and constants

use crate::error::ErrorCode;
use log::error;
use std::fmt;

/// Audio error code constants
///
/// Single source of truth for the decode error family codes.
///
/// Error code range: 1001-1004
pub struct AudioErrorCodes {}

impl AudioErrorCodes {
    /// Source could not be opened or read
    pub const UNREADABLE: i32 = 1001;

    /// Source decoded to zero samples
    pub const EMPTY_TRACK: i32 = 1002;

    /// Sample format not supported by the decoder
    pub const UNSUPPORTED_FORMAT: i32 = 1003;

    /// Sample rate is zero
    pub const INVALID_SAMPLE_RATE: i32 = 1004;
}

/// Log an audio error with structured context
///
/// The logging is non-blocking and will not panic on failure.
pub fn log_audio_error(err: &AudioError, context: &str) {
    error!(
        "Audio error in {}: code={}, component=AudioDecoder, message={}",
        context,
        err.code(),
        err.message()
    );
}

/// Decode errors
///
/// Raised when a recording cannot be turned into an `AudioTrack`. These are
/// fatal for the job: the user has to supply a different file.
#[derive(Debug, Clone, PartialEq)]
pub enum AudioError {
    /// File could not be opened or a sample could not be read
    Unreadable { reason: String },

    /// Track has no samples
    EmptyTrack,

    /// Bit depth or sample format the decoder does not handle
    UnsupportedFormat { reason: String },

    /// Sample rate must be > 0
    InvalidSampleRate { sample_rate: u32 },
}

impl ErrorCode for AudioError {
    fn code(&self) -> i32 {
        match self {
            AudioError::Unreadable { .. } => AudioErrorCodes::UNREADABLE,
            AudioError::EmptyTrack => AudioErrorCodes::EMPTY_TRACK,
            AudioError::UnsupportedFormat { .. } => AudioErrorCodes::UNSUPPORTED_FORMAT,
            AudioError::InvalidSampleRate { .. } => AudioErrorCodes::INVALID_SAMPLE_RATE,
        }
    }

    fn message(&self) -> String {
        match self {
            AudioError::Unreadable { reason } => format!("Cannot read audio source: {}", reason),
            AudioError::EmptyTrack => "Audio track contains no samples".to_string(),
            AudioError::UnsupportedFormat { reason } => {
                format!("Unsupported audio format: {}", reason)
            }
            AudioError::InvalidSampleRate { sample_rate } => {
                format!("Sample rate must be greater than 0 (got {})", sample_rate)
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

impl From<hound::Error> for AudioError {
    fn from(err: hound::Error) -> Self {
        let reason = err.to_string();
        match err {
            hound::Error::Unsupported | hound::Error::FormatError(_) => {
                AudioError::UnsupportedFormat { reason }
            }
            _ => AudioError::Unreadable { reason },
        }
    }
}
