// Error types for the apnea calibrator
//
// This module defines the error families raised by the analysis pipeline,
// each with stable numeric codes so callers (CLI, storage layer, a future
// HTTP front end) can react to them without string matching.

mod audio;
mod calibration;
mod config;
mod detection;

use std::fmt;

pub use audio::{log_audio_error, AudioError, AudioErrorCodes};
pub use calibration::{log_calibration_error, CalibrationError, CalibrationErrorCodes};
pub use config::{ConfigError, ConfigErrorCodes};
pub use detection::{log_detection_error, DetectionError, DetectionErrorCodes};

/// Error codes for structured error reporting
///
/// This trait provides a standard way to get error codes and messages
/// from custom error types, enabling consistent error handling across
/// the pipeline stages.
pub trait ErrorCode {
    /// Get the numeric error code
    fn code(&self) -> i32;

    /// Get the human-readable error message
    fn message(&self) -> String;
}

/// Any error the pipeline can surface
///
/// Stage functions return their own family; this enum exists for callers
/// that chain several stages with `?`.
#[derive(Debug, Clone, PartialEq)]
pub enum ApneaError {
    Audio(AudioError),
    Detection(DetectionError),
    Calibration(CalibrationError),
    Config(ConfigError),
}

impl ErrorCode for ApneaError {
    fn code(&self) -> i32 {
        match self {
            ApneaError::Audio(err) => err.code(),
            ApneaError::Detection(err) => err.code(),
            ApneaError::Calibration(err) => err.code(),
            ApneaError::Config(err) => err.code(),
        }
    }

    fn message(&self) -> String {
        match self {
            ApneaError::Audio(err) => err.message(),
            ApneaError::Detection(err) => err.message(),
            ApneaError::Calibration(err) => err.message(),
            ApneaError::Config(err) => err.message(),
        }
    }
}

impl fmt::Display for ApneaError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApneaError::Audio(err) => err.fmt(f),
            ApneaError::Detection(err) => err.fmt(f),
            ApneaError::Calibration(err) => err.fmt(f),
            ApneaError::Config(err) => err.fmt(f),
        }
    }
}

impl std::error::Error for ApneaError {}

impl From<AudioError> for ApneaError {
    fn from(err: AudioError) -> Self {
        ApneaError::Audio(err)
    }
}

impl From<DetectionError> for ApneaError {
    fn from(err: DetectionError) -> Self {
        ApneaError::Detection(err)
    }
}

impl From<CalibrationError> for ApneaError {
    fn from(err: CalibrationError) -> Self {
        ApneaError::Calibration(err)
    }
}

impl From<ConfigError> for ApneaError {
    fn from(err: ConfigError) -> Self {
        ApneaError::Config(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_umbrella_delegates_code_and_message() {
        let err: ApneaError = CalibrationError::NoApneaJudgments.into();
        assert_eq!(err.code(), CalibrationErrorCodes::NO_APNEA_JUDGMENTS);
        assert!(err.message().contains("apnea"));

        let err: ApneaError = AudioError::EmptyTrack.into();
        assert_eq!(err.code(), AudioErrorCodes::EMPTY_TRACK);
    }

    #[test]
    fn test_umbrella_display_matches_inner() {
        let inner = DetectionError::EmptyCandidateSet;
        let outer: ApneaError = inner.clone().into();
        assert_eq!(format!("{}", outer), format!("{}", inner));
    }

    #[test]
    fn test_error_propagation() {
        fn may_fail() -> Result<(), CalibrationError> {
            Err(CalibrationError::ZeroSilenceThreshold)
        }

        fn caller() -> Result<(), ApneaError> {
            may_fail()?;
            Ok(())
        }

        assert!(matches!(
            caller(),
            Err(ApneaError::Calibration(CalibrationError::ZeroSilenceThreshold))
        ));
    }
}
