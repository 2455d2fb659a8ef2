// Detection error types and constants

use crate::error::ErrorCode;
use log::error;
use std::fmt;

/// Detection error code constants
///
/// Error code range: 2001-2003
pub struct DetectionErrorCodes {}

impl DetectionErrorCodes {
    /// Envelope has no local maxima to propose
    pub const EMPTY_CANDIDATE_SET: i32 = 2001;

    /// Envelope has no points at all
    pub const EMPTY_ENVELOPE: i32 = 2002;

    /// Recording duration is zero, negative or not finite
    pub const INVALID_DURATION: i32 = 2003;
}

/// Log a detection error with structured context
pub fn log_detection_error(err: &DetectionError, context: &str) {
    error!(
        "Detection error in {}: code={}, component=Detection, message={}",
        context,
        err.code(),
        err.message()
    );
}

/// Errors raised by candidate extraction and event aggregation
#[derive(Debug, Clone, PartialEq)]
pub enum DetectionError {
    /// No local maxima exist (e.g. a perfectly flat envelope)
    EmptyCandidateSet,

    /// Envelope contains no points
    EmptyEnvelope,

    /// Recording duration cannot be used as a rate denominator
    InvalidDuration { duration_secs: f64 },
}

impl ErrorCode for DetectionError {
    fn code(&self) -> i32 {
        match self {
            DetectionError::EmptyCandidateSet => DetectionErrorCodes::EMPTY_CANDIDATE_SET,
            DetectionError::EmptyEnvelope => DetectionErrorCodes::EMPTY_ENVELOPE,
            DetectionError::InvalidDuration { .. } => DetectionErrorCodes::INVALID_DURATION,
        }
    }

    fn message(&self) -> String {
        match self {
            DetectionError::EmptyCandidateSet => {
                "No energy peaks found; re-upload the recording or adjust the hop size".to_string()
            }
            DetectionError::EmptyEnvelope => "Energy envelope is empty".to_string(),
            DetectionError::InvalidDuration { duration_secs } => {
                format!(
                    "Recording duration must be positive (got {} s)",
                    duration_secs
                )
            }
        }
    }
}

impl fmt::Display for DetectionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "DetectionError::{:?} (code {}): {}",
            self,
            self.code(),
            self.message()
        )
    }
}

impl std::error::Error for DetectionError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detection_error_codes() {
        assert_eq!(DetectionError::EmptyCandidateSet.code(), 2001);
        assert_eq!(DetectionError::EmptyEnvelope.code(), 2002);
        assert_eq!(
            DetectionError::InvalidDuration { duration_secs: 0.0 }.code(),
            2003
        );
    }

    #[test]
    fn test_detection_error_display() {
        let err = DetectionError::InvalidDuration {
            duration_secs: -1.0,
        };
        let display = format!("{}", err);
        assert!(display.contains("DetectionError"));
        assert!(display.contains("2003"));
        assert!(display.contains("-1"));
    }
}
