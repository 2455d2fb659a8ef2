// Calibration error types and constants

use crate::error::ErrorCode;
use log::error;
use std::fmt;

/// Calibration error code constants
///
/// These constants provide a single source of truth for error codes
/// surfaced while turning human judgments into detection parameters.
///
/// Error code range: 3001-3005
pub struct CalibrationErrorCodes {}

impl CalibrationErrorCodes {
    /// Too few apnea judgments for stable statistics
    pub const INSUFFICIENT_DATA: i32 = 3001;

    /// Calibration attempted before any apnea judgment exists
    pub const NO_APNEA_JUDGMENTS: i32 = 3002;

    /// Silence threshold came out as zero, multiplier undefined
    pub const ZERO_SILENCE_THRESHOLD: i32 = 3003;

    /// Resume multiplier is not a finite value above 1
    pub const INVALID_MULTIPLIER: i32 = 3004;

    /// Marker interval does not describe a positive span
    pub const INVALID_MARKER: i32 = 3005;
}

/// Log a calibration error with structured context
///
/// This function logs calibration errors with structured fields including:
/// - error_code: Numeric error code for programmatic handling
/// - component: The component where the error occurred
/// - message: Human-readable error message
/// - context: Additional contextual information
pub fn log_calibration_error(err: &CalibrationError, context: &str) {
    error!(
        "Calibration error in {}: code={}, component=Calibration, message={}",
        context,
        err.code(),
        err.message()
    );
}

/// Calibration-related errors
///
/// All of these are recoverable by the user supplying different input
/// (more judgments, different markers); none is retried automatically.
#[derive(Debug, Clone, PartialEq)]
pub enum CalibrationError {
    /// Fewer apnea judgments than the statistics need
    InsufficientData { required: usize, judged: usize },

    /// No candidate has been judged as apnea yet
    NoApneaJudgments,

    /// Mean apnea rms is zero, so the resume ratio is undefined
    ZeroSilenceThreshold,

    /// Derived multiplier violates `multiplier > 1`
    InvalidMultiplier { value: f64 },

    /// Marker with `end <= start`
    InvalidMarker { start: f64, end: f64 },
}

impl ErrorCode for CalibrationError {
    fn code(&self) -> i32 {
        match self {
            CalibrationError::InsufficientData { .. } => CalibrationErrorCodes::INSUFFICIENT_DATA,
            CalibrationError::NoApneaJudgments => CalibrationErrorCodes::NO_APNEA_JUDGMENTS,
            CalibrationError::ZeroSilenceThreshold => {
                CalibrationErrorCodes::ZERO_SILENCE_THRESHOLD
            }
            CalibrationError::InvalidMultiplier { .. } => CalibrationErrorCodes::INVALID_MULTIPLIER,
            CalibrationError::InvalidMarker { .. } => CalibrationErrorCodes::INVALID_MARKER,
        }
    }

    fn message(&self) -> String {
        match self {
            CalibrationError::InsufficientData { required, judged } => {
                format!(
                    "Insufficient apnea judgments: need {}, got {}. Judge more candidates.",
                    required, judged
                )
            }
            CalibrationError::NoApneaJudgments => {
                "No candidate judged as apnea yet; judge at least one before calibrating"
                    .to_string()
            }
            CalibrationError::ZeroSilenceThreshold => {
                "Silence threshold is zero; resume multiplier is undefined".to_string()
            }
            CalibrationError::InvalidMultiplier { value } => {
                format!("Resume multiplier must be greater than 1 (got {})", value)
            }
            CalibrationError::InvalidMarker { start, end } => {
                format!("Marker end {} must be after start {}", end, start)
            }
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
