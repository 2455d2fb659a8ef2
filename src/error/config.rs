// Configuration error types and constants

use crate::error::ErrorCode;
use std::fmt;

/// Configuration error code constants
///
/// Error code range: 4001-4002
pub struct ConfigErrorCodes {}

impl ConfigErrorCodes {
    /// A configuration value is out of its allowed range
    pub const INVALID_PARAMETER: i32 = 4001;

    /// Configuration file could not be read or parsed
    pub const UNREADABLE: i32 = 4002;
}

/// Configuration errors
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigError {
    /// Parameter `name` rejected with `reason`
    InvalidParameter { name: String, reason: String },

    /// File at `path` could not be loaded
    Unreadable { path: String, reason: String },
}

impl ConfigError {
    pub(crate) fn invalid(name: &str, reason: impl Into<String>) -> Self {
        ConfigError::InvalidParameter {
            name: name.to_string(),
            reason: reason.into(),
        }
    }
}

impl ErrorCode for ConfigError {
    fn code(&self) -> i32 {
        match self {
            ConfigError::InvalidParameter { .. } => ConfigErrorCodes::INVALID_PARAMETER,
            ConfigError::Unreadable { .. } => ConfigErrorCodes::UNREADABLE,
        }
    }

    fn message(&self) -> String {
        match self {
            ConfigError::InvalidParameter { name, reason } => {
                format!("Invalid parameter {}: {}", name, reason)
            }
            ConfigError::Unreadable { path, reason } => {
                format!("Cannot load configuration {}: {}", path, reason)
            }
        }
    }
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "ConfigError::{:?} (code {}): {}",
            self,
            self.code(),
            self.message()
        )
    }
}

impl std::error::Error for ConfigError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_error_codes() {
        assert_eq!(ConfigError::invalid("hop_seconds", "must be > 0").code(), 4001);
        assert_eq!(
            ConfigError::Unreadable {
                path: "x.json".to_string(),
                reason: "missing".to_string()
            }
            .code(),
            4002
        );
    }

    #[test]
    fn test_config_error_message_names_parameter() {
        let err = ConfigError::invalid("ahi.step_secs", "must be > 0");
        assert_eq!(err.message(), "Invalid parameter ahi.step_secs: must be > 0");
    }
}
