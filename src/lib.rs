// Apnea Calibrator Core - semi-automated apnea detection from sleep audio
// RMS envelope → peak candidates → human judgment → calibration → events → AHI

// Module declarations
pub mod analysis;
pub mod audio;
pub mod calibration;
pub mod config;
pub mod error;
pub mod pipeline;
pub mod storage;
pub mod testing;

// Re-exports for convenience
pub use config::AppConfig;
pub use error::{ApneaError, ErrorCode};
pub use pipeline::{ApneaPipeline, Score};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_module_structure() {
        let pipeline = ApneaPipeline::new(AppConfig::default());
        assert!(pipeline.is_ok());
    }
}
