//! Configuration management for the apnea analysis pipeline
//!
//! This module provides runtime configuration loading from JSON files so
//! that envelope resolution, candidate extraction, calibration look-ahead
//! and AHI windowing can be tuned per recording without recompilation.
//! Every section and field falls back to its default when omitted.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::error::ConfigError;

/// Complete application configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub decoder: DecoderConfig,
    pub envelope: EnvelopeConfig,
    pub candidates: CandidateConfig,
    pub expansion: ExpansionConfig,
    pub calibration: CalibrationConfig,
    pub detection: DetectionConfig,
    pub ahi: AhiConfig,
}

/// Decoder parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DecoderConfig {
    /// Sample rate every track is resampled to before analysis
    pub target_sample_rate: u32,
}

impl Default for DecoderConfig {
    fn default() -> Self {
        Self {
            target_sample_rate: 8_000,
        }
    }
}

/// Energy envelope parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EnvelopeConfig {
    /// Frame length (and hop) in seconds; frames do not overlap
    pub hop_seconds: f64,
}

impl Default for EnvelopeConfig {
    fn default() -> Self {
        Self { hop_seconds: 0.5 }
    }
}

/// Peak candidate extraction parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CandidateConfig {
    /// Number of top-ranked peaks proposed for judgment
    pub top_n: usize,
    /// Minimum distance between two surviving peaks
    pub min_separation_secs: f64,
    /// Peaks with lower prominence are ignored (0 keeps all)
    pub min_prominence: f64,
    /// Length of the pause shown to the user before each peak
    pub apnea_window_secs: f64,
}

impl Default for CandidateConfig {
    fn default() -> Self {
        Self {
            top_n: 50,
            min_separation_secs: 30.0,
            min_prominence: 0.0,
            apnea_window_secs: 10.0,
        }
    }
}

/// Width of the statistical admission band in standard deviations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum SigmaBand {
    One,
    Two,
}

impl SigmaBand {
    pub fn k(self) -> f64 {
        match self {
            SigmaBand::One => 1.0,
            SigmaBand::Two => 2.0,
        }
    }
}

impl TryFrom<u8> for SigmaBand {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(SigmaBand::One),
            2 => Ok(SigmaBand::Two),
            other => Err(format!("sigma band must be 1 or 2 (got {})", other)),
        }
    }
}

impl From<SigmaBand> for u8 {
    fn from(band: SigmaBand) -> Self {
        match band {
            SigmaBand::One => 1,
            SigmaBand::Two => 2,
        }
    }
}

/// Statistical expansion parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExpansionConfig {
    pub sigma_band: SigmaBand,
    /// Maximum number of statistical candidates proposed per round
    pub max_additional: usize,
}

impl Default for ExpansionConfig {
    fn default() -> Self {
        Self {
            sigma_band: SigmaBand::Two,
            max_additional: 30,
        }
    }
}

/// Parameter calibration settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CalibrationConfig {
    /// Look-ahead after a judged peak searched for the resumption maximum
    pub resume_lookahead_secs: f64,
    /// Multiplier used when no judged candidate has look-ahead frames
    pub fallback_resume_multiplier: f64,
    /// Frames inspected after a marker's end for the resumption peak
    pub marker_resume_frames: usize,
    /// Percentile of envelope rms used as the uncalibrated silence level
    pub baseline_silence_percentile: f64,
    /// Resume multiplier used without calibration
    pub baseline_resume_multiplier: f64,
}

impl Default for CalibrationConfig {
    fn default() -> Self {
        Self {
            resume_lookahead_secs: 20.0,
            fallback_resume_multiplier: 2.0,
            marker_resume_frames: 10,
            baseline_silence_percentile: 30.0,
            baseline_resume_multiplier: 3.0,
        }
    }
}

/// Event detection parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectionConfig {
    /// Clinical minimum apnea duration
    pub min_apnea_secs: f64,
    /// Window after a silent run in which breathing must resume
    pub resume_lookahead_secs: f64,
    /// Qualifying runs closer than this are merged into one event
    pub merge_gap_secs: f64,
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            min_apnea_secs: 10.0,
            // 2x the minimum apnea duration
            resume_lookahead_secs: 20.0,
            merge_gap_secs: 2.0,
        }
    }
}

/// Rule deciding which sliding window an event is counted in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WindowAssignment {
    /// Event counts where its midpoint falls
    Midpoint,
    /// Event counts where more than half its duration lies
    MajorityOverlap,
}

/// Lower bounds (inclusive) of the severity classes, in events per hour
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SeverityThresholds {
    pub mild: f64,
    pub moderate: f64,
    pub severe: f64,
}

impl Default for SeverityThresholds {
    fn default() -> Self {
        Self {
            mild: 5.0,
            moderate: 15.0,
            severe: 30.0,
        }
    }
}

/// Sliding window AHI parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AhiConfig {
    pub window_secs: f64,
    pub step_secs: f64,
    pub severity: SeverityThresholds,
    pub assignment: WindowAssignment,
}

impl Default for AhiConfig {
    fn default() -> Self {
        Self {
            window_secs: 3_600.0,
            step_secs: 300.0,
            severity: SeverityThresholds::default(),
            assignment: WindowAssignment::Midpoint,
        }
    }
}

fn require_positive(name: &str, value: f64) -> Result<(), ConfigError> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(ConfigError::invalid(
            name,
            format!("must be a positive number (got {})", value),
        ))
    }
}

fn require_non_negative(name: &str, value: f64) -> Result<(), ConfigError> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(ConfigError::invalid(
            name,
            format!("must be zero or positive (got {})", value),
        ))
    }
}

fn require_multiplier(name: &str, value: f64) -> Result<(), ConfigError> {
    if value.is_finite() && value > 1.0 {
        Ok(())
    } else {
        Err(ConfigError::invalid(
            name,
            format!("must be greater than 1 (got {})", value),
        ))
    }
}

impl AppConfig {
    /// Load configuration from JSON file
    ///
    /// # Arguments
    /// * `path` - Path to JSON config file
    ///
    /// # Returns
    /// The loaded configuration, or the default configuration if the file
    /// doesn't exist or its JSON is invalid
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Self {
        match fs::read_to_string(&path) {
            Ok(contents) => match serde_json::from_str(&contents) {
                Ok(config) => {
                    log::info!("[Config] Loaded configuration from {:?}", path.as_ref());
                    config
                }
                Err(err) => {
                    log::warn!(
                        "[Config] Failed to parse JSON from {:?}: {}. Using defaults.",
                        path.as_ref(),
                        err
                    );
                    Self::default()
                }
            },
            Err(err) => {
                log::warn!(
                    "[Config] Failed to read config file {:?}: {}. Using defaults.",
                    path.as_ref(),
                    err
                );
                Self::default()
            }
        }
    }

    /// Load and validate configuration, failing instead of falling back
    ///
    /// # Returns
    /// * `Ok(AppConfig)` - Parsed and validated configuration
    /// * `Err(ConfigError)` - File unreadable, JSON invalid, or a value out of range
    pub fn try_load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let display = path.as_ref().display().to_string();
        let contents = fs::read_to_string(&path).map_err(|err| ConfigError::Unreadable {
            path: display.clone(),
            reason: err.to_string(),
        })?;
        let config: AppConfig =
            serde_json::from_str(&contents).map_err(|err| ConfigError::Unreadable {
                path: display.clone(),
                reason: err.to_string(),
            })?;
        config.validate()?;
        log::info!("[Config] Loaded configuration from {}", display);
        Ok(config)
    }

    /// Check every value against its allowed range
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.decoder.target_sample_rate == 0 {
            return Err(ConfigError::invalid(
                "decoder.target_sample_rate",
                "must be greater than 0",
            ));
        }

        require_positive("envelope.hop_seconds", self.envelope.hop_seconds)?;

        if self.candidates.top_n == 0 {
            return Err(ConfigError::invalid(
                "candidates.top_n",
                "must be greater than 0",
            ));
        }
        require_non_negative(
            "candidates.min_separation_secs",
            self.candidates.min_separation_secs,
        )?;
        require_non_negative("candidates.min_prominence", self.candidates.min_prominence)?;
        require_positive(
            "candidates.apnea_window_secs",
            self.candidates.apnea_window_secs,
        )?;

        if self.expansion.max_additional == 0 {
            return Err(ConfigError::invalid(
                "expansion.max_additional",
                "must be greater than 0",
            ));
        }

        require_positive(
            "calibration.resume_lookahead_secs",
            self.calibration.resume_lookahead_secs,
        )?;
        require_multiplier(
            "calibration.fallback_resume_multiplier",
            self.calibration.fallback_resume_multiplier,
        )?;
        if self.calibration.marker_resume_frames == 0 {
            return Err(ConfigError::invalid(
                "calibration.marker_resume_frames",
                "must be greater than 0",
            ));
        }
        let percentile = self.calibration.baseline_silence_percentile;
        if !(0.0..=100.0).contains(&percentile) {
            return Err(ConfigError::invalid(
                "calibration.baseline_silence_percentile",
                format!("must be within [0, 100] (got {})", percentile),
            ));
        }
        require_multiplier(
            "calibration.baseline_resume_multiplier",
            self.calibration.baseline_resume_multiplier,
        )?;

        require_positive("detection.min_apnea_secs", self.detection.min_apnea_secs)?;
        require_positive(
            "detection.resume_lookahead_secs",
            self.detection.resume_lookahead_secs,
        )?;
        require_non_negative("detection.merge_gap_secs", self.detection.merge_gap_secs)?;

        require_positive("ahi.window_secs", self.ahi.window_secs)?;
        require_positive("ahi.step_secs", self.ahi.step_secs)?;
        let severity = &self.ahi.severity;
        require_positive("ahi.severity.mild", severity.mild)?;
        if !(severity.mild < severity.moderate && severity.moderate < severity.severe) {
            return Err(ConfigError::invalid(
                "ahi.severity",
                format!(
                    "thresholds must be strictly increasing (got {}, {}, {})",
                    severity.mild, severity.moderate, severity.severe
                ),
            ));
        }

        Ok(())
    }
}
