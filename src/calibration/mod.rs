// Calibration module - from human judgments to detection parameters
//
// This module provides three components:
// 1. JudgmentStatistics / JudgmentSummary: mu/sigma and progress of the
//    apnea judgments
// 2. StatisticalExpander: proposes further peaks inside the mu +/- k*sigma band
// 3. ParameterCalibrator: derives CalibrationParameters for event detection
//
// The calibration workflow:
// 1. Judge a seed batch of peak candidates
// 2. Expand, judge the proposals, repeat as needed
// 3. Calibrate and run event detection over the whole recording

pub mod calibrator;
pub mod expander;
pub mod statistics;

pub use calibrator::{CalibrationParameters, Marker, ParameterCalibrator};
pub use expander::{Expansion, StatisticalExpander};
pub use statistics::{ApneaRmsSummary, JudgmentStatistics, JudgmentSummary};
